//! Typed errors surfaced by the core.
//!
//! Every error is local to one aircraft or resource; the orchestrator
//! reports it and continues with the remaining set.

use crate::airport::NodeId;
use crate::clearance::{ClearanceEvent, ClearanceState};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroundError {
    /// No path exists, or all paths exhausted after bounded re-plan attempts.
    #[error("no route from {from:?} to {to:?}")]
    RouteNotFound { from: NodeId, to: NodeId },

    /// Edge, runway or parking position is contended. Re-queued by the
    /// orchestrator on the next cycle, never retried inline.
    #[error("resource {resource} is unavailable")]
    ResourceUnavailable { resource: String },

    /// Clearance event rejected; state is unchanged.
    #[error("event {event:?} is not valid in state {state:?}")]
    InvalidTransition {
        state: ClearanceState,
        event: ClearanceEvent,
    },

    /// Required runway length exceeds every candidate's usable length,
    /// or the candidate set is empty.
    #[error("no candidate runway satisfies the aircraft requirements")]
    NoSuitableRunway,

    /// No maneuver combination restores separation within one resolver
    /// pass; escalated as a high-priority alert.
    #[error("conflict between {aircraft1} and {aircraft2} could not be resolved")]
    ConflictUnresolved {
        aircraft1: String,
        aircraft2: String,
    },

    #[error("unknown aircraft {0}")]
    UnknownAircraft(String),

    #[error("invalid airport network: {0}")]
    InvalidNetwork(String),
}

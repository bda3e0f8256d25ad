//! Per-aircraft clearance protocol.
//!
//! A strict finite-state machine gating movement permissions. The machine
//! knows nothing about routes or geometry; it only answers whether
//! movement is currently permitted. Events not valid for the current
//! state are rejected with `InvalidTransition` and the state is unchanged.

use crate::error::GroundError;
use crate::rules::Rules;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceState {
    Idle,
    RequestedPushback,
    ClearedPushback,
    RequestedTaxi,
    ClearedTaxi,
    HoldingShort,
    ClearedRunwayCrossing,
    ClearedTakeoff,
    ClearedLanding,
    RequestedFrequencyChange,
    Handoff,
    /// Terminal: left the managed area after departure.
    Departed,
    /// Terminal: removed from service (severe timeout, exit, disconnect).
    Terminated,
}

impl ClearanceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClearanceState::Departed | ClearanceState::Terminated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceEvent {
    RequestPushback,
    GrantPushback,
    RequestTaxi,
    GrantTaxi,
    HoldShort,
    GrantRunwayCrossing,
    GrantTakeoff,
    GrantLanding,
    RequestFrequencyChange,
    GrantHandoff,
    Depart,
    Terminate,
    /// Automatic event fired when the maximum dwell time is exceeded.
    Timeout,
}

/// Valid transition for (state, event), or `None` when the event must be
/// rejected. Exhaustive over both enums.
fn transition(state: ClearanceState, event: ClearanceEvent) -> Option<ClearanceState> {
    use ClearanceEvent as E;
    use ClearanceState as S;
    match (state, event) {
        (S::Idle, E::RequestPushback) => Some(S::RequestedPushback),
        // An arrival enters the managed area with no prior ground states.
        (S::Idle, E::GrantLanding) => Some(S::ClearedLanding),
        (S::RequestedPushback, E::GrantPushback) => Some(S::ClearedPushback),
        (S::ClearedPushback, E::RequestTaxi) => Some(S::RequestedTaxi),
        (S::RequestedTaxi, E::GrantTaxi) => Some(S::ClearedTaxi),
        (S::ClearedTaxi, E::HoldShort) => Some(S::HoldingShort),
        (S::HoldingShort, E::GrantRunwayCrossing) => Some(S::ClearedRunwayCrossing),
        (S::HoldingShort, E::GrantTakeoff) => Some(S::ClearedTakeoff),
        // Crossing complete or runway vacated: resume taxi.
        (S::ClearedRunwayCrossing, E::GrantTaxi) => Some(S::ClearedTaxi),
        (S::ClearedLanding, E::GrantTaxi) => Some(S::ClearedTaxi),
        (S::ClearedTakeoff, E::RequestFrequencyChange) => Some(S::RequestedFrequencyChange),
        (S::ClearedLanding, E::RequestFrequencyChange) => Some(S::RequestedFrequencyChange),
        (S::RequestedFrequencyChange, E::GrantHandoff) => Some(S::Handoff),
        (S::Handoff, E::Depart) => Some(S::Departed),
        (state, E::Terminate) if !state.is_terminal() => Some(S::Terminated),
        // Dwell-timeout recovery: runway-critical states are severe.
        (
            S::ClearedTakeoff | S::ClearedLanding | S::RequestedFrequencyChange | S::Handoff,
            E::Timeout,
        ) => Some(S::Terminated),
        (
            S::RequestedPushback
            | S::ClearedPushback
            | S::RequestedTaxi
            | S::ClearedTaxi
            | S::ClearedRunwayCrossing,
            E::Timeout,
        ) => Some(S::HoldingShort),
        _ => None,
    }
}

/// Max dwell for a state, or `None` for states that never time out.
fn dwell_limit_secs(state: ClearanceState, rules: &Rules) -> Option<i64> {
    use ClearanceState as S;
    match state {
        S::Idle | S::HoldingShort | S::Departed | S::Terminated => None,
        S::ClearedTakeoff | S::ClearedLanding | S::RequestedFrequencyChange | S::Handoff => {
            Some(rules.runway_dwell_secs)
        }
        _ => Some(rules.clearance_dwell_secs),
    }
}

/// The clearance record for one aircraft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clearance {
    pub aircraft_id: String,
    state: ClearanceState,
    /// Timestamp of the last transition.
    pub since: DateTime<Utc>,
    /// Pending request while in a `Requested*` state.
    pub pending_request: Option<ClearanceEvent>,
}

impl Clearance {
    pub fn new(aircraft_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            aircraft_id: aircraft_id.into(),
            state: ClearanceState::Idle,
            since: now,
            pending_request: None,
        }
    }

    pub fn state(&self) -> ClearanceState {
        self.state
    }

    /// Apply an event. Invalid events leave the state unchanged.
    pub fn apply(
        &mut self,
        event: ClearanceEvent,
        now: DateTime<Utc>,
    ) -> Result<ClearanceState, GroundError> {
        let Some(next) = transition(self.state, event) else {
            return Err(GroundError::InvalidTransition {
                state: self.state,
                event,
            });
        };
        self.state = next;
        self.since = now;
        self.pending_request = match event {
            ClearanceEvent::RequestPushback
            | ClearanceEvent::RequestTaxi
            | ClearanceEvent::RequestFrequencyChange => Some(event),
            _ => None,
        };
        Ok(next)
    }

    /// Fire the automatic `Timeout` event if the dwell limit is exceeded.
    /// Returns the recovery state when a timeout occurred.
    pub fn check_timeout(&mut self, now: DateTime<Utc>, rules: &Rules) -> Option<ClearanceState> {
        let limit = dwell_limit_secs(self.state, rules)?;
        if (now - self.since).num_seconds() < limit {
            return None;
        }
        self.apply(ClearanceEvent::Timeout, now).ok()
    }

    /// Whether the current state permits movement / route execution.
    pub fn movement_permitted(&self) -> bool {
        matches!(
            self.state,
            ClearanceState::ClearedPushback
                | ClearanceState::ClearedTaxi
                | ClearanceState::ClearedRunwayCrossing
                | ClearanceState::ClearedTakeoff
                | ClearanceState::ClearedLanding
        )
    }
}

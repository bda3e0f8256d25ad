//! Facade over the shared state and the two cycles.
//!
//! External collaborators talk to the engine only through this type:
//! telemetry goes in via [`Orchestrator::ingest`], pilot requests via
//! the `request_*` methods, and outputs come back out of the drain
//! methods after each tick.

use crate::cycles::{fast_cycle, slow_cycle};
use crate::state::{GroundState, RunwayRequest};
use chrono::{DateTime, Utc};
use ground_core::{
    Alert, ClearanceEvent, ClearanceState, Directive, GroundError, NodeId, TrackSnapshot,
    WindSnapshot,
};

pub struct Orchestrator {
    pub state: GroundState,
    pub rules: ground_core::Rules,
}

impl Orchestrator {
    pub fn new(state: GroundState, rules: ground_core::Rules) -> Self {
        Self { state, rules }
    }

    /// Feed a telemetry snapshot batch into the shared state.
    pub fn ingest(&mut self, snapshots: &[TrackSnapshot], wind: WindSnapshot, now: DateTime<Utc>) {
        self.state.ingest(snapshots, wind, now);
    }

    pub fn tick_fast(&mut self, now: DateTime<Utc>) {
        fast_cycle(&mut self.state, &self.rules, now);
    }

    pub fn tick_slow(&mut self, now: DateTime<Utc>) {
        slow_cycle(&mut self.state, &self.rules, now);
    }

    pub fn drain_directives(&mut self) -> Vec<Directive> {
        self.state.drain_directives()
    }

    pub fn drain_alerts(&mut self) -> Vec<Alert> {
        self.state.drain_alerts()
    }

    /// Pilot requests pushback from the stand. Granted by the next slow
    /// cycle.
    pub fn request_pushback(
        &mut self,
        aircraft_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClearanceState, GroundError> {
        self.state
            .apply_clearance(aircraft_id, ClearanceEvent::RequestPushback, now)
    }

    /// Pilot requests taxi to a goal node. Departures request after
    /// pushback; an arrival on its landing roll is cleared to taxi
    /// directly.
    pub fn request_taxi(
        &mut self,
        aircraft_id: &str,
        goal: NodeId,
        now: DateTime<Utc>,
    ) -> Result<ClearanceState, GroundError> {
        let current = self
            .state
            .clearances
            .get(aircraft_id)
            .ok_or_else(|| GroundError::UnknownAircraft(aircraft_id.to_string()))?
            .state();
        let event = match current {
            ClearanceState::ClearedLanding | ClearanceState::ClearedRunwayCrossing => {
                ClearanceEvent::GrantTaxi
            }
            _ => ClearanceEvent::RequestTaxi,
        };
        let next = self.state.apply_clearance(aircraft_id, event, now)?;
        if let Some(track) = self.state.tracks.get_mut(aircraft_id) {
            track.taxi_goal = Some(goal);
            // A landed aircraft vacating the runway gives it up.
            if current == ClearanceState::ClearedLanding {
                track.assigned_runway = None;
            }
        }
        Ok(next)
    }

    /// Register a departure intent. Runway assignment and sequencing
    /// happen in the slow cycle once a runway candidate scores.
    pub fn request_departure(
        &mut self,
        aircraft_id: &str,
        ready_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), GroundError> {
        if !self.state.tracks.contains_key(aircraft_id) {
            return Err(GroundError::UnknownAircraft(aircraft_id.to_string()));
        }
        self.state.departures.insert(
            aircraft_id.to_string(),
            RunwayRequest {
                requested_at: now,
                ready_at,
                alerted: false,
            },
        );
        Ok(())
    }

    /// Register an inbound aircraft requesting to land. The landing
    /// clearance is granted by the slow cycle through the runway queue,
    /// never inside the active separation window.
    pub fn register_arrival(
        &mut self,
        aircraft_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GroundError> {
        if !self.state.tracks.contains_key(aircraft_id) {
            return Err(GroundError::UnknownAircraft(aircraft_id.to_string()));
        }
        self.state.arrivals.insert(
            aircraft_id.to_string(),
            RunwayRequest {
                requested_at: now,
                ready_at: now,
                alerted: false,
            },
        );
        Ok(())
    }

    /// Explicit deregistration (left the managed area, handed off).
    pub fn remove_aircraft(&mut self, aircraft_id: &str) {
        self.state.remove_aircraft(aircraft_id, "deregistered");
    }
}

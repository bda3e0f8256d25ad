//! Shared airport state for both update cycles.
//!
//! The whole context is passed explicitly into each cycle invocation so
//! the cycles stay independently testable. Aircraft are keyed in a
//! `BTreeMap`, giving the ascending-id iteration order both cycles rely
//! on for determinism.

use chrono::{DateTime, Utc};
use ground_core::{
    Alert, AircraftTrack, Clearance, ClearanceEvent, Conflict, Directive, GroundError, NodeId,
    ParkingStatus, ParkingPosition, Runway, Sequencer, TaxiwayNetwork, TrackSnapshot, WindSnapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exclusive use of a runway for one aircraft until the separation
/// window elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunwayHold {
    pub aircraft_id: String,
    pub until: DateTime<Utc>,
}

/// A pending request for runway use, departure or arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunwayRequest {
    pub requested_at: DateTime<Utc>,
    pub ready_at: DateTime<Utc>,
    /// A `NoSuitableRunway` alert has already been raised for this
    /// request; the aircraft stays held without re-alerting.
    pub alerted: bool,
}

/// The explicit mutable context shared by the fast and slow cycles.
#[derive(Debug, Default)]
pub struct GroundState {
    pub network: TaxiwayNetwork,
    pub runways: Vec<Runway>,
    pub parking: Vec<ParkingPosition>,
    pub wind: WindSnapshot,

    pub tracks: BTreeMap<String, AircraftTrack>,
    pub clearances: BTreeMap<String, Clearance>,
    pub sequencer: Sequencer,
    /// Conflicts from the latest fast cycle; fully replaced each cycle.
    pub active_conflicts: Vec<Conflict>,
    /// Runway id -> exclusive hold.
    pub runway_holds: BTreeMap<String, RunwayHold>,
    pub departures: BTreeMap<String, RunwayRequest>,
    /// Inbound aircraft waiting for a landing clearance.
    pub arrivals: BTreeMap<String, RunwayRequest>,

    pub(crate) directives: Vec<Directive>,
    pub(crate) alerts: Vec<Alert>,
}

impl GroundState {
    pub fn new(network: TaxiwayNetwork, runways: Vec<Runway>, parking: Vec<ParkingPosition>) -> Self {
        Self {
            network,
            runways,
            parking,
            ..Default::default()
        }
    }

    /// Upsert tracks from a telemetry snapshot batch. Unknown aircraft
    /// enter the managed area with an `Idle` clearance.
    pub fn ingest(&mut self, snapshots: &[TrackSnapshot], wind: WindSnapshot, now: DateTime<Utc>) {
        self.wind = wind;
        for snapshot in snapshots {
            let id = snapshot.aircraft_id.clone();
            self.tracks
                .entry(id.clone())
                .and_modify(|track| track.update(snapshot))
                .or_insert_with(|| AircraftTrack::from_snapshot(snapshot));
            self.clearances
                .entry(id.clone())
                .or_insert_with(|| Clearance::new(id, now));
        }
    }

    /// Node closest to a position; used to anchor route starts.
    pub fn nearest_node(&self, position: ground_core::Vec2) -> Option<NodeId> {
        self.network
            .nodes()
            .map(|node| (node.id, node.position.distance(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    /// Mark a parking position occupied by an aircraft.
    pub fn assign_parking(&mut self, parking_id: &str, aircraft_id: &str) -> Result<(), GroundError> {
        let stand = self
            .parking
            .iter_mut()
            .find(|p| p.id == parking_id)
            .ok_or_else(|| GroundError::ResourceUnavailable {
                resource: format!("parking {parking_id}"),
            })?;
        if stand.status != ParkingStatus::Free {
            return Err(GroundError::ResourceUnavailable {
                resource: format!("parking {parking_id}"),
            });
        }
        stand.status = ParkingStatus::Occupied;
        stand.aircraft_id = Some(aircraft_id.to_string());
        Ok(())
    }

    /// Free any parking position held by an aircraft.
    pub fn release_parking(&mut self, aircraft_id: &str) {
        for stand in &mut self.parking {
            if stand.aircraft_id.as_deref() == Some(aircraft_id) {
                stand.status = ParkingStatus::Free;
                stand.aircraft_id = None;
            }
        }
    }

    /// Remove an aircraft (exit, disconnect, stale telemetry). All of
    /// its reservations, queue entries and conflicts are cleared within
    /// the same cycle.
    pub fn remove_aircraft(&mut self, aircraft_id: &str, reason: &str) {
        self.network.release_all(aircraft_id);
        self.release_parking(aircraft_id);
        self.sequencer.remove_aircraft(aircraft_id);
        self.runway_holds
            .retain(|_, hold| hold.aircraft_id != aircraft_id);
        self.active_conflicts
            .retain(|conflict| !conflict.involves(aircraft_id));
        self.departures.remove(aircraft_id);
        self.arrivals.remove(aircraft_id);
        self.clearances.remove(aircraft_id);
        if self.tracks.remove(aircraft_id).is_some() {
            tracing::info!(aircraft = %aircraft_id, %reason, "aircraft removed");
            self.alerts.push(Alert::TrackDropped {
                aircraft_id: aircraft_id.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    /// Apply a clearance event for one aircraft.
    pub fn apply_clearance(
        &mut self,
        aircraft_id: &str,
        event: ClearanceEvent,
        now: DateTime<Utc>,
    ) -> Result<ground_core::ClearanceState, GroundError> {
        let clearance = self
            .clearances
            .get_mut(aircraft_id)
            .ok_or_else(|| GroundError::UnknownAircraft(aircraft_id.to_string()))?;
        clearance.apply(event, now)
    }

    pub fn push_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn push_alert(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    /// Drain the directive queue (at most one per aircraft per cycle by
    /// construction of the cycles).
    pub fn drain_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.directives)
    }

    pub fn drain_alerts(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.alerts)
    }
}

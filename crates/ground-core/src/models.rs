//! Core data models shared across the ground-traffic system.

use crate::airport::NodeId;
use crate::clearance::ClearanceState;
use crate::geometry::{Footprint, Vec2};
use crate::maneuver::AvoidanceManeuver;
use crate::sequencer::ResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of flight, used to pick separation standards and to filter
/// maneuver candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightPhase {
    #[default]
    Parked,
    Taxiing,
    TakeoffRoll,
    Airborne,
    Approach,
}

impl FlightPhase {
    pub fn is_on_ground(self) -> bool {
        matches!(
            self,
            FlightPhase::Parked | FlightPhase::Taxiing | FlightPhase::TakeoffRoll
        )
    }
}

/// Performance figures supplied by the external aircraft profile
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftPerformance {
    /// Runway length required for takeoff or landing (meters)
    pub required_runway_m: f64,
    /// Approach aid required under current conditions
    pub needs_approach_aid: bool,
    /// Remaining performance margin in 0..=1; divides maneuver workload
    #[serde(default = "default_margin")]
    pub maneuver_margin: f64,
}

fn default_margin() -> f64 {
    1.0
}

impl Default for AircraftPerformance {
    fn default() -> Self {
        Self {
            required_runway_m: 1_800.0,
            needs_approach_aid: false,
            maneuver_margin: 1.0,
        }
    }
}

/// Current wind, from the external weather collaborator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WindSnapshot {
    /// Direction the wind blows from, degrees true
    pub direction_deg: f64,
    pub speed_kts: f64,
}

/// One aircraft's telemetry snapshot, consumed each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub aircraft_id: String,
    /// Airport-local position in meters
    pub position: Vec2,
    pub altitude_m: f64,
    /// Horizontal velocity in m/s
    pub velocity: Vec2,
    #[serde(default)]
    pub vertical_mps: f64,
    #[serde(default)]
    pub heading_deg: f64,
    pub footprint: Footprint,
    #[serde(default)]
    pub phase: FlightPhase,
    #[serde(default)]
    pub emergency: bool,
    pub timestamp: DateTime<Utc>,
}

/// A managed aircraft: telemetry plus the core's own decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftTrack {
    pub aircraft_id: String,
    pub position: Vec2,
    pub altitude_m: f64,
    pub velocity: Vec2,
    pub vertical_mps: f64,
    pub heading_deg: f64,
    pub footprint: Footprint,
    pub phase: FlightPhase,
    pub emergency: bool,
    pub last_update: DateTime<Utc>,
    pub performance: AircraftPerformance,

    /// Assigned taxi route as an ordered node list
    pub route: Vec<NodeId>,
    /// Index of the next route node not yet reached
    pub route_progress: usize,
    /// Taxi destination pending a route
    pub taxi_goal: Option<NodeId>,
    /// Consecutive reservation failures on the current route
    pub reservation_retries: u32,
    /// Consecutive route computation failures toward the current goal
    pub route_failures: u32,
    pub assigned_runway: Option<String>,
}

impl AircraftTrack {
    /// Create a new track from the first snapshot.
    pub fn from_snapshot(snapshot: &TrackSnapshot) -> Self {
        Self {
            aircraft_id: snapshot.aircraft_id.clone(),
            position: snapshot.position,
            altitude_m: snapshot.altitude_m,
            velocity: snapshot.velocity,
            vertical_mps: snapshot.vertical_mps,
            heading_deg: snapshot.heading_deg,
            footprint: snapshot.footprint.clone(),
            phase: snapshot.phase,
            emergency: snapshot.emergency,
            last_update: snapshot.timestamp,
            performance: AircraftPerformance::default(),
            route: Vec::new(),
            route_progress: 0,
            taxi_goal: None,
            reservation_retries: 0,
            route_failures: 0,
            assigned_runway: None,
        }
    }

    /// Update kinematic state from a new snapshot; decisions are kept.
    pub fn update(&mut self, snapshot: &TrackSnapshot) {
        self.position = snapshot.position;
        self.altitude_m = snapshot.altitude_m;
        self.velocity = snapshot.velocity;
        self.vertical_mps = snapshot.vertical_mps;
        self.heading_deg = snapshot.heading_deg;
        self.footprint = snapshot.footprint.clone();
        self.phase = snapshot.phase;
        self.emergency = snapshot.emergency;
        self.last_update = snapshot.timestamp;
    }
}

/// Per-aircraft output directive, drained by the external communication
/// collaborator after each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    AssignedRoute {
        aircraft_id: String,
        route: Vec<NodeId>,
    },
    ClearanceChanged {
        aircraft_id: String,
        state: ClearanceState,
    },
    AssignedRunway {
        aircraft_id: String,
        runway_id: String,
    },
    Avoidance(AvoidanceManeuver),
    SequencePosition {
        aircraft_id: String,
        resource: ResourceId,
        position: usize,
    },
}

impl Directive {
    pub fn aircraft_id(&self) -> &str {
        match self {
            Directive::AssignedRoute { aircraft_id, .. }
            | Directive::ClearanceChanged { aircraft_id, .. }
            | Directive::AssignedRunway { aircraft_id, .. }
            | Directive::SequencePosition { aircraft_id, .. } => aircraft_id,
            Directive::Avoidance(m) => &m.aircraft_id,
        }
    }
}

/// High-priority alerts for external (human/ATC) intervention. Queued,
/// never delivered as inline callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    ConflictUnresolved {
        aircraft1: String,
        aircraft2: String,
        time_to_cpa_s: f64,
    },
    NoSuitableRunway {
        aircraft_id: String,
    },
    /// All paths to the taxi goal exhausted after the bounded re-plan
    /// attempts; the goal has been cleared.
    RouteFailed {
        aircraft_id: String,
        goal: NodeId,
    },
    TrackDropped {
        aircraft_id: String,
        reason: String,
    },
}

//! Ground-traffic routing and collision-avoidance core.
//!
//! Pure in-process computation: taxi routing over the airport graph, the
//! clearance protocol, runway assignment, resource sequencing, and
//! geometric conflict prediction/resolution. All I/O, timing and state
//! ownership live in `ground-engine`.

pub mod airport;
pub mod clearance;
pub mod conflict;
pub mod error;
pub mod geometry;
pub mod maneuver;
pub mod models;
pub mod router;
pub mod runway;
pub mod rules;
pub mod sequencer;

pub use airport::{Edge, EdgeId, Node, NodeId, ParkingPosition, ParkingStatus, Runway, TaxiwayNetwork};
pub use clearance::{Clearance, ClearanceEvent, ClearanceState};
pub use conflict::{
    closest_point_of_approach, predict_conflicts, predict_pair, Conflict, ConflictSeverity,
};
pub use error::GroundError;
pub use geometry::{Footprint, Vec2};
pub use maneuver::{
    resolve_conflicts, select_maneuver, AvoidanceManeuver, ManeuverKind, PriorityRule, Resolution,
};
pub use models::{
    AircraftPerformance, AircraftTrack, Alert, Directive, FlightPhase, TrackSnapshot, WindSnapshot,
};
pub use router::{find_route, path_weight, RouteAlgorithm, RouteConstraints};
pub use runway::{crosswind_component, headwind_component, score_runway, select_runway};
pub use rules::Rules;
pub use sequencer::{ResourceId, SequenceEntry, Sequencer};

//! Tunable thresholds and weights for the ground-traffic core.
//!
//! The nominal values below are operating points, not correctness
//! requirements; only their relative ordering matters (tailwind penalized
//! harder than crosswind, headwind rewarded).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rules {
    /// Minimum lateral separation between aircraft on the ground (meters)
    pub ground_separation_m: f64,
    /// Minimum lateral separation between airborne aircraft (meters)
    pub airborne_separation_m: f64,
    /// Minimum vertical separation for airborne aircraft (meters)
    pub vertical_separation_m: f64,
    /// Conflict prediction horizon (seconds)
    pub conflict_horizon_s: f64,
    /// Below this time-to-CPA a conflict is urgent (seconds)
    pub urgent_threshold_s: f64,
    /// Below this time-to-CPA a conflict is critical (seconds)
    pub critical_threshold_s: f64,
    /// Pairs farther apart than this are not examined (meters)
    pub proximity_radius_m: f64,
    /// Predicted miss distance below this fraction of the separation
    /// standard escalates the conflict one severity tier
    pub near_collision_fraction: f64,

    /// Runway scoring: penalty per knot of crosswind component
    pub crosswind_weight: f64,
    /// Runway scoring: penalty per knot of tailwind component
    pub tailwind_weight: f64,
    /// Runway scoring: reward per knot of headwind component (negative)
    pub headwind_weight: f64,
    /// Runway scoring: reward per meter of length margin (negative)
    pub length_margin_weight: f64,
    /// Runway scoring: bonus when a required approach aid is available
    pub approach_aid_bonus: f64,

    /// Maximum dwell in a timed clearance state before automatic recovery
    pub clearance_dwell_secs: i64,
    /// Maximum dwell in a runway-critical clearance state
    pub runway_dwell_secs: i64,

    /// Consecutive edge reservation failures before a re-plan
    pub max_reservation_retries: u32,
    /// Consecutive route computation failures before the goal is
    /// abandoned and reported
    pub max_route_retries: u32,
    /// Exclusive runway occupancy window after an admission (seconds)
    pub runway_separation_secs: i64,
    /// Tracks older than this are dropped (seconds)
    pub stale_track_secs: i64,

    /// Maneuver candidate magnitudes
    pub turn_step_deg: f64,
    pub altitude_step_m: f64,
    pub speed_step_mps: f64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            ground_separation_m: 50.0,
            airborne_separation_m: 500.0,
            vertical_separation_m: 150.0,
            conflict_horizon_s: 30.0,
            urgent_threshold_s: 20.0,
            critical_threshold_s: 10.0,
            proximity_radius_m: 15_000.0,
            near_collision_fraction: 0.5,

            crosswind_weight: 1.0,
            tailwind_weight: 2.0,
            headwind_weight: -0.5,
            length_margin_weight: -0.001,
            approach_aid_bonus: -5.0,

            clearance_dwell_secs: 120,
            runway_dwell_secs: 180,

            max_reservation_retries: 3,
            max_route_retries: 3,
            runway_separation_secs: 90,
            stale_track_secs: 10,

            turn_step_deg: 30.0,
            altitude_step_m: 150.0,
            speed_step_mps: 10.0,
        }
    }
}

//! Short-horizon conflict prediction.
//!
//! For each tracked pair within the proximity radius, the closest point
//! of approach is computed in closed form from the relative position and
//! velocity. A pair predicted to lose separation within the horizon
//! yields a `Conflict`; a conflict not re-emitted on the next fast cycle
//! is considered resolved and dropped by the orchestrator.

use crate::models::AircraftTrack;
use crate::rules::Rules;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity tiers for a predicted conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    /// Loss of separation predicted well ahead
    Advisory,
    /// Closing fast; avoidance should start now
    Urgent,
    /// Immediate or near-immediate violation
    Critical,
}

/// A predicted loss of separation between two aircraft. Ids are ordered
/// ascending so a pair always keys identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub aircraft1: String,
    pub aircraft2: String,
    pub severity: ConflictSeverity,
    /// Seconds until the closest point of approach
    pub time_to_cpa_s: f64,
    /// Predicted minimum lateral separation at CPA (meters)
    pub min_separation_m: f64,
    /// Lateral separation right now (meters)
    pub current_separation_m: f64,
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Canonical (ascending) id pair.
    pub fn pair(&self) -> (&str, &str) {
        (&self.aircraft1, &self.aircraft2)
    }

    pub fn involves(&self, aircraft_id: &str) -> bool {
        self.aircraft1 == aircraft_id || self.aircraft2 == aircraft_id
    }
}

/// Closed-form closest point of approach.
///
/// Returns `(t_cpa, min_distance)` for two tracks with the given
/// relative position and relative velocity. When the relative velocity
/// is zero the CPA is now, at the current separation; a receding pair
/// clamps to t = 0.
pub fn closest_point_of_approach(
    rel_pos: crate::geometry::Vec2,
    rel_vel: crate::geometry::Vec2,
) -> (f64, f64) {
    let closing = rel_vel.dot(rel_vel);
    if closing <= f64::EPSILON {
        return (0.0, rel_pos.length());
    }
    let t = (-(rel_pos.dot(rel_vel)) / closing).max(0.0);
    let min_distance = (rel_pos + rel_vel * t).length();
    (t, min_distance)
}

/// Lateral standard and optional vertical standard for a pair, selected
/// by flight phase: two ground aircraft use the ground lateral standard
/// with no vertical component; any airborne participant uses the
/// airborne lateral and vertical standards.
fn separation_standard(a: &AircraftTrack, b: &AircraftTrack, rules: &Rules) -> (f64, Option<f64>) {
    if a.phase.is_on_ground() && b.phase.is_on_ground() {
        (rules.ground_separation_m, None)
    } else {
        (rules.airborne_separation_m, Some(rules.vertical_separation_m))
    }
}

fn severity_for(t_cpa: f64, min_separation: f64, lateral_standard: f64, rules: &Rules) -> ConflictSeverity {
    let base = if t_cpa < rules.critical_threshold_s {
        ConflictSeverity::Critical
    } else if t_cpa < rules.urgent_threshold_s {
        ConflictSeverity::Urgent
    } else {
        ConflictSeverity::Advisory
    };
    // A predicted near-collision is one tier worse than its CPA time
    // alone would suggest.
    if min_separation < lateral_standard * rules.near_collision_fraction {
        match base {
            ConflictSeverity::Advisory => ConflictSeverity::Urgent,
            _ => ConflictSeverity::Critical,
        }
    } else {
        base
    }
}

/// Predict a conflict for one pair. `None` when the pair is outside the
/// proximity radius, never loses separation, or does so beyond the
/// horizon.
pub fn predict_pair(
    a: &AircraftTrack,
    b: &AircraftTrack,
    now: DateTime<Utc>,
    rules: &Rules,
) -> Option<Conflict> {
    let rel_pos = b.position - a.position;
    let current_separation = rel_pos.length();
    if current_separation > rules.proximity_radius_m {
        return None;
    }

    // Overlapping footprints are an immediate critical conflict
    // regardless of velocities.
    if a.footprint.overlaps(a.position, &b.footprint, b.position) {
        return Some(build(a, b, ConflictSeverity::Critical, 0.0, current_separation, current_separation, now));
    }

    let rel_vel = b.velocity - a.velocity;
    let (t_cpa, min_separation) = closest_point_of_approach(rel_pos, rel_vel);
    if t_cpa > rules.conflict_horizon_s {
        return None;
    }

    let (lateral, vertical) = separation_standard(a, b, rules);
    if min_separation >= lateral {
        return None;
    }
    if let Some(vertical_standard) = vertical {
        let vertical_gap =
            (b.altitude_m - a.altitude_m) + (b.vertical_mps - a.vertical_mps) * t_cpa;
        if vertical_gap.abs() >= vertical_standard {
            return None;
        }
    }

    let severity = severity_for(t_cpa, min_separation, lateral, rules);
    Some(build(a, b, severity, t_cpa, min_separation, current_separation, now))
}

fn build(
    a: &AircraftTrack,
    b: &AircraftTrack,
    severity: ConflictSeverity,
    t_cpa: f64,
    min_separation: f64,
    current_separation: f64,
    now: DateTime<Utc>,
) -> Conflict {
    let (first, second) = if a.aircraft_id <= b.aircraft_id {
        (&a.aircraft_id, &b.aircraft_id)
    } else {
        (&b.aircraft_id, &a.aircraft_id)
    };
    Conflict {
        aircraft1: first.clone(),
        aircraft2: second.clone(),
        severity,
        time_to_cpa_s: t_cpa,
        min_separation_m: min_separation,
        current_separation_m: current_separation,
        detected_at: now,
    }
}

/// Scan all tracked pairs in ascending id order. Recomputed every fast
/// cycle; the returned set fully replaces the previous one.
pub fn predict_conflicts(
    tracks: &BTreeMap<String, AircraftTrack>,
    now: DateTime<Utc>,
    rules: &Rules,
) -> Vec<Conflict> {
    let list: Vec<&AircraftTrack> = tracks.values().collect();
    let mut conflicts = Vec::new();
    for i in 0..list.len() {
        for j in (i + 1)..list.len() {
            if let Some(conflict) = predict_pair(list[i], list[j], now, rules) {
                conflicts.push(conflict);
            }
        }
    }
    conflicts
}

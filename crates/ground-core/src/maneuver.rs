//! Avoidance maneuver selection and multi-conflict resolution.
//!
//! The selector proposes phase-appropriate candidate maneuvers for one
//! conflict and scores each by workload cost. The resolver arbitrates
//! across simultaneous conflicts: the right-of-way aircraft keeps the
//! cheapest option (often none), the other takes complementary evasive
//! action, and every assignment is verified to restore separation for
//! all open conflicts before it is accepted. The search is bounded; a
//! pairing with no working combination is escalated, never retried.

use crate::conflict::{closest_point_of_approach, Conflict};
use crate::geometry::Vec2;
use crate::models::{AircraftTrack, FlightPhase};
use crate::rules::Rules;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Nominal vertical rate produced by a climb/descend/go-around maneuver.
const MANEUVER_VERTICAL_RATE_MPS: f64 = 5.0;

/// The closed set of avoidance actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManeuverKind {
    /// Heading change in degrees, positive clockwise.
    Turn { degrees: f64 },
    Climb { meters: f64 },
    Descend { meters: f64 },
    /// Speed adjustment in m/s; negative slows, clamped at standstill.
    SpeedChange { delta_mps: f64 },
    GoAround,
}

impl ManeuverKind {
    /// Deviation magnitude normalized against the rule step sizes.
    fn magnitude_norm(&self, rules: &Rules) -> f64 {
        match self {
            ManeuverKind::Turn { degrees } => degrees.abs() / rules.turn_step_deg,
            ManeuverKind::Climb { meters } | ManeuverKind::Descend { meters } => {
                meters.abs() / rules.altitude_step_m
            }
            ManeuverKind::SpeedChange { delta_mps } => delta_mps.abs() / rules.speed_step_mps,
            ManeuverKind::GoAround => 2.0,
        }
    }

    pub fn magnitude(&self) -> f64 {
        match self {
            ManeuverKind::Turn { degrees } => degrees.abs(),
            ManeuverKind::Climb { meters } | ManeuverKind::Descend { meters } => meters.abs(),
            ManeuverKind::SpeedChange { delta_mps } => delta_mps.abs(),
            ManeuverKind::GoAround => 1.0,
        }
    }
}

/// A chosen avoidance action for one aircraft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvoidanceManeuver {
    pub aircraft_id: String,
    pub kind: ManeuverKind,
    /// Workload cost estimate used for selection.
    pub cost: f64,
}

/// External right-of-way rule: `Less` means the first aircraft has
/// priority. Defaults to ascending id.
pub type PriorityRule = dyn Fn(&str, &str) -> Ordering;

/// Outcome of one resolver pass.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub maneuvers: Vec<AvoidanceManeuver>,
    /// Conflicts with no separation-restoring combination; escalated.
    pub unresolved: Vec<Conflict>,
}

/// Whether a maneuver kind can be flown in a phase. No vertical or
/// go-around maneuvers on the ground; go-around only on approach;
/// parked aircraft cannot maneuver at all.
fn feasible(phase: FlightPhase, kind: &ManeuverKind) -> bool {
    match phase {
        FlightPhase::Parked => false,
        FlightPhase::Taxiing | FlightPhase::TakeoffRoll => {
            matches!(kind, ManeuverKind::SpeedChange { .. })
        }
        FlightPhase::Airborne => !matches!(kind, ManeuverKind::GoAround),
        FlightPhase::Approach => !matches!(kind, ManeuverKind::Descend { .. }),
    }
}

/// Phase-appropriateness weight; higher means less appropriate.
fn phase_weight(phase: FlightPhase, kind: &ManeuverKind) -> f64 {
    match (phase, kind) {
        (FlightPhase::Taxiing | FlightPhase::TakeoffRoll, _) => 0.5,
        (FlightPhase::Approach, ManeuverKind::GoAround) => 1.0,
        (FlightPhase::Approach, ManeuverKind::SpeedChange { .. }) => 1.3,
        (FlightPhase::Approach, ManeuverKind::Climb { .. }) => 1.5,
        (FlightPhase::Approach, _) => 2.0,
        (FlightPhase::Airborne, ManeuverKind::Turn { .. }) => 1.0,
        (FlightPhase::Airborne, ManeuverKind::SpeedChange { .. }) => 1.1,
        (FlightPhase::Airborne, _) => 1.2,
        (FlightPhase::Parked, _) => f64::INFINITY,
    }
}

fn cost_of(kind: &ManeuverKind, track: &AircraftTrack, rules: &Rules) -> f64 {
    let margin = track.performance.maneuver_margin.clamp(0.1, 1.0);
    kind.magnitude_norm(rules) * phase_weight(track.phase, kind) / margin
}

/// Candidate maneuvers for a phase, cheapest first.
fn candidates(track: &AircraftTrack, rules: &Rules) -> Vec<ManeuverKind> {
    let raw = match track.phase {
        FlightPhase::Parked => vec![],
        FlightPhase::Taxiing | FlightPhase::TakeoffRoll => vec![ManeuverKind::SpeedChange {
            delta_mps: -rules.speed_step_mps,
        }],
        FlightPhase::Airborne => vec![
            ManeuverKind::Turn {
                degrees: rules.turn_step_deg,
            },
            ManeuverKind::Turn {
                degrees: -rules.turn_step_deg,
            },
            ManeuverKind::Climb {
                meters: rules.altitude_step_m,
            },
            ManeuverKind::Descend {
                meters: rules.altitude_step_m,
            },
            ManeuverKind::SpeedChange {
                delta_mps: -rules.speed_step_mps,
            },
            ManeuverKind::SpeedChange {
                delta_mps: rules.speed_step_mps,
            },
        ],
        FlightPhase::Approach => vec![
            ManeuverKind::GoAround,
            ManeuverKind::SpeedChange {
                delta_mps: -rules.speed_step_mps,
            },
            ManeuverKind::Climb {
                meters: rules.altitude_step_m,
            },
            ManeuverKind::Turn {
                degrees: rules.turn_step_deg,
            },
            ManeuverKind::Turn {
                degrees: -rules.turn_step_deg,
            },
        ],
    };
    let mut scored: Vec<(f64, ManeuverKind)> = raw
        .into_iter()
        .filter(|kind| feasible(track.phase, kind))
        .map(|kind| (cost_of(&kind, track, rules), kind))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().map(|(_, kind)| kind).collect()
}

/// Lowest-cost feasible maneuver for one aircraft in one conflict.
pub fn select_maneuver(track: &AircraftTrack, rules: &Rules) -> Option<AvoidanceManeuver> {
    candidates(track, rules).into_iter().next().map(|kind| {
        let cost = cost_of(&kind, track, rules);
        AvoidanceManeuver {
            aircraft_id: track.aircraft_id.clone(),
            kind,
            cost,
        }
    })
}

/// Complementary evasive action for the non-priority aircraft.
fn complement(kind: &ManeuverKind, rules: &Rules) -> ManeuverKind {
    match kind {
        ManeuverKind::Turn { degrees } => ManeuverKind::Turn { degrees: -degrees },
        ManeuverKind::Climb { meters } => ManeuverKind::Descend { meters: *meters },
        ManeuverKind::Descend { meters } => ManeuverKind::Climb { meters: *meters },
        ManeuverKind::SpeedChange { delta_mps } => ManeuverKind::SpeedChange {
            delta_mps: -delta_mps,
        },
        // The other aircraft expedites clear while this one goes around.
        ManeuverKind::GoAround => ManeuverKind::SpeedChange {
            delta_mps: rules.speed_step_mps,
        },
    }
}

/// Horizontal velocity and vertical rate after applying a maneuver.
fn adjusted_motion(track: &AircraftTrack, kind: Option<&ManeuverKind>) -> (Vec2, f64) {
    let Some(kind) = kind else {
        return (track.velocity, track.vertical_mps);
    };
    match kind {
        ManeuverKind::Turn { degrees } => (
            // Positive = clockwise in compass terms
            track.velocity.rotated(-degrees.to_radians()),
            track.vertical_mps,
        ),
        ManeuverKind::Climb { .. } => (track.velocity, MANEUVER_VERTICAL_RATE_MPS),
        ManeuverKind::Descend { .. } => (track.velocity, -MANEUVER_VERTICAL_RATE_MPS),
        ManeuverKind::SpeedChange { delta_mps } => {
            let speed = track.velocity.length();
            if speed <= f64::EPSILON {
                (Vec2::ZERO, track.vertical_mps)
            } else {
                let new_speed = (speed + delta_mps).max(0.0);
                (track.velocity * (new_speed / speed), track.vertical_mps)
            }
        }
        ManeuverKind::GoAround => (track.velocity, MANEUVER_VERTICAL_RATE_MPS),
    }
}

/// Verify that the adjusted motions keep (or put) the pair clear: CPA
/// pushed past the horizon, lateral or vertical standard met at CPA, or
/// closure fully stopped.
fn separation_restored(
    a: &AircraftTrack,
    b: &AircraftTrack,
    kind_a: Option<&ManeuverKind>,
    kind_b: Option<&ManeuverKind>,
    rules: &Rules,
) -> bool {
    let (vel_a, vert_a) = adjusted_motion(a, kind_a);
    let (vel_b, vert_b) = adjusted_motion(b, kind_b);
    let rel_pos = b.position - a.position;
    let rel_vel = vel_b - vel_a;
    let (t_cpa, min_separation) = closest_point_of_approach(rel_pos, rel_vel);

    if t_cpa > rules.conflict_horizon_s {
        return true;
    }
    let both_ground = a.phase.is_on_ground() && b.phase.is_on_ground();
    let lateral = if both_ground {
        rules.ground_separation_m
    } else {
        rules.airborne_separation_m
    };
    if min_separation >= lateral {
        return true;
    }
    if !both_ground {
        let gap = (b.altitude_m - a.altitude_m) + (vert_b - vert_a) * t_cpa;
        if gap.abs() >= rules.vertical_separation_m {
            return true;
        }
    }
    // No further closure (e.g. both stopped): taxi traffic may settle
    // below the standard like this. An airborne pair drifting inside
    // the standard is never accepted here and keeps escalating.
    both_ground && min_separation + 1e-6 >= rel_pos.length()
}

/// Arbitrate all open conflicts.
///
/// Aircraft already committed to a maneuver by an earlier pairing keep
/// it; the search never reopens accepted assignments within a cycle.
pub fn resolve_conflicts(
    conflicts: &[Conflict],
    tracks: &BTreeMap<String, AircraftTrack>,
    priority_rule: Option<&PriorityRule>,
    rules: &Rules,
) -> Resolution {
    let mut chosen: BTreeMap<String, ManeuverKind> = BTreeMap::new();
    let mut unresolved = Vec::new();

    for conflict in conflicts {
        let (Some(a), Some(b)) = (
            tracks.get(&conflict.aircraft1),
            tracks.get(&conflict.aircraft2),
        ) else {
            continue;
        };

        // Right of way: lower id unless an external rule says otherwise.
        let a_leads = match priority_rule {
            Some(rule) => rule(&a.aircraft_id, &b.aircraft_id) != Ordering::Greater,
            None => a.aircraft_id <= b.aircraft_id,
        };
        let (lead, trail) = if a_leads { (a, b) } else { (b, a) };

        // Already clear under the maneuvers committed so far.
        if separation_restored(
            lead,
            trail,
            chosen.get(&lead.aircraft_id),
            chosen.get(&trail.aircraft_id),
            rules,
        ) {
            continue;
        }

        // Lead options cheapest-first, starting with no maneuver at all;
        // a lead already committed elsewhere is not reopened.
        let lead_options: Vec<Option<ManeuverKind>> = match chosen.get(&lead.aircraft_id) {
            Some(kind) => vec![Some(kind.clone())],
            None => std::iter::once(None)
                .chain(candidates(lead, rules).into_iter().map(Some))
                .collect(),
        };

        let mut accepted = false;
        'search: for lead_kind in &lead_options {
            // Trail tries the complement of the lead's action first,
            // then its own candidates.
            let trail_options: Vec<ManeuverKind> = match chosen.get(&trail.aircraft_id) {
                Some(kind) => vec![kind.clone()],
                None => {
                    let mut options = Vec::new();
                    if let Some(kind) = lead_kind {
                        options.push(complement(kind, rules));
                    }
                    options.extend(candidates(trail, rules));
                    options
                }
            };
            for trail_kind in &trail_options {
                if !feasible(trail.phase, trail_kind) {
                    continue;
                }
                if separation_restored(
                    lead,
                    trail,
                    lead_kind.as_ref(),
                    Some(trail_kind),
                    rules,
                ) {
                    if let Some(kind) = lead_kind {
                        chosen.insert(lead.aircraft_id.clone(), kind.clone());
                    }
                    chosen.insert(trail.aircraft_id.clone(), trail_kind.clone());
                    accepted = true;
                    break 'search;
                }
            }
        }

        if !accepted {
            unresolved.push(conflict.clone());
        }
    }

    let maneuvers = chosen
        .into_iter()
        .filter_map(|(aircraft_id, kind)| {
            let track = tracks.get(&aircraft_id)?;
            let cost = cost_of(&kind, track, rules);
            Some(AvoidanceManeuver {
                aircraft_id,
                kind,
                cost,
            })
        })
        .collect();

    Resolution {
        maneuvers,
        unresolved,
    }
}

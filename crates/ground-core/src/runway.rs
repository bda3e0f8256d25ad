//! Runway suitability scoring and selection.
//!
//! Each candidate gets a wind- and length-based score; the lowest score
//! wins, with ties broken by runway id for determinism.

use crate::airport::Runway;
use crate::error::GroundError;
use crate::models::{AircraftPerformance, WindSnapshot};
use crate::rules::Rules;

/// Wind component along the runway centerline, in knots. Positive means
/// headwind for an aircraft using this runway direction.
pub fn headwind_component(runway_heading_deg: f64, wind: WindSnapshot) -> f64 {
    let angle = (wind.direction_deg - runway_heading_deg).to_radians();
    wind.speed_kts * angle.cos()
}

/// Wind component across the runway centerline, in knots. Sign carries
/// the side; callers score on the magnitude.
pub fn crosswind_component(runway_heading_deg: f64, wind: WindSnapshot) -> f64 {
    let angle = (wind.direction_deg - runway_heading_deg).to_radians();
    wind.speed_kts * angle.sin()
}

/// Score one candidate; lower is better. `None` when the aircraft's
/// required distance exceeds the runway's usable length.
pub fn score_runway(
    runway: &Runway,
    wind: WindSnapshot,
    perf: &AircraftPerformance,
    rules: &Rules,
) -> Option<f64> {
    if perf.required_runway_m > runway.length_m {
        return None;
    }

    let headwind = headwind_component(runway.heading_deg, wind);
    let crosswind = crosswind_component(runway.heading_deg, wind);

    let mut score = crosswind.abs() * rules.crosswind_weight;
    if headwind < 0.0 {
        // Tailwind: penalized harder than crosswind
        score += -headwind * rules.tailwind_weight;
    } else {
        score += headwind * rules.headwind_weight;
    }
    score += (runway.length_m - perf.required_runway_m) * rules.length_margin_weight;
    if perf.needs_approach_aid && runway.has_ils {
        score += rules.approach_aid_bonus;
    }
    Some(score)
}

/// Pick the best runway for an aircraft, or `NoSuitableRunway` when no
/// candidate is long enough.
pub fn select_runway<'a>(
    candidates: &'a [Runway],
    wind: WindSnapshot,
    perf: &AircraftPerformance,
    rules: &Rules,
) -> Result<&'a Runway, GroundError> {
    candidates
        .iter()
        .filter_map(|runway| score_runway(runway, wind, perf, rules).map(|score| (runway, score)))
        .min_by(|(a, score_a), (b, score_b)| {
            score_a
                .total_cmp(score_b)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|(runway, _)| runway)
        .ok_or(GroundError::NoSuitableRunway)
}

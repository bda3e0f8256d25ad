//! The two cooperating update cycles.
//!
//! The fast cycle handles collision prediction and avoidance and may
//! mutate only conflict records and maneuver outputs. The slow cycle
//! owns route, clearance and reservation state. Both take the shared
//! context explicitly and iterate aircraft in ascending id order; a
//! failure for one aircraft is logged and never aborts the cycle for
//! the rest. Each cycle emits at most one directive per aircraft.

use crate::state::{GroundState, RunwayHold};
use chrono::{DateTime, Duration, Utc};
use ground_core::{
    find_route, predict_conflicts, resolve_conflicts, Alert, ClearanceEvent, ClearanceState,
    Directive, GroundError, NodeId, ResourceId, RouteAlgorithm, RouteConstraints, Rules,
    SequenceEntry,
};
use std::collections::BTreeMap;

/// An aircraft within this distance of a route node has reached it.
const ARRIVAL_RADIUS_M: f64 = 30.0;

type DirectiveSlots = BTreeMap<String, Directive>;

/// Collision Detector -> Conflict Predictor -> Maneuver Selector/Resolver.
pub fn fast_cycle(state: &mut GroundState, rules: &Rules, now: DateTime<Utc>) {
    let conflicts = predict_conflicts(&state.tracks, now, rules);
    let resolution = resolve_conflicts(&conflicts, &state.tracks, None, rules);

    let mut out: DirectiveSlots = BTreeMap::new();
    for maneuver in resolution.maneuvers {
        out.entry(maneuver.aircraft_id.clone())
            .or_insert(Directive::Avoidance(maneuver));
    }
    for conflict in resolution.unresolved {
        tracing::warn!(
            aircraft1 = %conflict.aircraft1,
            aircraft2 = %conflict.aircraft2,
            t_cpa = conflict.time_to_cpa_s,
            "conflict unresolved, escalating"
        );
        state.push_alert(Alert::ConflictUnresolved {
            aircraft1: conflict.aircraft1.clone(),
            aircraft2: conflict.aircraft2.clone(),
            time_to_cpa_s: conflict.time_to_cpa_s,
        });
    }

    if !conflicts.is_empty() {
        tracing::debug!(count = conflicts.len(), "active conflicts");
    }
    // A conflict not re-emitted this cycle is resolved and dropped.
    state.active_conflicts = conflicts;

    for directive in out.into_values() {
        state.push_directive(directive);
    }
}

/// Ground Router -> Clearance State Machine -> Runway Assignment -> ATC
/// Sequencer.
pub fn slow_cycle(state: &mut GroundState, rules: &Rules, now: DateTime<Utc>) {
    // Stale tracks are removed first; their reservations must not
    // outlive them past this cycle.
    let stale: Vec<String> = state
        .tracks
        .iter()
        .filter(|(_, track)| (now - track.last_update).num_seconds() > rules.stale_track_secs)
        .map(|(id, _)| id.clone())
        .collect();
    for aircraft_id in stale {
        state.remove_aircraft(&aircraft_id, "stale telemetry");
    }

    let mut out: DirectiveSlots = BTreeMap::new();
    let ids: Vec<String> = state.tracks.keys().cloned().collect();
    for aircraft_id in &ids {
        if let Err(error) = step_aircraft(state, rules, now, aircraft_id, &mut out) {
            tracing::warn!(aircraft = %aircraft_id, %error, "slow-cycle step failed");
        }
    }

    state.sequencer.resort();
    admit_queues(state, rules, now, &mut out);
    sequence_positions(state, &mut out);

    for directive in out.into_values() {
        state.push_directive(directive);
    }
}

fn step_aircraft(
    state: &mut GroundState,
    rules: &Rules,
    now: DateTime<Utc>,
    aircraft_id: &str,
    out: &mut DirectiveSlots,
) -> Result<(), GroundError> {
    // Dwell timeout first: a stuck clearance recovers before anything
    // else happens to the aircraft this cycle.
    if let Some(clearance) = state.clearances.get_mut(aircraft_id) {
        if let Some(recovered) = clearance.check_timeout(now, rules) {
            tracing::warn!(aircraft = %aircraft_id, state = ?recovered, "clearance dwell timeout");
            out.entry(aircraft_id.to_string())
                .or_insert(Directive::ClearanceChanged {
                    aircraft_id: aircraft_id.to_string(),
                    state: recovered,
                });
            if recovered == ClearanceState::Terminated {
                state.remove_aircraft(aircraft_id, "clearance timeout");
                return Ok(());
            }
        }
    }

    let current = match state.clearances.get(aircraft_id) {
        Some(clearance) => clearance.state(),
        None => return Ok(()),
    };

    match current {
        ClearanceState::RequestedPushback => {
            let next = state.apply_clearance(aircraft_id, ClearanceEvent::GrantPushback, now)?;
            state.release_parking(aircraft_id);
            out.entry(aircraft_id.to_string())
                .or_insert(Directive::ClearanceChanged {
                    aircraft_id: aircraft_id.to_string(),
                    state: next,
                });
        }
        ClearanceState::RequestedTaxi => {
            if ensure_route(state, rules, aircraft_id, out)?
                && reserve_ahead(state, rules, now, aircraft_id, out)?
            {
                let next = state.apply_clearance(aircraft_id, ClearanceEvent::GrantTaxi, now)?;
                out.entry(aircraft_id.to_string())
                    .or_insert(Directive::ClearanceChanged {
                        aircraft_id: aircraft_id.to_string(),
                        state: next,
                    });
            }
        }
        _ => {}
    }

    // Any clearance that permits movement keeps following its route.
    // Arrivals are cleared straight off the landing roll and may not
    // have a route yet.
    let movement_permitted = state
        .clearances
        .get(aircraft_id)
        .map(|clearance| clearance.movement_permitted())
        .unwrap_or(false);
    if movement_permitted {
        ensure_route(state, rules, aircraft_id, out)?;
        advance_route(state, rules, now, aircraft_id, out)?;
    }

    process_runway_request(state, rules, aircraft_id, out);
    Ok(())
}

/// Compute and assign a route when the aircraft has a taxi goal but no
/// route yet. Returns whether a route is in place.
fn ensure_route(
    state: &mut GroundState,
    rules: &Rules,
    aircraft_id: &str,
    out: &mut DirectiveSlots,
) -> Result<bool, GroundError> {
    let (has_route, goal, position) = {
        let track = state
            .tracks
            .get(aircraft_id)
            .ok_or_else(|| GroundError::UnknownAircraft(aircraft_id.to_string()))?;
        (!track.route.is_empty(), track.taxi_goal, track.position)
    };
    if has_route {
        return Ok(true);
    }
    let Some(goal) = goal else {
        return Ok(false);
    };
    let start = state
        .nearest_node(position)
        .ok_or_else(|| GroundError::InvalidNetwork("network has no nodes".to_string()))?;
    let constraints = RouteConstraints::with_algorithm(RouteAlgorithm::AStar);
    let route = match find_route(&state.network, start, goal, &constraints) {
        Ok(route) => route,
        Err(error) => return route_failure(state, rules, aircraft_id, goal, error),
    };
    if let Some(track) = state.tracks.get_mut(aircraft_id) {
        track.route = route.clone();
        track.route_progress = 0;
        track.reservation_retries = 0;
        track.route_failures = 0;
    }
    out.entry(aircraft_id.to_string())
        .or_insert(Directive::AssignedRoute {
            aircraft_id: aircraft_id.to_string(),
            route,
        });
    Ok(true)
}

/// Count a failed route computation. Within the bound the error
/// propagates for per-cycle logging; past it the goal is abandoned and
/// reported once, never retried again.
fn route_failure(
    state: &mut GroundState,
    rules: &Rules,
    aircraft_id: &str,
    goal: NodeId,
    error: GroundError,
) -> Result<bool, GroundError> {
    let failures = {
        let track = state
            .tracks
            .get_mut(aircraft_id)
            .ok_or_else(|| GroundError::UnknownAircraft(aircraft_id.to_string()))?;
        track.route_failures += 1;
        track.route_failures
    };
    if failures <= rules.max_route_retries {
        return Err(error);
    }
    if let Some(track) = state.tracks.get_mut(aircraft_id) {
        track.taxi_goal = None;
        track.route.clear();
        track.route_progress = 0;
        track.route_failures = 0;
    }
    tracing::warn!(aircraft = %aircraft_id, %error, "no route to goal, abandoning");
    state.push_alert(Alert::RouteFailed {
        aircraft_id: aircraft_id.to_string(),
        goal,
    });
    Ok(false)
}

/// Try to reserve the next edge of the route. Contention queues the
/// aircraft on the segment and counts toward a bounded re-plan; it is
/// re-scheduled next cycle, never retried inline.
fn reserve_ahead(
    state: &mut GroundState,
    rules: &Rules,
    now: DateTime<Utc>,
    aircraft_id: &str,
    out: &mut DirectiveSlots,
) -> Result<bool, GroundError> {
    let (route, progress, goal, emergency) = {
        let track = state
            .tracks
            .get(aircraft_id)
            .ok_or_else(|| GroundError::UnknownAircraft(aircraft_id.to_string()))?;
        (
            track.route.clone(),
            track.route_progress,
            track.taxi_goal,
            track.emergency,
        )
    };
    if route.len() < 2 || progress + 1 >= route.len() {
        return Ok(true);
    }
    let edge = state
        .network
        .edge_between(route[progress], route[progress + 1])
        .ok_or_else(|| GroundError::InvalidNetwork("route edge missing".to_string()))?;

    match state.network.reserve(edge, aircraft_id) {
        Ok(()) => {
            // Drop any queue entry from earlier contention on this edge.
            state
                .sequencer
                .remove(&ResourceId::TaxiSegment { edge }, aircraft_id);
            if let Some(track) = state.tracks.get_mut(aircraft_id) {
                track.reservation_retries = 0;
            }
            Ok(true)
        }
        Err(_) => {
            let retries = {
                let track = state
                    .tracks
                    .get_mut(aircraft_id)
                    .ok_or_else(|| GroundError::UnknownAircraft(aircraft_id.to_string()))?;
                track.reservation_retries += 1;
                track.reservation_retries
            };
            if retries > rules.max_reservation_retries {
                // Repeated contention: re-plan around the segment
                let Some(goal) = goal else {
                    return Ok(false);
                };
                let mut constraints = RouteConstraints::with_algorithm(RouteAlgorithm::AStar);
                constraints.avoid_edges.insert(edge);
                let new_route = match find_route(&state.network, route[progress], goal, &constraints)
                {
                    Ok(new_route) => new_route,
                    Err(error) => {
                        state
                            .sequencer
                            .remove(&ResourceId::TaxiSegment { edge }, aircraft_id);
                        return route_failure(state, rules, aircraft_id, goal, error);
                    }
                };
                tracing::info!(aircraft = %aircraft_id, ?edge, "re-planned around contended segment");
                state
                    .sequencer
                    .remove(&ResourceId::TaxiSegment { edge }, aircraft_id);
                if let Some(track) = state.tracks.get_mut(aircraft_id) {
                    track.route = new_route.clone();
                    track.route_progress = 0;
                    track.reservation_retries = 0;
                }
                out.insert(
                    aircraft_id.to_string(),
                    Directive::AssignedRoute {
                        aircraft_id: aircraft_id.to_string(),
                        route: new_route,
                    },
                );
                Ok(false)
            } else {
                state.sequencer.enqueue(SequenceEntry {
                    aircraft_id: aircraft_id.to_string(),
                    resource: ResourceId::TaxiSegment { edge },
                    emergency,
                    ready_at: now,
                    requested_at: now,
                });
                Ok(false)
            }
        }
    }
}

/// Follow the assigned route: release edges behind the aircraft, keep
/// the edge ahead reserved, hold short at the end of a departure route.
fn advance_route(
    state: &mut GroundState,
    rules: &Rules,
    now: DateTime<Utc>,
    aircraft_id: &str,
    out: &mut DirectiveSlots,
) -> Result<(), GroundError> {
    let (route, mut progress, position) = {
        let track = state
            .tracks
            .get(aircraft_id)
            .ok_or_else(|| GroundError::UnknownAircraft(aircraft_id.to_string()))?;
        (track.route.clone(), track.route_progress, track.position)
    };
    if route.is_empty() {
        return Ok(());
    }

    while progress + 1 < route.len() {
        let next = route[progress + 1];
        let next_pos = state
            .network
            .node(next)
            .ok_or_else(|| GroundError::InvalidNetwork("route node missing".to_string()))?
            .position;
        if position.distance(next_pos) > ARRIVAL_RADIUS_M {
            break;
        }
        // Passed this segment; hand it back.
        if let Some(edge) = state.network.edge_between(route[progress], next) {
            state.network.release(edge, aircraft_id);
        }
        progress += 1;
    }

    if progress + 1 >= route.len() {
        if let Some(track) = state.tracks.get_mut(aircraft_id) {
            track.route.clear();
            track.route_progress = 0;
            track.taxi_goal = None;
        }
        if state.departures.contains_key(aircraft_id) {
            let next = state.apply_clearance(aircraft_id, ClearanceEvent::HoldShort, now)?;
            out.entry(aircraft_id.to_string())
                .or_insert(Directive::ClearanceChanged {
                    aircraft_id: aircraft_id.to_string(),
                    state: next,
                });
        }
        return Ok(());
    }

    if let Some(track) = state.tracks.get_mut(aircraft_id) {
        track.route_progress = progress;
    }
    reserve_ahead(state, rules, now, aircraft_id, out)?;
    Ok(())
}

/// Assign a runway to a pending departure or arrival and put it in the
/// runway queue. A `NoSuitableRunway` outcome holds the aircraft and
/// alerts once; the candidate set is re-evaluated every slow cycle.
fn process_runway_request(
    state: &mut GroundState,
    rules: &Rules,
    aircraft_id: &str,
    out: &mut DirectiveSlots,
) {
    let request = match state
        .departures
        .get(aircraft_id)
        .or_else(|| state.arrivals.get(aircraft_id))
    {
        Some(request) => request.clone(),
        None => return,
    };
    let Some(track) = state.tracks.get(aircraft_id) else {
        return;
    };
    if track.assigned_runway.is_some() {
        return;
    }
    let performance = track.performance.clone();
    let emergency = track.emergency;

    let selected = ground_core::select_runway(&state.runways, state.wind, &performance, rules)
        .map(|runway| runway.id.clone());
    match selected {
        Ok(runway_id) => {
            if let Some(track) = state.tracks.get_mut(aircraft_id) {
                track.assigned_runway = Some(runway_id.clone());
            }
            state.sequencer.enqueue(SequenceEntry {
                aircraft_id: aircraft_id.to_string(),
                resource: ResourceId::runway(runway_id.clone()),
                emergency,
                ready_at: request.ready_at,
                requested_at: request.requested_at,
            });
            tracing::info!(aircraft = %aircraft_id, runway = %runway_id, "runway assigned");
            out.entry(aircraft_id.to_string())
                .or_insert(Directive::AssignedRunway {
                    aircraft_id: aircraft_id.to_string(),
                    runway_id,
                });
        }
        Err(GroundError::NoSuitableRunway) if !request.alerted => {
            tracing::warn!(aircraft = %aircraft_id, "no suitable runway, holding");
            state.push_alert(Alert::NoSuitableRunway {
                aircraft_id: aircraft_id.to_string(),
            });
            if let Some(request) = state
                .departures
                .get_mut(aircraft_id)
                .or_else(|| state.arrivals.get_mut(aircraft_id))
            {
                request.alerted = true;
            }
        }
        Err(_) => {}
    }
}

/// Admit queue heads onto free resources. A runway stays exclusively
/// held for the separation window after each admission; a taxi segment
/// is free when unreserved.
fn admit_queues(
    state: &mut GroundState,
    rules: &Rules,
    now: DateTime<Utc>,
    out: &mut DirectiveSlots,
) {
    state.runway_holds.retain(|_, hold| hold.until > now);

    let resources: Vec<ResourceId> = state.sequencer.queued_resources().cloned().collect();
    for resource in resources {
        match &resource {
            ResourceId::Runway { runway_id } => {
                let free = !state.runway_holds.contains_key(runway_id);
                let Some(entry) = state.sequencer.admit(&resource, free) else {
                    continue;
                };
                let aircraft_id = entry.aircraft_id.clone();
                // An arrival is admitted from the air; a departure only
                // once it reached the hold point. Either way, nobody
                // behind the head may jump the queue.
                let arrival = state.arrivals.contains_key(&aircraft_id);
                if !arrival {
                    let holding_short = state
                        .clearances
                        .get(&aircraft_id)
                        .map(|c| c.state() == ClearanceState::HoldingShort)
                        .unwrap_or(false);
                    if !holding_short {
                        continue;
                    }
                }
                let event = if arrival {
                    ClearanceEvent::GrantLanding
                } else {
                    ClearanceEvent::GrantTakeoff
                };
                match state.apply_clearance(&aircraft_id, event, now) {
                    Ok(next) => {
                        tracing::info!(aircraft = %aircraft_id, runway = %runway_id, state = ?next, "runway use granted");
                        state.runway_holds.insert(
                            runway_id.clone(),
                            RunwayHold {
                                aircraft_id: aircraft_id.clone(),
                                until: now + Duration::seconds(rules.runway_separation_secs),
                            },
                        );
                        state.sequencer.remove(&resource, &aircraft_id);
                        state.arrivals.remove(&aircraft_id);
                        out.entry(aircraft_id.clone())
                            .or_insert(Directive::ClearanceChanged {
                                aircraft_id,
                                state: next,
                            });
                    }
                    Err(error) => {
                        tracing::warn!(aircraft = %aircraft_id, %error, "runway admission rejected");
                    }
                }
            }
            ResourceId::TaxiSegment { edge } => {
                let free = state.network.edge_reserved_by(*edge).is_none();
                let Some(entry) = state.sequencer.admit(&resource, free) else {
                    continue;
                };
                let aircraft_id = entry.aircraft_id.clone();
                if state.network.reserve(*edge, &aircraft_id).is_ok() {
                    state.sequencer.remove(&resource, &aircraft_id);
                    if let Some(track) = state.tracks.get_mut(&aircraft_id) {
                        track.reservation_retries = 0;
                    }
                }
            }
        }
    }
}

/// Queue positions for aircraft that got no other directive this cycle.
fn sequence_positions(state: &GroundState, out: &mut DirectiveSlots) {
    let resources: Vec<ResourceId> = state.sequencer.queued_resources().cloned().collect();
    for resource in resources {
        for (position, entry) in state.sequencer.entries(&resource).enumerate() {
            out.entry(entry.aircraft_id.clone())
                .or_insert(Directive::SequencePosition {
                    aircraft_id: entry.aircraft_id.clone(),
                    resource: resource.clone(),
                    position,
                });
        }
    }
}

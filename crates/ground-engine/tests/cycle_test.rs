//! End-to-end cycle tests.
//!
//! Drive the fast and slow cycles directly over a small airport and
//! assert on the directives, clearance states and reservations they
//! produce.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ground_core::{
    ClearanceEvent, ClearanceState, ConflictSeverity, Directive, EdgeId, FlightPhase, Footprint,
    ManeuverKind, NodeId, ParkingPosition, ResourceId, Rules, Runway, TaxiwayNetwork,
    TrackSnapshot, Vec2, WindSnapshot,
};
use ground_engine::{GroundState, Orchestrator, RunwayRequest};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn snapshot(
    id: &str,
    position: Vec2,
    velocity: Vec2,
    altitude_m: f64,
    phase: FlightPhase,
    timestamp: DateTime<Utc>,
) -> TrackSnapshot {
    TrackSnapshot {
        aircraft_id: id.to_string(),
        position,
        altitude_m,
        velocity,
        vertical_mps: 0.0,
        heading_deg: 90.0,
        footprint: Footprint::Circle { radius_m: 5.0 },
        phase,
        emergency: false,
        timestamp,
    }
}

/// Straight-line taxiway n0-n1-n2-n3 with one runway and a stand at n0.
fn straight_airport() -> (GroundState, [NodeId; 4], [EdgeId; 3]) {
    let mut network = TaxiwayNetwork::default();
    let n0 = network.add_node(Vec2::new(0.0, 0.0));
    let n1 = network.add_node(Vec2::new(300.0, 0.0));
    let n2 = network.add_node(Vec2::new(700.0, 0.0));
    let n3 = network.add_node(Vec2::new(1200.0, 0.0));
    let e0 = network.add_edge(n0, n1, false).unwrap();
    let e1 = network.add_edge(n1, n2, false).unwrap();
    let e2 = network.add_edge(n2, n3, false).unwrap();

    let runways = vec![Runway {
        id: "09".to_string(),
        heading_deg: 90.0,
        length_m: 2400.0,
        width_m: 45.0,
        threshold: Vec2::new(1250.0, 0.0),
        has_ils: false,
    }];
    let parking = vec![ParkingPosition::new("G1", Vec2::new(0.0, 0.0))];
    let state = GroundState::new(network, runways, parking);
    (state, [n0, n1, n2, n3], [e0, e1, e2])
}

/// Walk a clearance from `Idle` to `HoldingShort` through the normal
/// departure events.
fn clear_to_holding(state: &mut GroundState, aircraft_id: &str, now: DateTime<Utc>) {
    for event in [
        ClearanceEvent::RequestPushback,
        ClearanceEvent::GrantPushback,
        ClearanceEvent::RequestTaxi,
        ClearanceEvent::GrantTaxi,
        ClearanceEvent::HoldShort,
    ] {
        state.apply_clearance(aircraft_id, event, now).unwrap();
    }
}

#[test]
fn test_fast_cycle_emits_avoidance_and_drops_resolved_conflict() {
    let (state, _, _) = straight_airport();
    let mut orch = Orchestrator::new(state, Rules::default());
    let now = t0();

    // Head-on at 1000 m with a 300 m lateral offset: CPA in 15 s at
    // 300 m, inside the 500 m airborne standard.
    let snapshots = vec![
        snapshot(
            "A1",
            Vec2::new(0.0, 0.0),
            Vec2::new(50.0, 0.0),
            1000.0,
            FlightPhase::Airborne,
            now,
        ),
        snapshot(
            "B2",
            Vec2::new(1500.0, 300.0),
            Vec2::new(-50.0, 0.0),
            1000.0,
            FlightPhase::Airborne,
            now,
        ),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), now);
    orch.tick_fast(now);

    assert_eq!(orch.state.active_conflicts.len(), 1);
    let conflict = &orch.state.active_conflicts[0];
    assert_eq!(conflict.severity, ConflictSeverity::Urgent);
    assert!((conflict.time_to_cpa_s - 15.0).abs() < 0.1);

    // A1 has right of way; the evasive maneuver goes to B2 alone.
    let directives = orch.drain_directives();
    assert_eq!(directives.len(), 1);
    match &directives[0] {
        Directive::Avoidance(maneuver) => assert_eq!(maneuver.aircraft_id, "B2"),
        other => panic!("expected avoidance, got {other:?}"),
    }
    assert!(orch.drain_alerts().is_empty());

    // Diverging now: the conflict disappears without any explicit clear.
    let later = now + Duration::seconds(1);
    let snapshots = vec![
        snapshot(
            "A1",
            Vec2::new(0.0, 0.0),
            Vec2::new(-50.0, 0.0),
            1000.0,
            FlightPhase::Airborne,
            later,
        ),
        snapshot(
            "B2",
            Vec2::new(1500.0, 300.0),
            Vec2::new(50.0, 0.0),
            1000.0,
            FlightPhase::Airborne,
            later,
        ),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), later);
    orch.tick_fast(later);
    assert!(orch.state.active_conflicts.is_empty());
    assert!(orch.drain_directives().is_empty());
}

#[test]
fn test_pushback_then_taxi_grants_route_and_reservation() {
    let (mut state, nodes, edges) = straight_airport();
    state.assign_parking("G1", "GA101").unwrap();
    let mut orch = Orchestrator::new(state, Rules::default());
    let now = t0();

    let snapshots = vec![snapshot(
        "GA101",
        Vec2::new(0.0, 0.0),
        Vec2::ZERO,
        0.0,
        FlightPhase::Parked,
        now,
    )];
    orch.ingest(&snapshots, WindSnapshot::default(), now);

    orch.request_pushback("GA101", now).unwrap();
    orch.tick_slow(now);

    assert_eq!(
        orch.state.clearances["GA101"].state(),
        ClearanceState::ClearedPushback
    );
    // Pushback frees the stand.
    assert!(orch.state.parking[0].aircraft_id.is_none());
    let directives = orch.drain_directives();
    assert_eq!(directives.len(), 1);
    assert!(matches!(
        &directives[0],
        Directive::ClearanceChanged {
            state: ClearanceState::ClearedPushback,
            ..
        }
    ));

    let later = now + Duration::seconds(1);
    orch.request_taxi("GA101", nodes[3], later).unwrap();
    orch.tick_slow(later);

    assert_eq!(
        orch.state.clearances["GA101"].state(),
        ClearanceState::ClearedTaxi
    );
    assert_eq!(orch.state.tracks["GA101"].route, nodes.to_vec());
    assert_eq!(orch.state.network.edge_reserved_by(edges[0]), Some("GA101"));
    // One directive per aircraft per cycle: the route wins over the
    // clearance change.
    let directives = orch.drain_directives();
    assert_eq!(directives.len(), 1);
    assert!(matches!(&directives[0], Directive::AssignedRoute { .. }));
}

#[test]
fn test_contended_edge_queues_then_admits() {
    let (state, nodes, edges) = straight_airport();
    let mut orch = Orchestrator::new(state, Rules::default());
    let now = t0();

    let snapshots = vec![
        snapshot(
            "TXA",
            Vec2::new(0.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            now,
        ),
        snapshot(
            "TXB",
            Vec2::new(0.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            now,
        ),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), now);
    for id in ["TXA", "TXB"] {
        orch.request_pushback(id, now).unwrap();
    }
    orch.tick_slow(now);
    let later = now + Duration::seconds(1);
    for id in ["TXA", "TXB"] {
        orch.request_taxi(id, nodes[2], later).unwrap();
    }
    orch.drain_directives();

    orch.tick_slow(later);

    // Lower id reserves the shared first edge; the other queues.
    assert_eq!(
        orch.state.clearances["TXA"].state(),
        ClearanceState::ClearedTaxi
    );
    assert_eq!(
        orch.state.clearances["TXB"].state(),
        ClearanceState::RequestedTaxi
    );
    assert_eq!(orch.state.network.edge_reserved_by(edges[0]), Some("TXA"));
    assert_eq!(
        orch.state
            .sequencer
            .queue_len(&ResourceId::TaxiSegment { edge: edges[0] }),
        1
    );
    orch.drain_directives();

    // TXA reaches n1: it releases the edge behind and takes the next
    // one, letting TXB in behind it.
    let t2 = later + Duration::seconds(5);
    let snapshots = vec![
        snapshot(
            "TXA",
            Vec2::new(300.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            t2,
        ),
        snapshot(
            "TXB",
            Vec2::new(0.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            t2,
        ),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), t2);
    orch.tick_slow(t2);

    assert_eq!(orch.state.network.edge_reserved_by(edges[1]), Some("TXA"));
    assert_eq!(orch.state.network.edge_reserved_by(edges[0]), Some("TXB"));
    assert_eq!(
        orch.state.clearances["TXB"].state(),
        ClearanceState::ClearedTaxi
    );
    assert_eq!(
        orch.state
            .sequencer
            .queue_len(&ResourceId::TaxiSegment { edge: edges[0] }),
        0
    );
}

#[test]
fn test_runway_sequencing_with_separation_window() {
    let (mut state, _, _) = straight_airport();
    let now = t0();
    let holding = Vec2::new(1200.0, 0.0);
    let snapshots = vec![
        snapshot("DEP1", holding, Vec2::ZERO, 0.0, FlightPhase::Taxiing, now),
        snapshot("DEP2", holding, Vec2::ZERO, 0.0, FlightPhase::Taxiing, now),
    ];
    state.ingest(&snapshots, WindSnapshot::default(), now);
    clear_to_holding(&mut state, "DEP1", now);
    clear_to_holding(&mut state, "DEP2", now);
    state.departures.insert(
        "DEP1".to_string(),
        RunwayRequest {
            requested_at: now,
            ready_at: now,
            alerted: false,
        },
    );
    state.departures.insert(
        "DEP2".to_string(),
        RunwayRequest {
            requested_at: now,
            ready_at: now + Duration::seconds(5),
            alerted: false,
        },
    );
    let mut orch = Orchestrator::new(state, Rules::default());

    let t1 = now + Duration::seconds(1);
    orch.tick_slow(t1);

    // Earlier ready time goes first; the runway holds for the
    // separation window behind it.
    assert_eq!(
        orch.state.clearances["DEP1"].state(),
        ClearanceState::ClearedTakeoff
    );
    assert_eq!(
        orch.state.clearances["DEP2"].state(),
        ClearanceState::HoldingShort
    );
    assert_eq!(orch.state.tracks["DEP1"].assigned_runway.as_deref(), Some("09"));
    assert!(orch.state.runway_holds.contains_key("09"));

    // Still inside the separation window: nobody else is admitted.
    let t2 = t1 + Duration::seconds(10);
    let snapshots = vec![
        snapshot("DEP1", holding, Vec2::ZERO, 0.0, FlightPhase::TakeoffRoll, t2),
        snapshot("DEP2", holding, Vec2::ZERO, 0.0, FlightPhase::Taxiing, t2),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), t2);
    orch.tick_slow(t2);
    assert_eq!(
        orch.state.clearances["DEP2"].state(),
        ClearanceState::HoldingShort
    );

    // Window elapsed: the next in line gets the runway.
    let t3 = t1 + Duration::seconds(120);
    let snapshots = vec![
        snapshot("DEP1", holding, Vec2::ZERO, 0.0, FlightPhase::TakeoffRoll, t3),
        snapshot("DEP2", holding, Vec2::ZERO, 0.0, FlightPhase::Taxiing, t3),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), t3);
    orch.tick_slow(t3);
    assert_eq!(
        orch.state.clearances["DEP2"].state(),
        ClearanceState::ClearedTakeoff
    );
    assert_eq!(orch.state.runway_holds["09"].aircraft_id, "DEP2");
}

#[test]
fn test_arrival_waits_for_runway_separation_window() {
    let (mut state, _, _) = straight_airport();
    let now = t0();
    let holding = Vec2::new(1200.0, 0.0);
    state.ingest(
        &[snapshot("DEP", holding, Vec2::ZERO, 0.0, FlightPhase::Taxiing, now)],
        WindSnapshot::default(),
        now,
    );
    clear_to_holding(&mut state, "DEP", now);
    state.departures.insert(
        "DEP".to_string(),
        RunwayRequest {
            requested_at: now,
            ready_at: now,
            alerted: false,
        },
    );
    let mut orch = Orchestrator::new(state, Rules::default());

    let t1 = now + Duration::seconds(1);
    orch.tick_slow(t1);
    assert_eq!(
        orch.state.clearances["DEP"].state(),
        ClearanceState::ClearedTakeoff
    );
    assert!(orch.state.runway_holds.contains_key("09"));

    // An inbound checks in while the departure's window is active. It
    // gets the runway assignment and a queue slot, not a clearance.
    let t2 = t1 + Duration::seconds(5);
    let snapshots = vec![
        snapshot("DEP", holding, Vec2::ZERO, 0.0, FlightPhase::TakeoffRoll, t2),
        snapshot(
            "ARR",
            Vec2::new(4000.0, 0.0),
            Vec2::new(-70.0, 0.0),
            300.0,
            FlightPhase::Approach,
            t2,
        ),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), t2);
    orch.register_arrival("ARR", t2).unwrap();
    orch.tick_slow(t2);
    assert_eq!(
        orch.state.clearances["ARR"].state(),
        ClearanceState::Idle
    );
    assert_eq!(
        orch.state.tracks["ARR"].assigned_runway.as_deref(),
        Some("09")
    );
    assert_eq!(orch.state.sequencer.queue_len(&ResourceId::runway("09")), 1);

    // Window elapsed: the arrival is cleared to land and takes its own
    // hold on the runway.
    let t3 = t1 + Duration::seconds(120);
    let snapshots = vec![
        snapshot("DEP", holding, Vec2::ZERO, 0.0, FlightPhase::TakeoffRoll, t3),
        snapshot(
            "ARR",
            Vec2::new(2000.0, 0.0),
            Vec2::new(-70.0, 0.0),
            150.0,
            FlightPhase::Approach,
            t3,
        ),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), t3);
    orch.tick_slow(t3);
    assert_eq!(
        orch.state.clearances["ARR"].state(),
        ClearanceState::ClearedLanding
    );
    assert_eq!(orch.state.runway_holds["09"].aircraft_id, "ARR");
    assert!(orch.state.arrivals.is_empty());
}

#[test]
fn test_unroutable_aircraft_does_not_block_others() {
    let (mut state, nodes, _) = straight_airport();
    // An isolated node no route can reach.
    let island = state.network.add_node(Vec2::new(5000.0, 5000.0));
    let now = t0();

    let snapshots = vec![
        snapshot(
            "AAA",
            Vec2::new(0.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            now,
        ),
        snapshot(
            "BBB",
            Vec2::new(0.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            now,
        ),
    ];
    state.ingest(&snapshots, WindSnapshot::default(), now);
    let mut orch = Orchestrator::new(state, Rules::default());
    for id in ["AAA", "BBB"] {
        orch.request_pushback(id, now).unwrap();
    }
    orch.tick_slow(now);
    let later = now + Duration::seconds(1);
    orch.request_taxi("AAA", island, later).unwrap();
    orch.request_taxi("BBB", nodes[2], later).unwrap();

    orch.tick_slow(later);

    // AAA's routing failure is contained to AAA.
    assert_eq!(
        orch.state.clearances["AAA"].state(),
        ClearanceState::RequestedTaxi
    );
    assert_eq!(
        orch.state.clearances["BBB"].state(),
        ClearanceState::ClearedTaxi
    );
}

#[test]
fn test_unreachable_goal_abandoned_after_bounded_retries() {
    let (mut state, _, _) = straight_airport();
    let island = state.network.add_node(Vec2::new(5000.0, 5000.0));
    let now = t0();
    state.ingest(
        &[snapshot(
            "AAA",
            Vec2::new(0.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            now,
        )],
        WindSnapshot::default(),
        now,
    );
    let mut orch = Orchestrator::new(state, Rules::default());
    orch.request_pushback("AAA", now).unwrap();
    orch.tick_slow(now);
    let later = now + Duration::seconds(1);
    orch.request_taxi("AAA", island, later).unwrap();

    // Failures inside the bound keep the goal and stay quiet; the
    // cycle after the bound clears it and reports once.
    let retries = orch.rules.max_route_retries;
    for step in 0..=retries {
        let t = later + Duration::seconds(i64::from(step));
        orch.tick_slow(t);
    }
    assert!(orch.state.tracks["AAA"].taxi_goal.is_none());
    let alerts = orch.drain_alerts();
    let failed: Vec<_> = alerts
        .iter()
        .filter(|alert| {
            matches!(
                alert,
                ground_core::Alert::RouteFailed { aircraft_id, .. } if aircraft_id == "AAA"
            )
        })
        .collect();
    assert_eq!(failed.len(), 1);

    // Abandoned means abandoned: later cycles stay quiet.
    let much_later = later + Duration::seconds(8);
    orch.ingest(
        &[snapshot(
            "AAA",
            Vec2::new(0.0, 0.0),
            Vec2::ZERO,
            0.0,
            FlightPhase::Taxiing,
            much_later,
        )],
        WindSnapshot::default(),
        much_later,
    );
    orch.tick_slow(much_later);
    assert!(orch.drain_alerts().is_empty());
    assert_eq!(
        orch.state.clearances["AAA"].state(),
        ClearanceState::RequestedTaxi
    );
}

#[test]
fn test_removal_releases_everything() {
    let (mut state, nodes, edges) = straight_airport();
    let now = t0();
    let snapshots = vec![snapshot(
        "TXA",
        Vec2::new(0.0, 0.0),
        Vec2::ZERO,
        0.0,
        FlightPhase::Taxiing,
        now,
    )];
    state.ingest(&snapshots, WindSnapshot::default(), now);
    let mut orch = Orchestrator::new(state, Rules::default());
    orch.request_pushback("TXA", now).unwrap();
    orch.tick_slow(now);
    let later = now + Duration::seconds(1);
    orch.request_taxi("TXA", nodes[3], later).unwrap();
    orch.request_departure("TXA", later, later).unwrap();
    orch.tick_slow(later);
    assert_eq!(orch.state.network.edge_reserved_by(edges[0]), Some("TXA"));
    orch.drain_directives();
    orch.drain_alerts();

    orch.remove_aircraft("TXA");

    assert!(orch.state.network.reservations_of("TXA").is_empty());
    assert!(orch.state.tracks.is_empty());
    assert!(orch.state.clearances.is_empty());
    assert!(orch.state.departures.is_empty());
    let alerts = orch.drain_alerts();
    assert!(alerts.iter().any(|alert| matches!(
        alert,
        ground_core::Alert::TrackDropped { aircraft_id, .. } if aircraft_id == "TXA"
    )));
}

#[test]
fn test_stuck_clearance_recovers_on_dwell_timeout() {
    let (mut state, _, _) = straight_airport();
    let now = t0();
    let snapshots = vec![snapshot(
        "STK",
        Vec2::new(0.0, 0.0),
        Vec2::ZERO,
        0.0,
        FlightPhase::Taxiing,
        now,
    )];
    state.ingest(&snapshots, WindSnapshot::default(), now);
    // Granted takeoff but never rolling.
    clear_to_holding(&mut state, "STK", now);
    state
        .apply_clearance("STK", ClearanceEvent::GrantTakeoff, now)
        .unwrap();
    let mut orch = Orchestrator::new(state, Rules::default());

    let late = now + Duration::seconds(200);
    let snapshots = vec![snapshot(
        "STK",
        Vec2::new(1200.0, 0.0),
        Vec2::ZERO,
        0.0,
        FlightPhase::Taxiing,
        late,
    )];
    orch.ingest(&snapshots, WindSnapshot::default(), late);
    orch.tick_slow(late);

    // A runway-critical state that dwells past its limit terminates and
    // the aircraft is flushed for manual handling.
    let directives = orch.drain_directives();
    assert!(directives.iter().any(|d| matches!(
        d,
        Directive::ClearanceChanged {
            state: ClearanceState::Terminated,
            ..
        }
    )));
    assert!(!orch.state.tracks.contains_key("STK"));
}

#[test]
fn test_taxi_maneuver_is_speed_change_only() {
    let (state, _, _) = straight_airport();
    let mut orch = Orchestrator::new(state, Rules::default());
    let now = t0();

    // Two taxiing aircraft closing at 8 m/s, 100 m apart: CPA 12.5 s.
    let snapshots = vec![
        snapshot(
            "TXA",
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            0.0,
            FlightPhase::Taxiing,
            now,
        ),
        snapshot(
            "TXB",
            Vec2::new(100.0, 0.0),
            Vec2::new(-4.0, 0.0),
            0.0,
            FlightPhase::Taxiing,
            now,
        ),
    ];
    orch.ingest(&snapshots, WindSnapshot::default(), now);
    orch.tick_fast(now);

    let directives = orch.drain_directives();
    assert!(!directives.is_empty());
    for directive in directives {
        match directive {
            Directive::Avoidance(m) => {
                assert!(matches!(m.kind, ManeuverKind::SpeedChange { delta_mps } if delta_mps < 0.0))
            }
            other => panic!("expected avoidance, got {other:?}"),
        }
    }
}

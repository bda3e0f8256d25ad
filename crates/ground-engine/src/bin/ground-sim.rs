//! Ground simulation driver - runs the engine over a small demo airport
//! with a scripted traffic scenario and prints every directive and
//! alert it produces.

use anyhow::Result;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ground_core::{
    Footprint, ParkingPosition, ParkingStatus, Rules, Runway, TaxiwayNetwork, TrackSnapshot, Vec2,
    WindSnapshot,
};
use ground_engine::{EngineConfig, GroundState, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ground_engine=debug".parse()?)
                .add_directive("ground_sim=info".parse()?),
        )
        .init();

    tracing::info!("Starting ground simulation...");

    let (state, holding_node) = demo_airport()?;
    let orchestrator = Arc::new(Mutex::new(Orchestrator::new(state, Rules::default())));

    let (directive_tx, mut directive_rx) = mpsc::unbounded_channel();
    let (alert_tx, mut alert_rx) = mpsc::unbounded_channel();
    tokio::spawn(ground_engine::run_engine(
        orchestrator.clone(),
        EngineConfig::from_env(),
        directive_tx,
        alert_tx,
    ));

    // One departure taxiing gate to holding point, one aircraft already
    // rolling from the far side so the two meet on the straight.
    let now = Utc::now();
    let wind = WindSnapshot {
        direction_deg: 250.0,
        speed_kts: 12.0,
    };
    let snapshots = vec![
        snapshot("GA101", Vec2::new(0.0, 0.0), 90.0, 0.0, now),
        snapshot("GA202", Vec2::new(1200.0, 0.0), 270.0, 8.0, now),
    ];

    {
        let mut orch = orchestrator
            .lock()
            .map_err(|_| anyhow::anyhow!("orchestrator lock poisoned"))?;
        orch.ingest(&snapshots, wind, now);
        orch.request_pushback("GA101", now)?;
        orch.request_departure("GA101", now, now)?;
    }

    // Let the slow cycle grant pushback before GA101 asks to taxi.
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    {
        let mut orch = orchestrator
            .lock()
            .map_err(|_| anyhow::anyhow!("orchestrator lock poisoned"))?;
        let now = Utc::now();
        orch.request_taxi("GA101", holding_node, now).ok();
    }

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        tokio::select! {
            Some(directive) = directive_rx.recv() => {
                println!("DIRECTIVE {}", serde_json::to_string(&directive)?);
            }
            Some(alert) = alert_rx.recv() => {
                println!("ALERT     {}", serde_json::to_string(&alert)?);
            }
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    tracing::info!("Simulation finished");
    Ok(())
}

fn snapshot(
    id: &str,
    position: Vec2,
    heading_deg: f64,
    speed_mps: f64,
    now: chrono::DateTime<Utc>,
) -> TrackSnapshot {
    TrackSnapshot {
        aircraft_id: id.to_string(),
        position,
        altitude_m: 0.0,
        velocity: Vec2::from_heading_deg(heading_deg) * speed_mps,
        vertical_mps: 0.0,
        heading_deg,
        footprint: Footprint::Circle { radius_m: 18.0 },
        phase: ground_core::FlightPhase::Taxiing,
        emergency: false,
        timestamp: now,
    }
}

/// A one-runway airport: gate, apron, a straight taxiway and the
/// runway 24 holding point.
fn demo_airport() -> Result<(GroundState, ground_core::NodeId)> {
    let mut network = TaxiwayNetwork::default();
    let gate = network.add_node(Vec2::new(0.0, 0.0));
    let apron = network.add_node(Vec2::new(300.0, 0.0));
    let mid = network.add_node(Vec2::new(700.0, 0.0));
    let holding = network.add_node(Vec2::new(1200.0, 0.0));
    network.add_edge(gate, apron, false)?;
    network.add_edge(apron, mid, false)?;
    network.add_edge(mid, holding, false)?;

    let runways = vec![Runway {
        id: "24".to_string(),
        heading_deg: 240.0,
        length_m: 2400.0,
        width_m: 45.0,
        threshold: Vec2::new(1250.0, 0.0),
        has_ils: true,
    }];
    let parking = vec![ParkingPosition {
        id: "G1".to_string(),
        position: Vec2::new(0.0, 0.0),
        status: ParkingStatus::Free,
        aircraft_id: None,
    }];

    let mut state = GroundState::new(network, runways, parking);
    state.assign_parking("G1", "GA101")?;
    Ok((state, holding))
}

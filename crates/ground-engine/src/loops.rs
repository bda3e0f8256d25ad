//! Background engine driver.
//!
//! Runs the fast and slow cycles on independent intervals over one
//! shared orchestrator and forwards drained directives and alerts to
//! the external communication channels.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::interval;

use crate::config::EngineConfig;
use crate::orchestrator::Orchestrator;
use chrono::Utc;
use ground_core::{Alert, Directive};

/// Drive both cycles until a receiver side hangs up.
pub async fn run_engine(
    orchestrator: Arc<Mutex<Orchestrator>>,
    config: EngineConfig,
    directives: UnboundedSender<Directive>,
    alerts: UnboundedSender<Alert>,
) {
    let mut fast = interval(Duration::from_millis(config.fast_cycle_ms));
    let mut slow = interval(Duration::from_millis(config.slow_cycle_ms));

    tracing::info!(
        fast_ms = config.fast_cycle_ms,
        slow_ms = config.slow_cycle_ms,
        "engine loops started"
    );

    loop {
        let (out_directives, out_alerts) = tokio::select! {
            _ = fast.tick() => {
                let now = Utc::now();
                match orchestrator.lock() {
                    Ok(mut orch) => {
                        orch.tick_fast(now);
                        (orch.drain_directives(), orch.drain_alerts())
                    }
                    Err(_) => {
                        tracing::error!("orchestrator lock poisoned, stopping engine");
                        return;
                    }
                }
            }
            _ = slow.tick() => {
                let now = Utc::now();
                match orchestrator.lock() {
                    Ok(mut orch) => {
                        orch.tick_slow(now);
                        (orch.drain_directives(), orch.drain_alerts())
                    }
                    Err(_) => {
                        tracing::error!("orchestrator lock poisoned, stopping engine");
                        return;
                    }
                }
            }
        };

        for alert in out_alerts {
            tracing::warn!(?alert, "alert raised");
            if alerts.send(alert).is_err() {
                return;
            }
        }
        for directive in out_directives {
            tracing::debug!(aircraft = %directive.aircraft_id(), "directive issued");
            if directives.send(directive).is_err() {
                return;
            }
        }
    }
}

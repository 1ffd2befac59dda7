use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use campus_order::SweepReport;

use crate::state::AppState;

const SWEEP_LEASE: &str = "confirmation-sweeper";

/// Runs the auto-confirmation sweep every `every`. With Redis configured,
/// replicas race for a lease each tick and only the holder sweeps.
pub async fn start_confirmation_sweeper(state: AppState, every: Duration) {
    let holder = Uuid::new_v4().to_string();
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Confirmation sweeper started, every {:?}", every);

    loop {
        ticker.tick().await;

        if let Some(redis) = &state.redis {
            match redis.acquire_lease(SWEEP_LEASE, &holder, every.as_secs().max(1)).await {
                Ok(true) => {}
                Ok(false) => continue,
                // Finalization is conditional, so a duplicate sweep is harmless
                Err(e) => warn!("Sweeper lease unavailable, sweeping anyway: {}", e),
            }
        }

        sweep_once(&state).await;
    }
}

/// One sweep at the service clock's current time.
pub async fn sweep_once(state: &AppState) -> Option<SweepReport> {
    let now = state.services.clock.now();
    match state.services.confirmations.sweep(now).await {
        Ok(report) => {
            state.metrics.record_sweep(&report);
            Some(report)
        }
        Err(e) => {
            error!("Confirmation sweep failed: {}", e);
            state.metrics.sweeper_failures.inc();
            None
        }
    }
}

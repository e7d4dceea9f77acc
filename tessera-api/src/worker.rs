use std::sync::Arc;
use tessera_hold::HoldManager;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// Periodic TTL sweep. Expiry authority lives here, not with the client:
/// abandoned holds are reclaimed whether or not the browser ever calls
/// release.
pub async fn start_expiry_worker(holds: Arc<HoldManager>, sweep_interval_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(sweep_interval_seconds.max(1)));
    info!(
        interval_seconds = sweep_interval_seconds,
        "expiry worker started"
    );

    loop {
        ticker.tick().await;
        let reclaimed = holds.sweep_expired();
        if reclaimed > 0 {
            info!(reclaimed, "expired holds reclaimed");
        } else {
            debug!("expiry sweep found nothing to reclaim");
        }
    }
}

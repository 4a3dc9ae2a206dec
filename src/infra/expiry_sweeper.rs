use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::use_cases::subscription::SubscriptionUseCases;

/// Periodically marks active subscriptions whose end date has passed as expired.
pub async fn run_expiry_sweep_loop(
    subscription_use_cases: Arc<SubscriptionUseCases>,
    every_secs: u64,
) {
    let mut ticker = interval(Duration::from_secs(every_secs));

    info!(
        "Subscription expiry sweep started (running every {}s)",
        every_secs
    );

    loop {
        ticker.tick().await;

        match subscription_use_cases.expire_lapsed().await {
            Ok(0) => {}
            Ok(expired) => info!(count = expired, "Expiry sweep finished"),
            Err(e) => error!(error = ?e, "Expiry sweep failed"),
        }
    }
}

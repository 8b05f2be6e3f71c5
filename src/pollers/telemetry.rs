//! Dashboard telemetry poller (~2 Hz)

use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use super::PollerHandle;
use crate::session::messages::TelemetryUpdate;
use crate::session::HudSinks;
use crate::store::HudStore;

/// Poll `{base_url}/telemetry` on the given interval and merge each
/// snapshot into the store. Network errors skip the cycle.
pub fn start_telemetry_polling(
    client: reqwest::Client,
    base_url: String,
    period: Duration,
    store: Arc<HudStore>,
) -> PollerHandle {
    let url = format!("{}/telemetry", base_url);
    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match fetch(&client, &url).await {
                Ok(update) => {
                    trace!("Telemetry poll: {:?}", update);
                    store.update_telemetry(update);
                }
                Err(e) => {
                    debug!("Telemetry poll failed: {}", e);
                }
            }
        }
    });
    PollerHandle::new(handle)
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<TelemetryUpdate, reqwest::Error> {
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<TelemetryUpdate>()
        .await
}

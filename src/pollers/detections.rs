//! Detection list poller (~5 fps)

use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use super::PollerHandle;
use crate::session::messages::Detection;
use crate::session::HudSinks;
use crate::store::HudStore;

/// Poll `{base_url}/detections` on the given interval. The endpoint returns
/// a JSON array of boxes for the most recent inference frame. When the
/// poller is aborted the store's detections are cleared so stale boxes do
/// not linger on screen.
pub fn start_detection_polling(
    client: reqwest::Client,
    base_url: String,
    period: Duration,
    store: Arc<HudStore>,
) -> PollerHandle {
    let url = format!("{}/detections", base_url);
    let cleanup = store.clone();
    let handle = tokio::spawn(async move {
        // Runs when the task is aborted.
        let _guard = ClearOnExit { store: cleanup };
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match fetch(&client, &url).await {
                Ok(detections) => store.update_detections(detections),
                Err(e) => {
                    debug!("Detection poll failed: {}", e);
                }
            }
        }
    });
    PollerHandle::new(handle)
}

struct ClearOnExit {
    store: Arc<HudStore>,
}

impl Drop for ClearOnExit {
    fn drop(&mut self) {
        self.store.update_detections(Vec::new());
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<Detection>, reqwest::Error> {
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<Detection>>()
        .await
}

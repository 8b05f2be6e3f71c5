//! Solar irradiance poller
//!
//! Fetches current radiation readings from the Open-Meteo forecast API at
//! the vehicle's GPS position. No API key required. Cycles are skipped
//! until a first GPS fix arrives (latitude 0 means no fix).

use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use super::PollerHandle;
use crate::store::{HudStore, SolarIrradiance};

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentRadiation>,
}

#[derive(Debug, Deserialize)]
struct CurrentRadiation {
    #[serde(default)]
    shortwave_radiation: f64,
    #[serde(default)]
    direct_radiation: f64,
    #[serde(default)]
    diffuse_radiation: f64,
}

pub fn start_solar_polling(
    client: reqwest::Client,
    endpoint: String,
    period: Duration,
    store: Arc<HudStore>,
) -> PollerHandle {
    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let map = store.map();
            if map.latitude == 0.0 {
                debug!("Skipping solar poll, no GPS fix yet");
                continue;
            }
            match fetch(&client, &endpoint, map.latitude, map.longitude).await {
                Ok(Some(solar)) => store.update_solar(solar),
                Ok(None) => {
                    debug!("Solar response had no current block");
                }
                Err(e) => {
                    warn!("Solar fetch failed: {}", e);
                }
            }
        }
    });
    PollerHandle::new(handle)
}

async fn fetch(
    client: &reqwest::Client,
    endpoint: &str,
    latitude: f64,
    longitude: f64,
) -> Result<Option<SolarIrradiance>, reqwest::Error> {
    let response = client
        .get(endpoint)
        .query(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            (
                "current",
                "shortwave_radiation,direct_radiation,diffuse_radiation".to_string(),
            ),
            ("timezone", "auto".to_string()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json::<ForecastResponse>()
        .await?;

    Ok(response.current.map(|current| SolarIrradiance {
        ghi: current.shortwave_radiation,
        dni: current.direct_radiation,
        dhi: current.diffuse_radiation,
    }))
}

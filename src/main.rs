//! helm-hud - Main entry point
//!
//! Vehicle telemetry HUD client: WebRTC peer session to the vehicle
//! computer plus HTTP pollers feeding a shared store.

mod args;
mod config;
mod controls;
mod pollers;
mod session;
mod store;

use args::Args;
use clap::Parser;
use config::Config;
use controls::DeviceControls;
use log::{error, info, warn};
use session::messages::ModelSelection;
use session::transport::RtcTransportFactory;
use session::{retry, PeerSession, SessionOptions};
use std::sync::Arc;
use std::time::Duration;
use store::HudStore;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration before logging init so the configured level can
    // seed the filter
    let config_result = args.load_config();

    // Initialize logging with noise filtering for third-party WebRTC crates.
    // Precedence: HELM_HUD_LOG env, then --verbose, then the config file.
    let log_level = log_filter(args.verbose, config_result.as_ref().ok());
    env_logger::Builder::new()
        .parse_filters(&std::env::var("HELM_HUD_LOG").unwrap_or(log_level))
        .filter_module("webrtc_ice", log::LevelFilter::Error)
        .filter_module("webrtc_dtls", log::LevelFilter::Error)
        .filter_module("webrtc_mdns", log::LevelFilter::Error)
        .init();

    info!("helm-hud v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match config_result {
        Ok(cfg) => {
            info!("Loaded configuration from {:?}", args.config);
            cfg
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    };

    // Apply command line overrides
    if let Some(ref url) = args.url {
        config.signaling.url = url.clone();
    }
    if let Some(ref device) = args.device {
        config.device.base_url = device.clone();
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    let store = Arc::new(HudStore::new());
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    // Peer session to the vehicle computer
    let factory = Arc::new(RtcTransportFactory::new(
        config.signaling.ice_servers.clone(),
    ));
    let session = Arc::new(PeerSession::new(
        config.signaling.url.clone(),
        factory,
        store.clone(),
        SessionOptions {
            negotiation_timeout: Duration::from_millis(config.signaling.negotiation_timeout_ms),
        },
    ));
    session.set_on_remote_track(|track| {
        info!("Remote {} track arrived: {}", track.kind, track.id);
    });

    let event_loop = {
        let session = session.clone();
        tokio::spawn(async move { session.run().await })
    };
    let supervisor = tokio::spawn(retry::supervise(session.clone(), config.reconnect));

    // HTTP pollers
    let _telemetry_poller = pollers::start_telemetry_polling(
        http.clone(),
        config.device.base_url.clone(),
        Duration::from_millis(config.device.telemetry_interval_ms),
        store.clone(),
    );
    let _detection_poller = pollers::start_detection_polling(
        http.clone(),
        config.device.base_url.clone(),
        Duration::from_millis(config.device.detection_interval_ms),
        store.clone(),
    );
    let _solar_poller = if config.solar.enabled {
        Some(pollers::start_solar_polling(
            http.clone(),
            config.solar.endpoint.clone(),
            Duration::from_secs(config.solar.interval_secs),
            store.clone(),
        ))
    } else {
        None
    };

    // Push the initial model selection to the vehicle
    let controls = DeviceControls::new(http, config.device.base_url.clone());
    if let Some(ref model) = args.model {
        let selection = match model.as_str() {
            "cone" => ModelSelection::Cone,
            "pothole" => ModelSelection::Pothole,
            "off" => ModelSelection::Off,
            other => {
                error!("Unknown model: {}", other);
                return Err(format!("Unknown model: {}", other).into());
            }
        };
        store.set_active_model(selection);
        store.set_inference_enabled(selection != ModelSelection::Off);
        if let Err(e) = controls.set_model(selection).await {
            warn!("Failed to set initial model: {}", e);
        }
    }

    info!("HUD running, press Ctrl+C to exit");
    signal::ctrl_c().await?;

    info!("Shutting down");
    session.close();
    supervisor.abort();
    event_loop.abort();

    Ok(())
}

fn log_filter(verbose: bool, config: Option<&Config>) -> String {
    if verbose {
        return "debug".to_string();
    }
    match config {
        Some(cfg) => cfg.logging.level.clone(),
        None => "info".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_prefers_verbose_flag() {
        let mut cfg = Config::default();
        cfg.logging.level = "trace".to_string();
        assert_eq!(log_filter(true, Some(&cfg)), "debug");
    }

    #[test]
    fn test_log_filter_uses_configured_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "warn".to_string();
        assert_eq!(log_filter(false, Some(&cfg)), "warn");
        assert_eq!(log_filter(false, None), "info");
    }
}

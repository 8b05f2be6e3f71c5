//! Vehicle control commands
//!
//! Thin client for the vehicle computer's HTTP control surface. Commands
//! are fire-and-forget from the HUD's perspective; failures are logged and
//! surfaced to the caller, never retried here.

use log::info;
use serde_json::json;

use crate::session::messages::ModelSelection;

/// Client for control endpoints on the vehicle computer.
#[derive(Clone)]
pub struct DeviceControls {
    client: reqwest::Client,
    base_url: String,
}

impl DeviceControls {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Switch the active inference model on the vehicle (or turn inference
    /// off).
    pub async fn set_model(&self, model: ModelSelection) -> Result<(), reqwest::Error> {
        info!("Setting inference model: {}", model.as_str());
        self.client
            .post(format!("{}/set_model", self.base_url))
            .json(&json!({ "model": model.as_str() }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

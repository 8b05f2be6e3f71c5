use clap::Parser;
use std::path::PathBuf;

use crate::config;

#[derive(Parser, Debug)]
#[command(name = "helm-hud")]
#[command(version = "0.2.0")]
#[command(about = "Vehicle telemetry HUD client", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/helm-hud.toml")]
    pub config: PathBuf,

    /// Signaling server URL (overrides config)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Vehicle computer base URL (overrides config)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Initial inference model (cone, pothole or off)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        config::Config::load(&self.config)
    }
}

//! helm-hud - vehicle telemetry HUD client
//!
//! Connects to a vehicle computer over WebRTC (answering its offers through
//! a WebSocket signaling channel), demultiplexes the telemetry/detection
//! side channel into a shared store, and polls the vehicle's HTTP API for
//! everything that does not ride the peer connection.

pub mod config;
pub mod controls;
pub mod pollers;
pub mod session;
pub mod store;

// Re-exports
pub use config::Config;
pub use controls::DeviceControls;
pub use session::{ConnectionStatus, HudSinks, PeerSession, ReconnectPolicy, SessionOptions};
pub use store::HudStore;

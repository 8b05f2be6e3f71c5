//! Peer session core
//!
//! Establishes the real-time media+data transport to the vehicle over a
//! WebSocket signaling channel:
//! - Signaling client (offer/answer/ICE exchange, the vehicle offers)
//! - Session state machine and transport ownership
//! - Side-channel demultiplexer for telemetry/detection frames

pub mod data_channel;
pub mod manager;
pub mod messages;
pub mod retry;
pub mod signaling;
pub mod transport;

pub use manager::{PeerSession, SessionOptions, SessionState};
pub use messages::{Detection, DetectionClass, SignalingMessage, TelemetryUpdate};
pub use retry::ReconnectPolicy;
pub use signaling::SignalingClient;
pub use transport::{PeerTransport, TransportFactory};

use std::error::Error;
use std::fmt;

/// Externally observable connection status, as published to the status sink.
///
/// A failed negotiation is not distinguishable from a slow one here; the
/// session only reports `Disconnected` once the failure is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

/// Sinks consumed by the session core. Injected at construction so the core
/// never reaches into a process-wide store.
pub trait HudSinks: Send + Sync {
    /// Connection status changed.
    fn set_connection_status(&self, status: ConnectionStatus);

    /// Telemetry snapshot arrived on the side channel (partial update).
    fn update_telemetry(&self, update: messages::TelemetryUpdate);

    /// Detection list arrived on the side channel (full replacement).
    fn update_detections(&self, detections: Vec<messages::Detection>);
}

/// Session-related errors
#[derive(Debug)]
pub enum SessionError {
    /// Transport construction failed
    TransportFailed(String),
    /// SDP processing failed
    SdpError(String),
    /// ICE candidate processing failed
    IceError(String),
    /// A negotiation step exceeded its deadline
    NegotiationTimeout(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::TransportFailed(msg) => write!(f, "Transport failed: {}", msg),
            SessionError::SdpError(msg) => write!(f, "SDP error: {}", msg),
            SessionError::IceError(msg) => write!(f, "ICE error: {}", msg),
            SessionError::NegotiationTimeout(step) => {
                write!(f, "Negotiation step timed out: {}", step)
            }
        }
    }
}

impl Error for SessionError {}

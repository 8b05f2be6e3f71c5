//! Reconnect policy
//!
//! Retry is a strategy wrapping `connect()`, not part of the session state
//! machine. The supervisor watches state transitions and re-dials after a
//! disconnect according to the configured policy.

use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::manager::{PeerSession, SessionState};

/// Reconnection strategy applied after the session reaches `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// Never reconnect automatically; the caller re-dials.
    None,
    /// Fixed delay between attempts.
    Fixed { delay_ms: u64 },
    /// Exponential backoff, doubling from `initial_ms` up to `max_ms`.
    Exponential { initial_ms: u64, max_ms: u64 },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Exponential {
            initial_ms: 1_000,
            max_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (0-based), or None to stop retrying.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::None => None,
            ReconnectPolicy::Fixed { delay_ms } => Some(Duration::from_millis(*delay_ms)),
            ReconnectPolicy::Exponential { initial_ms, max_ms } => {
                let exp = attempt.min(16);
                let delay = initial_ms.saturating_mul(1u64 << exp).min(*max_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

/// Dial the session and keep re-dialing per policy until the policy gives
/// up or the session task ends. A successful connection resets the attempt
/// counter.
pub async fn supervise(session: Arc<PeerSession>, policy: ReconnectPolicy) {
    let mut state_rx = session.subscribe_state();
    let mut attempt: u32 = 0;

    session.connect();

    while state_rx.changed().await.is_ok() {
        let state = *state_rx.borrow_and_update();
        match state {
            SessionState::Connected => {
                attempt = 0;
            }
            SessionState::Disconnected => {
                let Some(delay) = policy.delay(attempt) else {
                    info!("Reconnect policy exhausted, staying disconnected");
                    return;
                };
                attempt += 1;
                info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                sleep(delay).await;
                session.connect();
            }
            SessionState::Idle | SessionState::Connecting => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_retries() {
        assert_eq!(ReconnectPolicy::None.delay(0), None);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::Fixed { delay_ms: 250 };
        assert_eq!(policy.delay(0), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay(9), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_exponential_doubles_and_caps() {
        let policy = ReconnectPolicy::Exponential {
            initial_ms: 500,
            max_ms: 8_000,
        };
        assert_eq!(policy.delay(0), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay(1), Some(Duration::from_millis(1_000)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(2_000)));
        assert_eq!(policy.delay(10), Some(Duration::from_millis(8_000)));
        // Shift is clamped; no overflow on absurd attempt counts.
        assert_eq!(policy.delay(u32::MAX), Some(Duration::from_millis(8_000)));
    }

    #[test]
    fn test_policy_toml_roundtrip() {
        let policy: ReconnectPolicy =
            toml::from_str("strategy = \"fixed\"\ndelay_ms = 1000\n").unwrap();
        assert_eq!(policy, ReconnectPolicy::Fixed { delay_ms: 1000 });
    }
}

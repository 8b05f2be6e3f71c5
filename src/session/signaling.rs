//! Signaling client
//!
//! Maintains a message-framed WebSocket connection to the rendezvous server
//! and delivers three events to its owner: channel-open, parsed-message and
//! channel-close. It knows nothing about media or session semantics.

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::messages::SignalingMessage;

/// Events delivered to the signaling client's owner, in channel order.
#[derive(Debug)]
pub enum SignalingEvent {
    /// The underlying channel completed its handshake and is open.
    Opened,
    /// A well-formed signaling message arrived.
    Message(SignalingMessage),
    /// The underlying channel closed (including network errors and a
    /// failed dial). Fires once per `connect()` attempt.
    Closed,
}

/// WebSocket signaling client.
///
/// Each `connect()` opens a brand-new underlying channel; outbound sends are
/// silently dropped unless a channel is currently open. There is no send
/// queue and no automatic reconnection at this layer. Clones share the same
/// underlying channel and may be handed to callbacks as writer handles.
#[derive(Clone)]
pub struct SignalingClient {
    url: String,
    events: mpsc::UnboundedSender<SignalingEvent>,
    /// Writer handle for the currently open channel, None while closed.
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
}

impl SignalingClient {
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<SignalingEvent>) -> Self {
        Self {
            url: url.into(),
            events,
            outbound: Arc::new(Mutex::new(None)),
        }
    }

    /// The configured rendezvous URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the underlying channel is currently open.
    pub fn is_open(&self) -> bool {
        self.outbound.lock().is_some()
    }

    /// Open a new underlying channel. Returns immediately; the owner learns
    /// the outcome through `Opened`/`Closed` events.
    pub fn connect(&self) {
        let url = self.url.clone();
        let events = self.events.clone();
        let outbound = self.outbound.clone();

        tokio::spawn(async move {
            run_channel(url, events, outbound).await;
        });
    }

    /// Serialize and transmit a message if the channel is open. A send while
    /// the channel is not open is a silent no-op: the message is dropped,
    /// not queued, and no error is surfaced.
    pub fn send(&self, message: &SignalingMessage) {
        let guard = self.outbound.lock();
        let Some(tx) = guard.as_ref() else {
            debug!("Signaling send while channel closed, dropping message");
            return;
        };

        match message.to_json() {
            Ok(text) => {
                if tx.send(Message::Text(text.into())).is_err() {
                    debug!("Signaling writer gone, dropping message");
                }
            }
            Err(e) => {
                warn!("Failed to serialize signaling message: {}", e);
            }
        }
    }

    /// Request the underlying channel close. Idempotent when no channel is
    /// open.
    pub fn close(&self) {
        if let Some(tx) = self.outbound.lock().take() {
            let _ = tx.send(Message::Close(None));
        }
    }

    /// Route outbound frames into the given channel instead of a live
    /// socket, so tests can observe what `send` transmits.
    #[cfg(test)]
    pub(crate) fn install_writer(&self, tx: mpsc::UnboundedSender<Message>) {
        *self.outbound.lock() = Some(tx);
    }
}

/// One channel lifetime: dial, pump messages, report close.
async fn run_channel(
    url: String,
    events: mpsc::UnboundedSender<SignalingEvent>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
) {
    info!("Connecting to signaling server: {}", url);

    let ws_stream = match connect_async(&url).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("Signaling connect failed: {}", e);
            let _ = events.send(SignalingEvent::Closed);
            return;
        }
    };

    info!("Signaling channel open");

    let (mut write, mut read) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    *outbound.lock() = Some(outbound_tx.clone());
    let _ = events.send(SignalingEvent::Opened);

    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if write.send(msg).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match SignalingMessage::from_json(&text) {
                Ok(message) => {
                    let _ = events.send(SignalingEvent::Message(message));
                }
                Err(e) => {
                    // Malformed frames are dropped here; they never reach
                    // the owner and never close the channel.
                    warn!("Malformed signaling message: {}", e);
                }
            },
            Ok(Message::Binary(data)) => {
                debug!("Ignoring binary signaling frame ({} bytes)", data.len());
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
            Ok(Message::Close(_)) => break,
            Err(e) => {
                // Transport errors are logged only; the close event below is
                // what the owner reacts to.
                error!("Signaling channel error: {}", e);
                break;
            }
        }
    }

    writer_handle.abort();

    // A reader on a dead socket can outlive its own channel: close() takes
    // the sender and a reconnect may install a fresh one before this read
    // loop notices the error. Such a superseded generation must neither
    // clear the new writer nor report a close for a channel it no longer
    // owns.
    if !release_writer(&outbound, &outbound_tx) {
        debug!("Superseded signaling channel ended");
        return;
    }
    info!("Signaling channel closed");
    let _ = events.send(SignalingEvent::Closed);
}

/// Clear the writer slot if `mine` still owns it. Returns false when a newer
/// channel generation holds the slot; the caller must then stay silent.
fn release_writer(
    outbound: &Mutex<Option<mpsc::UnboundedSender<Message>>>,
    mine: &mpsc::UnboundedSender<Message>,
) -> bool {
    let mut guard = outbound.lock();
    if let Some(current) = guard.as_ref() {
        if !current.same_channel(mine) {
            return false;
        }
        *guard = None;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_while_closed_is_silent_noop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = SignalingClient::new("ws://test", tx);

        assert!(!client.is_open());
        client.send(&SignalingMessage::candidate(
            crate::session::messages::IceCandidate {
                candidate: "candidate:0".to_string(),
                sdp_mid: None,
                sdp_mline_index: None,
            },
        ));

        // No transmission and no event was produced.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_without_channel_is_idempotent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = SignalingClient::new("ws://test", tx);
        client.close();
        client.close();
        assert!(!client.is_open());
    }

    #[tokio::test]
    async fn test_superseded_channel_leaves_new_writer_in_place() {
        let outbound = Arc::new(Mutex::new(None));
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        *outbound.lock() = Some(new_tx);

        // An old generation's reader ending late must not clobber the slot
        // a reconnect already owns, and must not report a close.
        assert!(!release_writer(&outbound, &old_tx));
        assert!(outbound.lock().is_some());

        // The owning generation releases the slot and reports the close.
        let own = outbound.lock().clone().unwrap();
        assert!(release_writer(&outbound, &own));
        assert!(outbound.lock().is_none());

        // Slot already taken by close(): the close is still reported.
        assert!(release_writer(&outbound, &old_tx));
    }

    #[tokio::test]
    async fn test_failed_dial_reports_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = SignalingClient::new("ws://127.0.0.1:1", tx);
        client.connect();

        match rx.recv().await {
            Some(SignalingEvent::Closed) => {}
            other => panic!("Expected Closed, got {:?}", other),
        }
    }
}

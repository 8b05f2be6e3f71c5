//! Peer session management
//!
//! Drives the full negotiation lifecycle against the vehicle: the signaling
//! channel delivers open/message/close events, the session answers the
//! vehicle's offer, forwards local ICE candidates, and demultiplexes the
//! side channel into the injected sinks.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use super::data_channel::dispatch_frame;
use super::messages::{IceCandidate, SessionDescription, SignalingMessage};
use super::signaling::{SignalingClient, SignalingEvent};
use super::transport::{PeerTransport, RemoteTrack, TransportFactory};
use super::{ConnectionStatus, HudSinks, SessionError};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, never connected
    Idle,
    /// Signaling dial in progress
    Connecting,
    /// Signaling open, transport live
    Connected,
    /// Signaling closed; `connect()` re-enters Connecting
    Disconnected,
}

impl SessionState {
    fn status(&self) -> ConnectionStatus {
        match self {
            SessionState::Idle | SessionState::Disconnected => ConnectionStatus::Disconnected,
            SessionState::Connecting => ConnectionStatus::Connecting,
            SessionState::Connected => ConnectionStatus::Connected,
        }
    }
}

/// Tunables for the session manager.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Deadline applied to each individual negotiation step.
    pub negotiation_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            negotiation_timeout: Duration::from_secs(10),
        }
    }
}

type TrackCallback = Box<dyn Fn(RemoteTrack) + Send + Sync>;

/// Manages one peer session: owns the signaling client and the transport
/// handle, and exposes session state plus a stream-arrival callback.
pub struct PeerSession {
    signaling: SignalingClient,
    factory: Arc<dyn TransportFactory>,
    sinks: Arc<dyn HudSinks>,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    transport: Mutex<Option<Arc<dyn PeerTransport>>>,
    /// At most one registered callback; reassignment overwrites.
    on_remote_track: Arc<Mutex<Option<TrackCallback>>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<SignalingEvent>>>,
}

impl PeerSession {
    /// Create a session bound to a signaling endpoint. Nothing connects
    /// until `connect()` is called.
    pub fn new(
        signaling_url: impl Into<String>,
        factory: Arc<dyn TransportFactory>,
        sinks: Arc<dyn HudSinks>,
        options: SessionOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Idle);

        Self {
            signaling: SignalingClient::new(signaling_url, events_tx),
            factory,
            sinks,
            options,
            state,
            transport: Mutex::new(None),
            on_remote_track: Arc::new(Mutex::new(None)),
            events: Mutex::new(Some(events_rx)),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch session state transitions (used by the reconnect supervisor).
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Register the stream-arrival callback. At most one is held; each call
    /// replaces the previous one. Tracks arriving while no callback is set
    /// are dropped.
    pub fn set_on_remote_track(&self, callback: impl Fn(RemoteTrack) + Send + Sync + 'static) {
        *self.on_remote_track.lock() = Some(Box::new(callback));
    }

    /// Start (or restart) connecting. Delegates to the signaling client and
    /// returns before the channel opens.
    pub fn connect(&self) {
        self.set_state(SessionState::Connecting);
        self.signaling.connect();
    }

    /// Request the signaling channel close. The session transitions to
    /// `Disconnected` when the close event arrives.
    pub fn close(&self) {
        self.signaling.close();
    }

    /// Consume signaling events until the event channel ends. One event is
    /// processed to completion before the next is dequeued, so negotiation
    /// sequences never interleave.
    pub async fn run(&self) {
        let mut events = match self.events.lock().take() {
            Some(rx) => rx,
            None => {
                warn!("Session event loop already running");
                return;
            }
        };

        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
    }

    fn set_state(&self, state: SessionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!("Session state change: {:?} -> {:?}", *current, state);
            *current = state;
            true
        });
        if changed {
            self.sinks.set_connection_status(state.status());
        }
    }

    async fn handle_event(&self, event: SignalingEvent) {
        match event {
            SignalingEvent::Opened => self.handle_open().await,
            SignalingEvent::Message(message) => self.handle_message(message).await,
            SignalingEvent::Closed => self.handle_close().await,
        }
    }

    /// Signaling reported open: build a fresh transport, wire its callbacks
    /// and mark the session connected.
    async fn handle_open(&self) {
        let attempt = uuid::Uuid::new_v4();
        info!("Signaling open, starting negotiation attempt {}", attempt);

        let transport = match self.step("create transport", self.factory.create()).await {
            Ok(t) => t,
            Err(e) => {
                error!("Transport construction failed: {}", e);
                self.fail().await;
                return;
            }
        };

        // Local candidates go straight out over signaling. The signaling
        // client drops sends while the channel is closed, so the callback
        // needs no guard of its own.
        let signaling = self.signaling.clone();
        transport.on_ice_candidate(Box::new(move |candidate: IceCandidate| {
            signaling.send(&SignalingMessage::candidate(candidate));
        }));

        // Remote tracks go to the single registered callback, if any.
        let on_remote_track = self.on_remote_track.clone();
        transport.on_track(Box::new(move |track: RemoteTrack| {
            match on_remote_track.lock().as_ref() {
                Some(callback) => callback(track),
                None => debug!("Remote track {} dropped, no callback registered", track.id),
            }
        }));

        // Side-channel frames are demultiplexed into the sinks.
        let sinks = self.sinks.clone();
        transport.on_data_frame(Box::new(move |frame: &[u8]| {
            dispatch_frame(frame, sinks.as_ref());
        }));

        *self.transport.lock() = Some(transport);
        self.set_state(SessionState::Connected);
    }

    /// Signaling closed: tear the transport down and mark disconnected.
    async fn handle_close(&self) {
        self.teardown_transport().await;
        self.set_state(SessionState::Disconnected);
    }

    async fn handle_message(&self, message: SignalingMessage) {
        let transport = self.transport.lock().clone();
        let Some(transport) = transport else {
            debug!("Signaling message before transport is ready, dropping");
            return;
        };

        match message {
            SignalingMessage::Offer { description } => {
                if let Err(e) = self.answer_offer(&*transport, description).await {
                    error!("Offer negotiation failed: {}", e);
                    self.fail().await;
                }
            }
            SignalingMessage::Answer { description } => {
                if let Err(e) = self
                    .step("set remote answer", transport.set_remote_description(description))
                    .await
                {
                    error!("Applying remote answer failed: {}", e);
                    self.fail().await;
                }
            }
            SignalingMessage::Candidate { candidate } => {
                // A single bad candidate is recoverable; other paths may
                // still connect.
                if let Err(e) = self
                    .step("add ICE candidate", transport.add_ice_candidate(candidate))
                    .await
                {
                    warn!("ICE candidate rejected: {}", e);
                }
            }
            SignalingMessage::Unknown => {
                debug!("Ignoring unknown signaling message");
            }
        }
    }

    /// Apply the vehicle's offer and send our answer back. The whole
    /// sequence completes before the next signaling message is handled.
    async fn answer_offer(
        &self,
        transport: &dyn PeerTransport,
        offer: SessionDescription,
    ) -> Result<(), SessionError> {
        self.step("set remote offer", transport.set_remote_description(offer))
            .await?;
        let answer = self.step("create answer", transport.create_answer()).await?;
        self.step(
            "set local answer",
            transport.set_local_description(answer.clone()),
        )
        .await?;
        self.signaling.send(&SignalingMessage::answer(answer));
        Ok(())
    }

    /// Run one negotiation step under the configured deadline.
    async fn step<T>(
        &self,
        name: &'static str,
        fut: impl std::future::Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        match timeout(self.options.negotiation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::NegotiationTimeout(name.to_string())),
        }
    }

    /// Negotiation failure: release the transport, close signaling and
    /// force the session to `Disconnected` rather than leaving it in an
    /// undefined state.
    async fn fail(&self) {
        self.teardown_transport().await;
        self.signaling.close();
        self.set_state(SessionState::Disconnected);
    }

    async fn teardown_transport(&self) {
        let transport = self.transport.lock().take();
        if let Some(transport) = transport {
            if let Err(e) = transport.close().await {
                warn!("Transport close failed: {}", e);
            }
        }
    }
}

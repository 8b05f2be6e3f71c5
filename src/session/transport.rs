//! Peer transport capability seam
//!
//! A narrow interface over the platform's real-time transport: the session
//! manager only needs description handling, candidate handling and three
//! callbacks. The production implementation wraps the `webrtc` crate; tests
//! substitute a scripted mock.

use futures::future::BoxFuture;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use super::messages::{IceCandidate, SdpType, SessionDescription};
use super::SessionError;

/// Local ICE candidate discovered by the transport
pub type IceCandidateHandler = Box<dyn Fn(IceCandidate) + Send + Sync>;

/// Remote media track arrived
pub type TrackHandler = Box<dyn Fn(RemoteTrack) + Send + Sync>;

/// Inbound frame on a remote-offered data channel
pub type DataFrameHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Descriptor for a negotiated remote media track. Rendering is out of scope
/// for this core, so only identity is surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: String,
}

/// Capability interface over one real-time transport handle.
///
/// A handle is negotiated at most once; the session discards it on
/// disconnect and obtains a fresh one from the factory on reconnect.
pub trait PeerTransport: Send + Sync {
    fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> BoxFuture<'_, Result<(), SessionError>>;

    fn create_answer(&self) -> BoxFuture<'_, Result<SessionDescription, SessionError>>;

    fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> BoxFuture<'_, Result<(), SessionError>>;

    fn add_ice_candidate(&self, candidate: IceCandidate) -> BoxFuture<'_, Result<(), SessionError>>;

    /// Register the local-candidate-discovered callback.
    fn on_ice_candidate(&self, handler: IceCandidateHandler);

    /// Register the remote-track-arrived callback.
    fn on_track(&self, handler: TrackHandler);

    /// Register the side-channel frame callback. The transport accepts
    /// remote-offered data channels and forwards every inbound frame in
    /// arrival order.
    fn on_data_frame(&self, handler: DataFrameHandler);

    fn close(&self) -> BoxFuture<'_, Result<(), SessionError>>;
}

/// Creates one fresh transport handle per negotiation attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> BoxFuture<'_, Result<Arc<dyn PeerTransport>, SessionError>>;
}

/// Production transport backed by the `webrtc` crate.
pub struct RtcTransport {
    pc: Arc<RTCPeerConnection>,
    /// Candidates that arrived before the remote description. webrtc-rs
    /// rejects early candidates, so this impl holds them and flushes after
    /// the remote description is applied. The session core never buffers.
    pending_candidates: Mutex<Vec<IceCandidate>>,
    remote_description_set: AtomicBool,
}

impl RtcTransport {
    pub fn new(pc: Arc<RTCPeerConnection>) -> Self {
        Self {
            pc,
            pending_candidates: Mutex::new(Vec::new()),
            remote_description_set: AtomicBool::new(false),
        }
    }

    fn to_rtc_description(
        description: &SessionDescription,
    ) -> Result<RTCSessionDescription, SessionError> {
        let result = match description.kind {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp.clone()),
            SdpType::Answer => RTCSessionDescription::answer(description.sdp.clone()),
        };
        result.map_err(|e| SessionError::SdpError(format!("Invalid session description: {}", e)))
    }

    fn to_candidate_init(candidate: IceCandidate) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        }
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        self.pc
            .add_ice_candidate(Self::to_candidate_init(candidate))
            .await
            .map_err(|e| SessionError::IceError(format!("Failed to add ICE candidate: {}", e)))
    }
}

impl PeerTransport for RtcTransport {
    fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let desc = Self::to_rtc_description(&description)?;
            self.pc.set_remote_description(desc).await.map_err(|e| {
                SessionError::SdpError(format!("Failed to set remote description: {}", e))
            })?;
            self.remote_description_set.store(true, Ordering::SeqCst);

            let pending = std::mem::take(&mut *self.pending_candidates.lock());
            for candidate in pending {
                if let Err(e) = self.apply_candidate(candidate).await {
                    warn!("Held ICE candidate rejected: {}", e);
                }
            }
            Ok(())
        })
    }

    fn create_answer(&self) -> BoxFuture<'_, Result<SessionDescription, SessionError>> {
        Box::pin(async move {
            let answer = self
                .pc
                .create_answer(None)
                .await
                .map_err(|e| SessionError::SdpError(format!("Failed to create answer: {}", e)))?;
            Ok(SessionDescription::answer(answer.sdp))
        })
    }

    fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            let desc = Self::to_rtc_description(&description)?;
            self.pc.set_local_description(desc).await.map_err(|e| {
                SessionError::SdpError(format!("Failed to set local description: {}", e))
            })
        })
    }

    fn add_ice_candidate(&self, candidate: IceCandidate) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            if !self.remote_description_set.load(Ordering::SeqCst) {
                debug!("Holding ICE candidate until remote description is set");
                self.pending_candidates.lock().push(candidate);
                return Ok(());
            }
            self.apply_candidate(candidate).await
        })
    }

    fn on_ice_candidate(&self, handler: IceCandidateHandler) {
        let handler: Arc<IceCandidateHandler> = Arc::new(handler);
        self.pc.on_ice_candidate(Box::new(move |candidate| {
            let handler = handler.clone();
            Box::pin(async move {
                // None marks end of gathering; only real candidates go out.
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => handler(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                    }),
                    Err(e) => warn!("Failed to serialize local ICE candidate: {}", e),
                }
            })
        }));
    }

    fn on_track(&self, handler: TrackHandler) {
        let handler: Arc<TrackHandler> = Arc::new(handler);
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let handler = handler.clone();
            Box::pin(async move {
                handler(RemoteTrack {
                    id: track.id(),
                    kind: track.kind().to_string(),
                });
            })
        }));
    }

    fn on_data_frame(&self, handler: DataFrameHandler) {
        let handler: Arc<DataFrameHandler> = Arc::new(handler);
        self.pc.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let handler = handler.clone();
            Box::pin(async move {
                debug!("Remote data channel offered: {}", channel.label());
                let handler = handler.clone();
                channel.on_message(Box::new(move |msg| {
                    let handler = handler.clone();
                    Box::pin(async move {
                        handler(&msg.data);
                    })
                }));
            })
        }));
    }

    fn close(&self) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            self.pc
                .close()
                .await
                .map_err(|e| SessionError::TransportFailed(format!("Close failed: {}", e)))
        })
    }
}

/// Factory producing `webrtc`-crate transports with the configured ICE
/// servers.
pub struct RtcTransportFactory {
    ice_servers: Vec<String>,
}

impl RtcTransportFactory {
    pub fn new(ice_servers: Vec<String>) -> Self {
        Self { ice_servers }
    }
}

impl TransportFactory for RtcTransportFactory {
    fn create(&self) -> BoxFuture<'_, Result<Arc<dyn PeerTransport>, SessionError>> {
        Box::pin(async move {
            let mut media_engine = MediaEngine::default();
            media_engine.register_default_codecs().map_err(|e| {
                SessionError::TransportFailed(format!("Failed to register codecs: {}", e))
            })?;

            let mut registry = Registry::new();
            registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
                SessionError::TransportFailed(format!("Failed to register interceptors: {}", e))
            })?;

            let api = APIBuilder::new()
                .with_media_engine(media_engine)
                .with_interceptor_registry(registry)
                .build();

            let rtc_config = RTCConfiguration {
                ice_servers: vec![RTCIceServer {
                    urls: self.ice_servers.clone(),
                    ..Default::default()
                }],
                ..Default::default()
            };

            let pc = api.new_peer_connection(rtc_config).await.map_err(|e| {
                SessionError::TransportFailed(format!("Failed to create peer connection: {}", e))
            })?;

            Ok(Arc::new(RtcTransport::new(Arc::new(pc))) as Arc<dyn PeerTransport>)
        })
    }
}

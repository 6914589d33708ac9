//! WebRTC peer connection management
//!
//! Wraps one browser-facing `RTCPeerConnection`: SDP/ICE exchange, the shared
//! video/audio tracks, the unreliable `input` data channel, and a per-peer
//! send queue drained by a dedicated sender task.
//!
//! Library callbacks capture a `Weak` handle plus a copy of the peer id and
//! early-return when the peer is already gone, so teardown is safe from any
//! task. Peer lifecycle events (local SDP, local ICE, state changes) are
//! forwarded to the signaling controller over an event channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use rtp::header::Header as RtpHeader;
use rtp::packet::Packet as RtpPacket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice::udp_network::{EphemeralUDP, UDPNetwork};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};

use super::queue::{SendQueue, SEND_QUEUE_CAPACITY};
use crate::config::IceSettings;
use crate::error::{Error, Result};
use crate::input::router::InputRouter;
use crate::media::{MediaKind, MediaPacket};
use crate::rtp::{
    RtpSequencer, VideoCodec, AUDIO_CLOCK_RATE, AUDIO_PAYLOAD_TYPE, VIDEO_CLOCK_RATE,
    VIDEO_PAYLOAD_TYPE,
};

/// Label of the unreliable/unordered browser input channel.
pub const INPUT_CHANNEL_LABEL: &str = "input";

/// How long the sender task sleeps on an empty queue before re-checking the
/// running flag.
const SENDER_WAIT: Duration = Duration::from_millis(50);

/// Connection state of a peer. Only CONNECTED peers receive media;
/// DISCONNECTED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl PeerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerState::Disconnected | PeerState::Failed)
    }

    /// Ordering rank used to keep transitions monotonic.
    fn rank(&self) -> u8 {
        match self {
            PeerState::Connecting => 0,
            PeerState::Connected => 1,
            PeerState::Disconnected | PeerState::Failed => 2,
        }
    }
}

impl std::fmt::Display for PeerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerState::Connecting => write!(f, "connecting"),
            PeerState::Connected => write!(f, "connected"),
            PeerState::Disconnected => write!(f, "disconnected"),
            PeerState::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle event forwarded to the signaling controller.
#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub peer_id: String,
    pub kind: PeerEventKind,
}

#[derive(Debug, Clone)]
pub enum PeerEventKind {
    /// A local description is ready to be sent to the browser.
    LocalDescription { sdp: String, sdp_type: String },
    /// A local ICE candidate was gathered.
    LocalCandidate { candidate: String, mid: String },
    /// The connection state changed.
    StateChange(PeerState),
}

/// SSRCs published by the media senders; peer tracks must advertise the same
/// values so broadcast RTP is recognized.
#[derive(Debug, Clone, Copy)]
pub struct MediaSsrcs {
    pub video: u32,
    pub audio: u32,
}

/// Per-peer send statistics.
#[derive(Debug, Default)]
pub struct PeerStats {
    packets_sent_video: AtomicU64,
    packets_sent_audio: AtomicU64,
    bytes_sent_video: AtomicU64,
    bytes_sent_audio: AtomicU64,
    send_errors: AtomicU64,
}

/// Point-in-time copy of [`PeerStats`].
#[derive(Debug, Clone, Default)]
pub struct PeerStatsSnapshot {
    pub packets_sent_video: u64,
    pub packets_sent_audio: u64,
    pub bytes_sent_video: u64,
    pub bytes_sent_audio: u64,
    pub send_errors: u64,
    pub packets_dropped: u64,
}

/// One WebRTC peer connection to a browser client.
pub struct Peer {
    id: String,
    stream_id: String,
    pc: Arc<RTCPeerConnection>,
    state_tx: watch::Sender<PeerState>,
    state_rx: watch::Receiver<PeerState>,
    video_track: RwLock<Option<Arc<TrackLocalStaticRTP>>>,
    audio_track: RwLock<Option<Arc<TrackLocalStaticRTP>>>,
    channels: RwLock<HashMap<String, Arc<RTCDataChannel>>>,
    queue: Arc<SendQueue>,
    sender_running: Arc<AtomicBool>,
    sender_task: Mutex<Option<JoinHandle<()>>>,
    lifecycle_task: Mutex<Option<JoinHandle<()>>>,
    video_seq: RtpSequencer,
    audio_seq: RtpSequencer,
    ssrcs: MediaSsrcs,
    events: mpsc::UnboundedSender<PeerEvent>,
    input: Arc<InputRouter>,
    stats: PeerStats,
    closed: AtomicBool,
}

impl Peer {
    /// Create a peer connection and wire its library callbacks. The caller
    /// must insert the returned handle into the registry before driving
    /// negotiation so callbacks can always resolve the peer.
    pub async fn new(
        id: String,
        ice: &IceSettings,
        codec: VideoCodec,
        ssrcs: MediaSsrcs,
        events: mpsc::UnboundedSender<PeerEvent>,
        input: Arc<InputRouter>,
    ) -> Result<Arc<Self>> {
        let mut media_engine = MediaEngine::default();
        register_codecs(&mut media_engine, codec)?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| Error::WebRtc(format!("interceptor setup failed: {e}")))?;

        let mut setting_engine = SettingEngine::default();
        if let Some((min, max)) = ice.port_range {
            match EphemeralUDP::new(min, max) {
                Ok(udp) => setting_engine.set_udp_network(UDPNetwork::Ephemeral(udp)),
                Err(e) => warn!(error = %e, "invalid ICE port range, using defaults"),
            }
        }

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers(ice),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);
        let (state_tx, state_rx) = watch::channel(PeerState::Connecting);

        let peer = Arc::new(Self {
            stream_id: format!("coplay-{}", uuid::Uuid::new_v4()),
            id,
            pc,
            state_tx,
            state_rx,
            video_track: RwLock::new(None),
            audio_track: RwLock::new(None),
            channels: RwLock::new(HashMap::new()),
            queue: Arc::new(SendQueue::new(SEND_QUEUE_CAPACITY)),
            sender_running: Arc::new(AtomicBool::new(false)),
            sender_task: Mutex::new(None),
            lifecycle_task: Mutex::new(None),
            video_seq: RtpSequencer::new(),
            audio_seq: RtpSequencer::new(),
            ssrcs,
            events,
            input,
            stats: PeerStats::default(),
            closed: AtomicBool::new(false),
        });

        peer.register_callbacks();
        peer.spawn_lifecycle();

        Ok(peer)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> PeerState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_watch(&self) -> watch::Receiver<PeerState> {
        self.state_rx.clone()
    }

    pub fn stats(&self) -> PeerStatsSnapshot {
        PeerStatsSnapshot {
            packets_sent_video: self.stats.packets_sent_video.load(Ordering::Relaxed),
            packets_sent_audio: self.stats.packets_sent_audio.load(Ordering::Relaxed),
            bytes_sent_video: self.stats.bytes_sent_video.load(Ordering::Relaxed),
            bytes_sent_audio: self.stats.bytes_sent_audio.load(Ordering::Relaxed),
            send_errors: self.stats.send_errors.load(Ordering::Relaxed),
            packets_dropped: self.queue.dropped(),
        }
    }

    /// Apply a state transition, enforcing monotonic order. Returns true
    /// when the state actually changed.
    fn apply_state(&self, next: PeerState) -> bool {
        let mut changed = false;
        self.state_tx.send_if_modified(|current| {
            if next.rank() <= current.rank() {
                return false;
            }
            *current = next;
            changed = true;
            true
        });
        if changed {
            info!(peer = %self.id, state = %next, "peer connection state");
        }
        changed
    }

    fn register_callbacks(self: &Arc<Self>) {
        // Connection state changes drive the sender lifecycle and are
        // forwarded upward once per transition.
        let weak = Arc::downgrade(self);
        let events = self.events.clone();
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let weak = weak.clone();
                let events = events.clone();
                Box::pin(async move {
                    let Some(peer) = weak.upgrade() else { return };
                    let next = match s {
                        RTCPeerConnectionState::New | RTCPeerConnectionState::Connecting => {
                            PeerState::Connecting
                        }
                        RTCPeerConnectionState::Connected => PeerState::Connected,
                        RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Closed => {
                            PeerState::Disconnected
                        }
                        RTCPeerConnectionState::Failed => PeerState::Failed,
                        _ => return,
                    };
                    if peer.apply_state(next) {
                        let _ = events.send(PeerEvent {
                            peer_id: peer.id.clone(),
                            kind: PeerEventKind::StateChange(next),
                        });
                    }
                })
            }));

        // Locally gathered ICE candidates trickle to the browser.
        let weak = Arc::downgrade(self);
        let events = self.events.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let weak = weak.clone();
                let events = events.clone();
                Box::pin(async move {
                    let Some(peer) = weak.upgrade() else { return };
                    let Some(candidate) = candidate else { return };
                    match candidate.to_json() {
                        Ok(init) => {
                            trace!(peer = %peer.id, candidate = %init.candidate, "local ICE candidate");
                            let _ = events.send(PeerEvent {
                                peer_id: peer.id.clone(),
                                kind: PeerEventKind::LocalCandidate {
                                    candidate: init.candidate,
                                    mid: init.sdp_mid.unwrap_or_default(),
                                },
                            });
                        }
                        Err(e) => debug!(peer = %peer.id, error = %e, "unusable local candidate"),
                    }
                })
            }));

        // Channels announced by the browser land in the same map as ours.
        let weak = Arc::downgrade(self);
        self.pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(peer) = weak.upgrade() else { return };
                debug!(peer = %peer.id, label = %dc.label(), "remote data channel");
                peer.install_channel(dc);
            })
        }));
    }

    /// Store a data channel and, for the input channel, attach the router.
    fn install_channel(self: &Arc<Self>, dc: Arc<RTCDataChannel>) {
        let label = dc.label().to_string();

        if label == INPUT_CHANNEL_LABEL {
            let router = self.input.clone();
            let peer_id = self.id.clone();
            dc.on_message(Box::new(move |msg: DataChannelMessage| {
                let router = router.clone();
                let peer_id = peer_id.clone();
                Box::pin(async move {
                    // Signaling is JSON over the WebSocket; input frames are
                    // binary only.
                    if msg.is_string {
                        return;
                    }
                    tokio::spawn(async move {
                        router.route(&peer_id, &msg.data).await;
                    });
                })
            }));
        }

        self.channels.write().insert(label, dc);
    }

    /// Create a data channel. The `input` label is unreliable and unordered;
    /// anything else gets the library defaults (reliable, ordered).
    pub async fn create_data_channel(self: &Arc<Self>, label: &str) -> Result<()> {
        let init = if label == INPUT_CHANNEL_LABEL {
            Some(RTCDataChannelInit {
                ordered: Some(false),
                max_retransmits: Some(0),
                ..Default::default()
            })
        } else {
            None
        };

        let dc = self.pc.create_data_channel(label, init).await?;
        self.install_channel(dc);
        debug!(peer = %self.id, label = %label, "data channel created");
        Ok(())
    }

    /// Add the send-only video track. The SSRC advertised to the sender path
    /// is the one published by the video sender.
    pub async fn add_video_track(&self, codec: VideoCodec) -> Result<()> {
        if self.video_track.read().is_some() {
            return Ok(());
        }

        let capability = RTCRtpCodecCapability {
            mime_type: codec.mime_type().to_string(),
            clock_rate: VIDEO_CLOCK_RATE,
            channels: 0,
            sdp_fmtp_line: codec.sdp_fmtp().to_string(),
            rtcp_feedback: vec![],
        };
        let track = Arc::new(TrackLocalStaticRTP::new(
            capability,
            format!("video-{}", self.id),
            self.stream_id.clone(),
        ));

        self.pc
            .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        *self.video_track.write() = Some(track);
        debug!(peer = %self.id, codec = %codec, "video track added");
        Ok(())
    }

    /// Add the send-only Opus audio track.
    pub async fn add_audio_track(&self) -> Result<()> {
        if self.audio_track.read().is_some() {
            return Ok(());
        }

        let capability = RTCRtpCodecCapability {
            mime_type: "audio/opus".to_string(),
            clock_rate: AUDIO_CLOCK_RATE,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
            rtcp_feedback: vec![],
        };
        let track = Arc::new(TrackLocalStaticRTP::new(
            capability,
            format!("audio-{}", self.id),
            self.stream_id.clone(),
        ));

        self.pc
            .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        *self.audio_track.write() = Some(track);
        debug!(peer = %self.id, "audio track added");
        Ok(())
    }

    /// Apply a remote description.
    pub async fn set_remote_description(&self, sdp: &str, sdp_type: &str) -> Result<()> {
        let desc = match sdp_type {
            "offer" => RTCSessionDescription::offer(sdp.to_string()),
            "answer" => RTCSessionDescription::answer(sdp.to_string()),
            other => return Err(Error::BadSdp(format!("unsupported SDP type: {other}"))),
        }
        .map_err(|e| Error::BadSdp(e.to_string()))?;

        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| Error::BadSdp(e.to_string()))
    }

    /// Create a local offer or answer, set it, and emit it toward the
    /// browser via the event channel.
    pub async fn create_description(&self, kind: &str) -> Result<()> {
        let desc = match kind {
            "offer" => self.pc.create_offer(None).await,
            "answer" => self.pc.create_answer(None).await,
            other => return Err(Error::BadSdp(format!("unsupported SDP type: {other}"))),
        }
        .map_err(|e| Error::BadSdp(e.to_string()))?;

        self.pc
            .set_local_description(desc.clone())
            .await
            .map_err(|e| Error::BadSdp(e.to_string()))?;

        let _ = self.events.send(PeerEvent {
            peer_id: self.id.clone(),
            kind: PeerEventKind::LocalDescription {
                sdp: desc.sdp,
                sdp_type: kind.to_string(),
            },
        });
        Ok(())
    }

    /// Add a remote ICE candidate. Malformed candidates are logged and
    /// reported as `false`, never fatal.
    pub async fn add_ice_candidate(&self, candidate: &str, mid: &str) -> bool {
        let init = RTCIceCandidateInit {
            candidate: candidate.to_string(),
            sdp_mid: if mid.is_empty() {
                None
            } else {
                Some(mid.to_string())
            },
            ..Default::default()
        };

        match self.pc.add_ice_candidate(init).await {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %self.id, error = %e, "rejected remote ICE candidate");
                false
            }
        }
    }

    /// Enqueue a video packet. Dropped unless the peer is connected and its
    /// sender is running.
    pub fn send_video(&self, packet: MediaPacket) -> bool {
        debug_assert_eq!(packet.kind, MediaKind::Video);
        self.enqueue(packet)
    }

    /// Enqueue an audio packet.
    pub fn send_audio(&self, packet: MediaPacket) -> bool {
        debug_assert_eq!(packet.kind, MediaKind::Audio);
        self.enqueue(packet)
    }

    fn enqueue(&self, packet: MediaPacket) -> bool {
        if self.state() != PeerState::Connected || !self.sender_running.load(Ordering::Acquire) {
            return false;
        }
        self.queue.push(packet);
        true
    }

    /// Write binary data on a data channel. Returns false when the channel
    /// is absent or closed.
    pub async fn send_binary(&self, label: &str, data: &[u8]) -> bool {
        let dc = self.channels.read().get(label).cloned();
        let Some(dc) = dc else { return false };
        dc.send(&Bytes::copy_from_slice(data)).await.is_ok()
    }

    /// Write text on a data channel.
    pub async fn send_text(&self, label: &str, text: &str) -> bool {
        let dc = self.channels.read().get(label).cloned();
        let Some(dc) = dc else { return false };
        dc.send_text(text.to_string()).await.is_ok()
    }

    /// Close the connection. Idempotent; the first phase flips the state so
    /// no further media is queued, the second stops the sender and tears the
    /// connection down.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.apply_state(PeerState::Disconnected);
        self.stop_sender().await;

        if let Err(e) = self.pc.close().await {
            debug!(peer = %self.id, error = %e, "peer connection close");
        }

        self.channels.write().clear();
        *self.video_track.write() = None;
        *self.audio_track.write() = None;

        if let Some(task) = self.lifecycle_task.lock().take() {
            task.abort();
        }

        info!(peer = %self.id, "peer closed");
    }

    /// Watch the connection state and start/stop the sender task. The sender
    /// exists exactly while the running flag is set.
    fn spawn_lifecycle(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut state_rx = self.state_rx.clone();

        let task = tokio::spawn(async move {
            loop {
                let state = *state_rx.borrow();
                {
                    let Some(peer) = weak.upgrade() else { return };
                    match state {
                        PeerState::Connecting => {}
                        PeerState::Connected => peer.start_sender(),
                        PeerState::Disconnected | PeerState::Failed => {
                            peer.stop_sender().await;
                            return;
                        }
                    }
                }
                if state_rx.changed().await.is_err() {
                    return;
                }
            }
        });

        *self.lifecycle_task.lock() = Some(task);
    }

    fn start_sender(self: &Arc<Self>) {
        if self.sender_running.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak = Arc::downgrade(self);
        *self.sender_task.lock() = Some(tokio::spawn(sender_loop(weak)));
        debug!(peer = %self.id, "media sender started");
    }

    async fn stop_sender(&self) {
        self.sender_running.store(false, Ordering::Release);
        self.queue.wake();

        let task = self.sender_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
            debug!(peer = %self.id, "media sender stopped");
        }
        self.queue.clear();
    }

    /// Stamp the RTP header and write one packet to the matching track.
    async fn write_packet(&self, packet: MediaPacket) {
        let (track, sequence_number, ssrc, payload_type) = match packet.kind {
            MediaKind::Video => (
                self.video_track.read().clone(),
                self.video_seq.next(),
                self.ssrcs.video,
                VIDEO_PAYLOAD_TYPE,
            ),
            MediaKind::Audio => (
                self.audio_track.read().clone(),
                self.audio_seq.next(),
                self.ssrcs.audio,
                AUDIO_PAYLOAD_TYPE,
            ),
        };
        let Some(track) = track else { return };

        let payload_len = packet.payload.len() as u64;
        let rtp_packet = RtpPacket {
            header: RtpHeader {
                version: 2,
                marker: packet.marker,
                payload_type,
                sequence_number,
                timestamp: packet.timestamp,
                ssrc,
                ..Default::default()
            },
            payload: packet.payload,
        };

        match track.write_rtp(&rtp_packet).await {
            Ok(_) => match packet.kind {
                MediaKind::Video => {
                    self.stats.packets_sent_video.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .bytes_sent_video
                        .fetch_add(payload_len, Ordering::Relaxed);
                }
                MediaKind::Audio => {
                    self.stats.packets_sent_audio.fetch_add(1, Ordering::Relaxed);
                    self.stats
                        .bytes_sent_audio
                        .fetch_add(payload_len, Ordering::Relaxed);
                }
            },
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                trace!(peer = %self.id, error = %e, "track write failed");
            }
        }
    }
}

/// Sender task body: drain the queue one packet at a time, exit once the
/// running flag clears and the queue is empty (or a timed wake observed the
/// flag). Holds only a weak handle so peer teardown is never blocked.
async fn sender_loop(weak: Weak<Peer>) {
    loop {
        let Some(peer) = weak.upgrade() else { return };

        match peer.queue.pop_timeout(SENDER_WAIT).await {
            Some(packet) => peer.write_packet(packet).await,
            None => {
                if !peer.sender_running.load(Ordering::Acquire) {
                    return;
                }
            }
        }

        if !peer.sender_running.load(Ordering::Acquire) && peer.queue.is_empty() {
            return;
        }
    }
}

/// Register the active video codec at payload type 96 and Opus at 111.
fn register_codecs(media_engine: &mut MediaEngine, codec: VideoCodec) -> Result<()> {
    media_engine.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: codec.mime_type().to_string(),
                clock_rate: VIDEO_CLOCK_RATE,
                channels: 0,
                sdp_fmtp_line: codec.sdp_fmtp().to_string(),
                rtcp_feedback: vec![],
            },
            payload_type: VIDEO_PAYLOAD_TYPE,
            ..Default::default()
        },
        RTPCodecType::Video,
    )?;

    media_engine.register_codec(
        RTCRtpCodecParameters {
            capability: RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: AUDIO_CLOCK_RATE,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                rtcp_feedback: vec![],
            },
            payload_type: AUDIO_PAYLOAD_TYPE,
            ..Default::default()
        },
        RTPCodecType::Audio,
    )?;

    Ok(())
}

/// Build the ICE server list from the derived settings.
fn ice_servers(ice: &IceSettings) -> Vec<RTCIceServer> {
    let mut servers = Vec::new();

    for stun in &ice.stun_servers {
        servers.push(RTCIceServer {
            urls: vec![stun.clone()],
            ..Default::default()
        });
    }

    if let Some(turn) = &ice.turn_server {
        servers.push(RTCIceServer {
            urls: vec![turn.url()],
            username: turn.username.clone(),
            credential: turn.credential.clone(),
            ..Default::default()
        });
    }

    servers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_rank_monotonic() {
        assert!(PeerState::Connecting.rank() < PeerState::Connected.rank());
        assert!(PeerState::Connected.rank() < PeerState::Disconnected.rank());
        assert!(PeerState::Connected.rank() < PeerState::Failed.rank());
        assert!(PeerState::Disconnected.is_terminal());
        assert!(PeerState::Failed.is_terminal());
        assert!(!PeerState::Connected.is_terminal());
    }
}

//! Runtime wiring
//!
//! A [`Runtime`] assembles every sub-system with explicit dependency
//! injection and hands shared handles around; there is no global state. The
//! host server provides the two external facades (encoder control, virtual
//! input) and the encoded media queues, then calls [`Runtime::start`] and
//! [`Runtime::serve`].

use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::WebRtcSettings;
use crate::error::Result;
use crate::input::{InputRouter, InputStatsSnapshot, SystemInput};
use crate::media::{
    AudioSender, AudioSenderStats, EncodedVideoFrame, EncoderControl, OpusPacket, VideoSender,
    VideoSenderStats,
};
use crate::room::RoomRegistry;
use crate::signaling::{SignalingController, SignalingHandler, SignalingServer};
use crate::webrtc::{PeerEvent, PeerRegistry};

/// Aggregate snapshot across all sub-systems.
#[derive(Debug, Clone, Default)]
pub struct RuntimeStats {
    pub peers: usize,
    pub connected_peers: usize,
    pub rooms: usize,
    pub signaling_connections: usize,
    pub video: VideoSenderStats,
    pub audio: AudioSenderStats,
    pub input: InputStatsSnapshot,
}

/// Receiving ends of the external encoder's output queues. The channels are
/// bounded on the producer side; the encoder drops frames on overflow rather
/// than blocking its capture loop.
pub struct MediaQueues {
    pub video: mpsc::Receiver<EncodedVideoFrame>,
    pub audio: mpsc::Receiver<OpusPacket>,
}

/// The assembled streaming stack.
pub struct Runtime {
    settings: WebRtcSettings,
    pub peers: Arc<PeerRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub video: Arc<VideoSender>,
    pub audio: Arc<AudioSender>,
    pub input: Arc<InputRouter>,
    pub server: Arc<SignalingServer>,
    pub controller: Arc<SignalingController>,
    shutdown_tx: broadcast::Sender<()>,
    peer_events: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
    sender_tasks: Mutex<Vec<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl Runtime {
    /// Wire the stack. Nothing runs until [`start`](Self::start).
    pub fn new(
        settings: WebRtcSettings,
        encoder: Arc<dyn EncoderControl>,
        system_input: Arc<dyn SystemInput>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (peer_events_tx, peer_events_rx) = mpsc::unbounded_channel();

        let rooms = RoomRegistry::new();
        let input = InputRouter::new(rooms.clone(), system_input);
        let peers = PeerRegistry::new(settings.ice(), peer_events_tx, input.clone());
        let video = VideoSender::new(peers.clone(), settings.video_codec);
        let audio = AudioSender::new(peers.clone());
        let server = SignalingServer::new();

        let controller = SignalingController::new(
            server.clone(),
            peers.clone(),
            rooms.clone(),
            video.clone(),
            audio.clone(),
            encoder,
            input.clone(),
            settings.max_players(),
        );
        let handler: Weak<dyn SignalingHandler> =
            Arc::downgrade(&(controller.clone() as Arc<dyn SignalingHandler>));
        server.set_handler(handler);

        info!(
            max_players = settings.max_players(),
            codec = %settings.video_codec,
            "runtime wired"
        );

        Arc::new(Self {
            settings,
            peers,
            rooms,
            video,
            audio,
            input,
            server,
            controller,
            shutdown_tx,
            peer_events: Mutex::new(Some(peer_events_rx)),
            sender_tasks: Mutex::new(Vec::new()),
            event_task: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &WebRtcSettings {
        &self.settings
    }

    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Collect a stats snapshot across all sub-systems.
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            peers: self.peers.len(),
            connected_peers: self.peers.connected_count(),
            rooms: self.rooms.room_count(),
            signaling_connections: self.server.connection_count(),
            video: self.video.stats(),
            audio: self.audio.stats(),
            input: self.input.stats(),
        }
    }

    /// Start the media fan-out tasks and the peer event loop.
    pub fn start(&self, queues: MediaQueues) {
        if let Some(events) = self.peer_events.lock().take() {
            *self.event_task.lock() = Some(self.controller.spawn_event_loop(events));
        }

        let mut tasks = self.sender_tasks.lock();
        tasks.push(self.video.spawn(queues.video, self.shutdown_tx.subscribe()));
        tasks.push(self.audio.spawn(queues.audio, self.shutdown_tx.subscribe()));
    }

    /// Serve the signaling WebSocket until the process exits. TLS is used
    /// when configured; a missing certificate falls back to plain WebSocket
    /// with a warning. TLS serving relies on the process-wide rustls crypto
    /// provider installed by the host binary at startup.
    pub async fn serve(&self) -> Result<()> {
        if !self.settings.enabled {
            info!("webrtc streaming disabled in configuration");
            return Ok(());
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.settings.signaling_port()));

        let tls = if self.settings.signaling_ssl {
            if !self.settings.cert_path.is_empty() && !self.settings.key_path.is_empty() {
                Some((
                    self.settings.cert_path.clone(),
                    self.settings.key_path.clone(),
                ))
            } else {
                warn!("signaling_ssl set but no certificate configured, serving plain WebSocket");
                None
            }
        } else {
            None
        };

        self.server.serve(addr, tls).await
    }

    /// Orderly teardown: stop the media senders, join them, then close every
    /// peer so no sender task outlives its tracks, and finally drop the
    /// event loop.
    pub async fn shutdown(&self) {
        info!("runtime shutting down");
        let _ = self.shutdown_tx.send(());

        let tasks: Vec<JoinHandle<()>> = self.sender_tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        self.peers.close_all().await;

        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
    }
}

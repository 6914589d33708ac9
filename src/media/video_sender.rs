//! Video sender
//!
//! One task consumes the encoded-video queue, packetizes each frame for the
//! active codec, and fans the payloads out through the peer registry. Frames
//! are dequeued even when nobody is connected so the queue never backs up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::frame::{EncodedVideoFrame, MediaKind, MediaPacket};
use super::QUEUE_POP_TIMEOUT;
use crate::rtp::{self, VideoCodec, VIDEO_TIMESTAMP_INCREMENT};
use crate::webrtc::PeerRegistry;

#[derive(Debug, Default)]
struct Stats {
    frames_sent: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    keyframes_sent: AtomicU64,
    frames_discarded: AtomicU64,
    malformed_frames: AtomicU64,
}

/// Point-in-time copy of the video sender counters.
#[derive(Debug, Clone, Default)]
pub struct VideoSenderStats {
    pub frames_sent: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub keyframes_sent: u64,
    /// Frames dequeued while no peer was connected.
    pub frames_discarded: u64,
    /// Frames without a usable bitstream (no start code, empty).
    pub malformed_frames: u64,
}

pub struct VideoSender {
    peers: Arc<PeerRegistry>,
    codec: RwLock<VideoCodec>,
    ssrc: u32,
    stats: Stats,
}

impl VideoSender {
    pub fn new(peers: Arc<PeerRegistry>, codec: VideoCodec) -> Arc<Self> {
        let ssrc: u32 = rand::random();
        info!(ssrc, codec = %codec, "video sender initialized");
        Arc::new(Self {
            peers,
            codec: RwLock::new(codec),
            ssrc,
            stats: Stats::default(),
        })
    }

    /// SSRC peers must advertise on their video tracks.
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Codec currently produced by the encoder.
    pub fn codec(&self) -> VideoCodec {
        *self.codec.read()
    }

    /// Switch the active codec. Takes effect on the next frame; peers keep
    /// the codec they negotiated at join time.
    pub fn set_codec(&self, codec: VideoCodec) {
        info!(codec = %codec, "video codec switched");
        *self.codec.write() = codec;
    }

    pub fn stats(&self) -> VideoSenderStats {
        VideoSenderStats {
            frames_sent: self.stats.frames_sent.load(Ordering::Relaxed),
            packets_sent: self.stats.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.stats.bytes_sent.load(Ordering::Relaxed),
            keyframes_sent: self.stats.keyframes_sent.load(Ordering::Relaxed),
            frames_discarded: self.stats.frames_discarded.load(Ordering::Relaxed),
            malformed_frames: self.stats.malformed_frames.load(Ordering::Relaxed),
        }
    }

    /// Run the fan-out loop until shutdown or the encoder closes its queue.
    pub fn spawn(
        self: &Arc<Self>,
        queue: mpsc::Receiver<EncodedVideoFrame>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let sender = self.clone();
        tokio::spawn(sender.run(queue, shutdown))
    }

    async fn run(
        self: Arc<Self>,
        mut queue: mpsc::Receiver<EncodedVideoFrame>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("video sender loop started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                popped = tokio::time::timeout(QUEUE_POP_TIMEOUT, queue.recv()) => {
                    match popped {
                        // Timed out, go around and re-check shutdown
                        Err(_) => continue,
                        Ok(None) => {
                            debug!("encoded video queue closed");
                            break;
                        }
                        Ok(Some(frame)) => self.process_frame(frame),
                    }
                }
            }
        }

        info!("video sender loop ended");
    }

    fn process_frame(&self, frame: EncodedVideoFrame) {
        // The frame is already dequeued; with nobody connected it is simply
        // discarded so stale frames never pile up for the next viewer.
        if self.peers.connected_count() == 0 {
            self.stats.frames_discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let codec = self.codec();
        let chunks = rtp::packetize_frame(codec, &frame.data, frame.is_keyframe);
        if chunks.is_empty() {
            self.stats.malformed_frames.fetch_add(1, Ordering::Relaxed);
            debug!(codec = %codec, len = frame.data.len(), "malformed video frame dropped");
            return;
        }

        // 90 kHz clock; 3000 per frame at the 30 fps baseline
        let timestamp = (frame.frame_index as u32).wrapping_mul(VIDEO_TIMESTAMP_INCREMENT);

        trace!(
            frame = frame.frame_index,
            packets = chunks.len(),
            keyframe = frame.is_keyframe,
            "video frame packetized"
        );

        for chunk in chunks {
            self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
            self.stats
                .bytes_sent
                .fetch_add(chunk.payload.len() as u64, Ordering::Relaxed);
            self.peers.broadcast_video(&MediaPacket {
                kind: MediaKind::Video,
                payload: chunk.payload,
                timestamp,
                marker: chunk.marker,
            });
        }

        self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
        if frame.is_keyframe {
            self.stats.keyframes_sent.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    use crate::config::IceSettings;
    use crate::input::testing::NullInput;
    use crate::input::InputRouter;
    use crate::room::RoomRegistry;

    fn empty_registry() -> Arc<PeerRegistry> {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let input = InputRouter::new(RoomRegistry::new(), Arc::new(NullInput));
        PeerRegistry::new(IceSettings::default(), events_tx, input)
    }

    fn frame(index: u64) -> EncodedVideoFrame {
        EncodedVideoFrame {
            data: Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x65, 0xAA]),
            is_keyframe: false,
            frame_index: index,
        }
    }

    #[tokio::test]
    async fn test_frames_discarded_without_peers() {
        let sender = VideoSender::new(empty_registry(), VideoCodec::H264);
        sender.process_frame(frame(0));
        sender.process_frame(frame(1));

        let stats = sender.stats();
        assert_eq!(stats.frames_discarded, 2);
        assert_eq!(stats.frames_sent, 0);
        assert_eq!(stats.packets_sent, 0);
    }

    #[tokio::test]
    async fn test_codec_switch() {
        let sender = VideoSender::new(empty_registry(), VideoCodec::H264);
        assert_eq!(sender.codec(), VideoCodec::H264);
        sender.set_codec(VideoCodec::Av1);
        assert_eq!(sender.codec(), VideoCodec::Av1);
    }

    #[tokio::test]
    async fn test_loop_drains_queue_and_honors_shutdown() {
        let sender = VideoSender::new(empty_registry(), VideoCodec::H264);
        let (frames_tx, frames_rx) = mpsc::channel(16);
        let (shutdown_tx, _) = broadcast::channel(1);

        let task = sender.spawn(frames_rx, shutdown_tx.subscribe());

        for i in 0..3 {
            frames_tx.send(frame(i)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sender.stats().frames_discarded, 3);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sender loop exits on shutdown")
            .unwrap();
    }
}

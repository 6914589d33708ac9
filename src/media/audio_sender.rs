//! Audio sender
//!
//! Opus is one RTP packet per frame, so the loop is a straight pipe: pop,
//! wrap, broadcast. The RTP timestamp advances by 480 (10 ms at 48 kHz) per
//! packet regardless of wall clock.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::frame::{MediaKind, MediaPacket, OpusPacket};
use super::QUEUE_POP_TIMEOUT;
use crate::rtp::AUDIO_TIMESTAMP_INCREMENT;
use crate::webrtc::PeerRegistry;

#[derive(Debug, Default)]
struct Stats {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_discarded: AtomicU64,
}

/// Point-in-time copy of the audio sender counters.
#[derive(Debug, Clone, Default)]
pub struct AudioSenderStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_discarded: u64,
}

pub struct AudioSender {
    peers: Arc<PeerRegistry>,
    ssrc: u32,
    timestamp: AtomicU32,
    stats: Stats,
}

impl AudioSender {
    pub fn new(peers: Arc<PeerRegistry>) -> Arc<Self> {
        // SSRC independent from the video sender's
        let ssrc: u32 = rand::random();
        info!(ssrc, "audio sender initialized");
        Arc::new(Self {
            peers,
            ssrc,
            timestamp: AtomicU32::new(0),
            stats: Stats::default(),
        })
    }

    /// SSRC peers must advertise on their audio tracks.
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn stats(&self) -> AudioSenderStats {
        AudioSenderStats {
            packets_sent: self.stats.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.stats.bytes_sent.load(Ordering::Relaxed),
            packets_discarded: self.stats.packets_discarded.load(Ordering::Relaxed),
        }
    }

    pub fn spawn(
        self: &Arc<Self>,
        queue: mpsc::Receiver<OpusPacket>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let sender = self.clone();
        tokio::spawn(sender.run(queue, shutdown))
    }

    async fn run(
        self: Arc<Self>,
        mut queue: mpsc::Receiver<OpusPacket>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("audio sender loop started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                popped = tokio::time::timeout(QUEUE_POP_TIMEOUT, queue.recv()) => {
                    match popped {
                        Err(_) => continue,
                        Ok(None) => {
                            debug!("encoded audio queue closed");
                            break;
                        }
                        Ok(Some(packet)) => self.process_packet(packet),
                    }
                }
            }
        }

        info!("audio sender loop ended");
    }

    fn process_packet(&self, packet: OpusPacket) {
        if packet.data.is_empty() {
            return;
        }

        // The timestamp advances per packet even when nobody listens, so a
        // late joiner sees a clock consistent with the stream position.
        let timestamp = self
            .timestamp
            .fetch_add(AUDIO_TIMESTAMP_INCREMENT, Ordering::Relaxed);

        if self.peers.connected_count() == 0 {
            self.stats.packets_discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_sent
            .fetch_add(packet.data.len() as u64, Ordering::Relaxed);

        self.peers.broadcast_audio(&MediaPacket {
            kind: MediaKind::Audio,
            payload: packet.data,
            timestamp,
            marker: true,
        });
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

    #[tokio::test]
    async fn test_timestamp_advances_per_packet() {
        let sender = AudioSender::new(empty_registry());

        sender.process_packet(OpusPacket {
            data: Bytes::from_static(&[0xFC, 0x01]),
        });
        sender.process_packet(OpusPacket {
            data: Bytes::from_static(&[0xFC, 0x02]),
        });

        assert_eq!(
            sender.timestamp.load(Ordering::Relaxed),
            2 * AUDIO_TIMESTAMP_INCREMENT
        );
        // Nobody connected, so both packets were discarded after clocking
        assert_eq!(sender.stats().packets_discarded, 2);
        assert_eq!(sender.stats().packets_sent, 0);
    }

    #[tokio::test]
    async fn test_empty_packet_ignored() {
        let sender = AudioSender::new(empty_registry());
        sender.process_packet(OpusPacket { data: Bytes::new() });

        assert_eq!(sender.timestamp.load(Ordering::Relaxed), 0);
        assert_eq!(sender.stats().packets_discarded, 0);
    }

    #[tokio::test]
    async fn test_ssrcs_independent() {
        let registry = empty_registry();
        let audio = AudioSender::new(registry.clone());
        let video = crate::media::VideoSender::new(registry, crate::rtp::VideoCodec::H264);
        // Random 32-bit values; colliding here would be a seeding bug
        assert_ne!(audio.ssrc(), video.ssrc());
    }

    #[tokio::test]
    async fn test_loop_exits_when_queue_closes() {
        let sender = AudioSender::new(empty_registry());
        let (packets_tx, packets_rx) = mpsc::channel::<OpusPacket>(4);
        let (shutdown_tx, _) = broadcast::channel(1);

        let task = sender.spawn(packets_rx, shutdown_tx.subscribe());
        drop(packets_tx);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sender loop exits when encoder hangs up")
            .unwrap();
    }
}

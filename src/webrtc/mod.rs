//! WebRTC peer fabric
//!
//! One [`Peer`] per browser client, collected in the [`PeerRegistry`] that
//! the media senders broadcast through.
//!
//! ```text
//! encoder queue -> media sender -> packetizer
//!                                     |
//!                      PeerRegistry::broadcast_*
//!                       /        |        \
//!                 SendQueue  SendQueue  SendQueue     (drop-oldest, 512)
//!                     |          |          |
//!                sender task sender task sender task  (RTP header stamp)
//!                     |          |          |
//!                  track      track      track        (webrtc-rs)
//! ```

pub mod peer;
pub mod queue;
pub mod registry;

pub use peer::{
    MediaSsrcs, Peer, PeerEvent, PeerEventKind, PeerState, PeerStatsSnapshot, INPUT_CHANNEL_LABEL,
};
pub use queue::{SendQueue, SEND_QUEUE_CAPACITY};
pub use registry::PeerRegistry;

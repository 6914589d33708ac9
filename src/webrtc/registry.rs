//! Peer registry
//!
//! Owns every live peer, keyed by id. Rooms store ids and resolve them here,
//! so destroying a peer is never blocked by room membership. The registry
//! lock is held only for map mutation, never across `close()` or any
//! library call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use super::peer::{MediaSsrcs, Peer, PeerEvent, PeerState};
use crate::config::IceSettings;
use crate::error::{Error, Result};
use crate::input::router::InputRouter;
use crate::media::MediaPacket;
use crate::rtp::VideoCodec;

pub struct PeerRegistry {
    peers: RwLock<HashMap<String, Arc<Peer>>>,
    ice: RwLock<IceSettings>,
    events: mpsc::UnboundedSender<PeerEvent>,
    input: Arc<InputRouter>,
}

impl PeerRegistry {
    pub fn new(
        ice: IceSettings,
        events: mpsc::UnboundedSender<PeerEvent>,
        input: Arc<InputRouter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
            ice: RwLock::new(ice),
            events,
            input,
        })
    }

    /// Create a peer and register it before any negotiation begins, so every
    /// library callback can resolve the id.
    pub async fn create(
        &self,
        id: &str,
        codec: VideoCodec,
        ssrcs: MediaSsrcs,
    ) -> Result<Arc<Peer>> {
        if self.peers.read().contains_key(id) {
            return Err(Error::WebRtc(format!("peer id already registered: {id}")));
        }

        let ice = self.ice.read().clone();
        let peer = Peer::new(
            id.to_string(),
            &ice,
            codec,
            ssrcs,
            self.events.clone(),
            self.input.clone(),
        )
        .await?;

        self.peers.write().insert(id.to_string(), peer.clone());
        debug!(peer = %id, "peer registered");
        Ok(peer)
    }

    pub fn find(&self, id: &str) -> Option<Arc<Peer>> {
        self.peers.read().get(id).cloned()
    }

    /// Remove and close a peer. The handle is extracted under the lock and
    /// closed after it is released; holding the registry lock across
    /// destruction would deadlock with callbacks removing themselves.
    pub async fn remove(&self, id: &str) -> bool {
        let peer = self.peers.write().remove(id);
        match peer {
            Some(peer) => {
                peer.close().await;
                debug!(peer = %id, "peer removed");
                true
            }
            None => false,
        }
    }

    pub fn get_all(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Number of peers currently in the CONNECTED state.
    pub fn connected_count(&self) -> usize {
        self.peers
            .read()
            .values()
            .filter(|p| p.state() == PeerState::Connected)
            .count()
    }

    /// Fan a video packet out to every connected peer. Iterates a snapshot
    /// taken under a short read lock.
    pub fn broadcast_video(&self, packet: &MediaPacket) {
        for peer in self.connected_snapshot() {
            peer.send_video(packet.clone());
        }
    }

    /// Fan an audio packet out to every connected peer.
    pub fn broadcast_audio(&self, packet: &MediaPacket) {
        for peer in self.connected_snapshot() {
            peer.send_audio(packet.clone());
        }
    }

    fn connected_snapshot(&self) -> Vec<Arc<Peer>> {
        self.peers
            .read()
            .values()
            .filter(|p| p.state() == PeerState::Connected)
            .cloned()
            .collect()
    }

    pub fn set_ice_settings(&self, ice: IceSettings) {
        *self.ice.write() = ice;
    }

    pub fn ice_settings(&self) -> IceSettings {
        self.ice.read().clone()
    }

    /// Close every peer, used on shutdown.
    pub async fn close_all(&self) {
        let peers: Vec<Arc<Peer>> = self.peers.write().drain().map(|(_, p)| p).collect();
        for peer in peers {
            peer.close().await;
        }
    }
}

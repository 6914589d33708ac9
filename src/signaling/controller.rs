//! Signaling controller
//!
//! Owns the WebSocket transport, decodes client messages, drives the room
//! and peer registries, and forwards peer lifecycle events back to browsers.
//!
//! Disconnect cleanup is ordered deterministically: the peer leaves the peer
//! registry first (which stops media sends), then the room (notifying the
//! other members), and the connection mapping is erased last. A host
//! disconnect closes the whole room and, if it was the last room, stops
//! capture.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{ClientMessage, JoinedRoom, PlayerSummary, ServerMessage};
use super::server::{ConnectionId, SignalingHandler, SignalingServer};
use crate::error::{Error, Result};
use crate::input::{wire, InputRouter};
use crate::media::{AudioSender, EncoderControl, QualitySettings, VideoSender};
use crate::room::{Room, RoomRegistry};
use crate::webrtc::{
    MediaSsrcs, PeerEvent, PeerEventKind, PeerRegistry, PeerState, INPUT_CHANNEL_LABEL,
};

/// Fixed code of the single streaming session room.
pub const SESSION_ROOM_CODE: &str = "STREAM";

/// Connection-id <-> peer-id mapping; one lock covers both directions.
#[derive(Default)]
struct Links {
    peer_by_conn: HashMap<ConnectionId, String>,
    conn_by_peer: HashMap<String, ConnectionId>,
}

pub struct SignalingController {
    server: Arc<SignalingServer>,
    peers: Arc<PeerRegistry>,
    rooms: Arc<RoomRegistry>,
    video: Arc<VideoSender>,
    audio: Arc<AudioSender>,
    encoder: Arc<dyn EncoderControl>,
    input: Arc<InputRouter>,
    max_players: u8,
    links: Mutex<Links>,
}

impl SignalingController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server: Arc<SignalingServer>,
        peers: Arc<PeerRegistry>,
        rooms: Arc<RoomRegistry>,
        video: Arc<VideoSender>,
        audio: Arc<AudioSender>,
        encoder: Arc<dyn EncoderControl>,
        input: Arc<InputRouter>,
        max_players: u8,
    ) -> Arc<Self> {
        Arc::new(Self {
            server,
            peers,
            rooms,
            video,
            audio,
            encoder,
            input,
            max_players,
            links: Mutex::new(Links::default()),
        })
    }

    /// Consume peer lifecycle events for the controller's lifetime.
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> JoinHandle<()> {
        let controller = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(controller) = controller.upgrade() else { return };
                controller.handle_peer_event(event).await;
            }
        })
    }

    async fn handle_peer_event(&self, event: PeerEvent) {
        match event.kind {
            PeerEventKind::LocalDescription { sdp, sdp_type } => {
                self.send_to_peer(&event.peer_id, &ServerMessage::Sdp { sdp, sdp_type });
            }
            PeerEventKind::LocalCandidate { candidate, mid } => {
                self.send_to_peer(&event.peer_id, &ServerMessage::Ice { candidate, mid });
            }
            PeerEventKind::StateChange(PeerState::Connected) => {
                // Every new viewer needs a fresh keyframe; without this a
                // late joiner would wait for the next GOP.
                info!(peer = %event.peer_id, "peer connected, requesting IDR");
                self.encoder.request_idr();
                self.send_to_peer(&event.peer_id, &ServerMessage::StreamReady);
            }
            PeerEventKind::StateChange(state) => {
                debug!(peer = %event.peer_id, %state, "peer state change");
            }
        }
    }

    fn peer_for_conn(&self, conn_id: ConnectionId) -> Option<String> {
        self.links.lock().peer_by_conn.get(&conn_id).cloned()
    }

    /// Send a message to a peer over its signaling connection.
    fn send_to_peer(&self, peer_id: &str, message: &ServerMessage) -> bool {
        let conn_id = self.links.lock().conn_by_peer.get(peer_id).copied();
        let Some(conn_id) = conn_id else {
            debug!(peer = %peer_id, "no signaling connection for peer");
            return false;
        };
        match message.to_json() {
            Ok(json) => self.server.send(conn_id, json),
            Err(e) => {
                warn!(peer = %peer_id, error = %e, "message serialization failed");
                false
            }
        }
    }

    fn send_error(&self, peer_id: &str, error: &Error) {
        debug!(peer = %peer_id, code = error.code(), "signaling error reply: {error}");
        self.send_to_peer(
            peer_id,
            &ServerMessage::Error {
                code: error.code().to_string(),
                message: error.to_string(),
            },
        );
    }

    fn broadcast_to_room(&self, room: &Room, message: &ServerMessage, exclude: Option<&str>) {
        for member in room.peer_ids() {
            if Some(member.as_str()) != exclude {
                self.send_to_peer(&member, message);
            }
        }
    }

    /// Member list for `room_*` replies, players first by slot.
    fn player_summaries(&self, room: &Room) -> Vec<PlayerSummary> {
        let mut players = room.players();
        players.sort_by_key(|p| (p.is_spectator, p.slot, p.peer_id.clone()));
        players.iter().map(PlayerSummary::from).collect()
    }

    async fn dispatch(&self, peer_id: &str, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::Join { player_name } => self.handle_join(peer_id, &player_name).await,
            ClientMessage::Leave => self.handle_leave(peer_id).await,
            ClientMessage::JoinAsPlayer => self.handle_join_as_player(peer_id),
            ClientMessage::ClaimGamepad { gamepad_id } => {
                self.handle_claim_gamepad(peer_id, gamepad_id)
            }
            ClientMessage::ReleaseGamepad { server_slot } => {
                self.handle_release_gamepad(peer_id, server_slot)
            }
            ClientMessage::Sdp { sdp, sdp_type } => {
                self.handle_sdp(peer_id, &sdp, &sdp_type).await
            }
            ClientMessage::Ice { candidate, mid } => {
                self.handle_ice(peer_id, &candidate, &mid).await
            }
            ClientMessage::SetGuestKeyboard {
                peer_id: target,
                enabled,
            } => self.handle_set_guest_keyboard(peer_id, &target, enabled),
            ClientMessage::SetGuestMouse {
                peer_id: target,
                enabled,
            } => self.handle_set_guest_mouse(peer_id, &target, enabled),
            ClientMessage::SetQuality {
                bitrate,
                framerate,
                width,
                height,
            } => {
                self.handle_set_quality(peer_id, bitrate, framerate, width, height)
                    .await
            }
        }
    }

    /// First joiner starts capture and becomes the host; everyone after
    /// joins the session room as a spectator. Either way the peer gets the
    /// media tracks, the input channel, and the server-initiated offer.
    async fn handle_join(&self, peer_id: &str, player_name: &str) -> Result<()> {
        if self.rooms.find_by_peer(peer_id).is_some() {
            return Err(Error::AlreadyJoined);
        }

        let existing = self.rooms.find(SESSION_ROOM_CODE);
        let is_first = existing.is_none();

        if is_first {
            info!("first peer joining, starting capture");
            if let Err(e) = self.encoder.start_capture().await {
                warn!(error = %e, "capture start failed, stream may be unavailable");
            }
        }

        let codec = self.video.codec();
        let ssrcs = MediaSsrcs {
            video: self.video.ssrc(),
            audio: self.audio.ssrc(),
        };

        let peer = match self.peers.create(peer_id, codec, ssrcs).await {
            Ok(peer) => peer,
            Err(e) => {
                if is_first {
                    self.encoder.stop_capture().await;
                }
                return Err(e);
            }
        };

        let room = if is_first {
            let room = Arc::new(Room::new(
                SESSION_ROOM_CODE,
                peer_id,
                player_name,
                self.max_players,
            ));
            self.rooms.insert_room(room.clone());
            room
        } else {
            let room = existing.expect("checked above");
            if let Err(e) = room.add_spectator(peer_id, player_name) {
                self.peers.remove(peer_id).await;
                return Err(e);
            }
            self.rooms.register_peer(peer_id, SESSION_ROOM_CODE);
            room
        };

        // Media surface; failures here leave a control-only peer, which the
        // browser will surface, so log and keep going.
        if let Err(e) = peer.add_video_track(codec).await {
            warn!(peer = %peer_id, error = %e, "video track setup failed");
        }
        if let Err(e) = peer.add_audio_track().await {
            warn!(peer = %peer_id, error = %e, "audio track setup failed");
        }
        if let Err(e) = peer.create_data_channel(INPUT_CHANNEL_LABEL).await {
            warn!(peer = %peer_id, error = %e, "input channel setup failed");
        }

        // The server owns the media directions, so it makes the offer.
        if let Err(e) = peer.create_description("offer").await {
            warn!(peer = %peer_id, error = %e, "offer creation failed");
        }

        let joined = JoinedRoom {
            room_code: SESSION_ROOM_CODE.to_string(),
            peer_id: peer_id.to_string(),
            player_slot: if is_first { 1 } else { 0 },
            is_host: is_first,
            is_spectator: !is_first,
            keyboard_enabled: is_first,
            mouse_enabled: is_first,
            players: self.player_summaries(&room),
        };
        let reply = if is_first {
            ServerMessage::RoomCreated(joined)
        } else {
            ServerMessage::RoomJoined(joined)
        };
        self.send_to_peer(peer_id, &reply);

        if !is_first {
            if let Some(player) = room.player(peer_id) {
                self.broadcast_to_room(
                    &room,
                    &ServerMessage::PlayerJoined {
                        player: PlayerSummary::from(&player),
                    },
                    Some(peer_id),
                );
            }
            // Keep the running stream decodable for the newcomer
            self.encoder.request_idr();
        }

        info!(
            peer = %peer_id,
            name = %player_name,
            role = if is_first { "host" } else { "spectator" },
            "joined session"
        );
        Ok(())
    }

    /// Reverse of `join`, keeping the socket open.
    async fn handle_leave(&self, peer_id: &str) -> Result<()> {
        if self.rooms.find_by_peer(peer_id).is_none() {
            return Err(Error::NotInRoom);
        }

        // Confirm before teardown; afterwards the peer mapping may be gone
        self.send_to_peer(peer_id, &ServerMessage::LeftRoom);
        self.cleanup_peer(peer_id).await;
        Ok(())
    }

    fn handle_join_as_player(&self, peer_id: &str) -> Result<()> {
        let room = self.rooms.find_by_peer(peer_id).ok_or(Error::NotInRoom)?;

        let slot = room.promote_to_player(peer_id)?;

        self.send_to_peer(
            peer_id,
            &ServerMessage::PromotedToPlayer {
                player_slot: slot,
                keyboard_enabled: room.default_keyboard_access(),
                mouse_enabled: room.default_mouse_access(),
            },
        );
        self.broadcast_to_room(
            &room,
            &ServerMessage::RoomUpdated {
                players: self.player_summaries(&room),
            },
            None,
        );

        // A promoted player is watching closely; refresh the picture
        self.encoder.request_idr();

        info!(peer = %peer_id, slot, "promoted to player");
        Ok(())
    }

    fn handle_claim_gamepad(&self, peer_id: &str, gamepad_id: u8) -> Result<()> {
        let room = self.rooms.find_by_peer(peer_id).ok_or(Error::NotInRoom)?;
        let server_slot = room.claim_gamepad(peer_id, gamepad_id)?;

        self.send_to_peer(
            peer_id,
            &ServerMessage::GamepadClaimed {
                gamepad_id,
                server_slot,
            },
        );
        Ok(())
    }

    fn handle_release_gamepad(&self, peer_id: &str, server_slot: u8) -> Result<()> {
        let room = self.rooms.find_by_peer(peer_id).ok_or(Error::NotInRoom)?;
        room.release_gamepad(peer_id, server_slot);

        self.send_to_peer(peer_id, &ServerMessage::GamepadReleased { server_slot });
        Ok(())
    }

    async fn handle_sdp(&self, peer_id: &str, sdp: &str, sdp_type: &str) -> Result<()> {
        let peer = self
            .peers
            .find(peer_id)
            .ok_or_else(|| Error::PeerGone(peer_id.to_string()))?;

        peer.set_remote_description(sdp, sdp_type).await?;

        // An offer obliges us to answer; an answer completes negotiation.
        if sdp_type == "offer" {
            peer.create_description("answer").await?;
        }
        Ok(())
    }

    async fn handle_ice(&self, peer_id: &str, candidate: &str, mid: &str) -> Result<()> {
        let peer = self
            .peers
            .find(peer_id)
            .ok_or_else(|| Error::PeerGone(peer_id.to_string()))?;

        if !peer.add_ice_candidate(candidate, mid).await {
            return Err(Error::BadIce(candidate.to_string()));
        }
        Ok(())
    }

    fn handle_set_guest_keyboard(
        &self,
        peer_id: &str,
        target: &str,
        enabled: bool,
    ) -> Result<()> {
        let room = self.rooms.find_by_peer(peer_id).ok_or(Error::NotInRoom)?;
        if !room.is_host(peer_id) {
            return Err(Error::NotHost);
        }

        // The room default tracks the host's latest toggle
        room.set_default_keyboard_access(enabled);

        if room.set_keyboard_access(target, enabled) {
            self.send_to_peer(
                target,
                &ServerMessage::PermissionChanged {
                    keyboard_enabled: Some(enabled),
                    mouse_enabled: None,
                },
            );
            self.broadcast_to_room(
                &room,
                &ServerMessage::RoomUpdated {
                    players: self.player_summaries(&room),
                },
                None,
            );
        }
        Ok(())
    }

    fn handle_set_guest_mouse(&self, peer_id: &str, target: &str, enabled: bool) -> Result<()> {
        let room = self.rooms.find_by_peer(peer_id).ok_or(Error::NotInRoom)?;
        if !room.is_host(peer_id) {
            return Err(Error::NotHost);
        }

        room.set_default_mouse_access(enabled);

        if room.set_mouse_access(target, enabled) {
            self.send_to_peer(
                target,
                &ServerMessage::PermissionChanged {
                    keyboard_enabled: None,
                    mouse_enabled: Some(enabled),
                },
            );
            self.broadcast_to_room(
                &room,
                &ServerMessage::RoomUpdated {
                    players: self.player_summaries(&room),
                },
                None,
            );
        }
        Ok(())
    }

    async fn handle_set_quality(
        &self,
        peer_id: &str,
        bitrate: u32,
        framerate: u32,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let room = self.rooms.find_by_peer(peer_id).ok_or(Error::NotInRoom)?;
        if !room.is_host(peer_id) {
            return Err(Error::NotHost);
        }

        let quality = QualitySettings {
            bitrate_kbps: bitrate,
            framerate,
            width,
            height,
        }
        .clamped();

        info!(
            peer = %peer_id,
            bitrate = quality.bitrate_kbps,
            framerate = quality.framerate,
            width = quality.width,
            height = quality.height,
            "quality change requested"
        );

        self.encoder
            .apply_quality(quality)
            .await
            .map_err(|e| Error::Encoder(e.to_string()))?;

        self.send_to_peer(
            peer_id,
            &ServerMessage::QualityUpdated {
                success: true,
                bitrate: quality.bitrate_kbps,
                framerate: quality.framerate,
                width: quality.width,
                height: quality.height,
                note: "Bitrate updated. Resolution and framerate changes may require a stream restart.".to_string(),
            },
        );
        Ok(())
    }

    /// Rumble feedback toward whichever peer owns a server gamepad slot.
    pub async fn send_rumble(
        &self,
        server_slot: u8,
        low_freq: u16,
        high_freq: u16,
        duration_ms: u16,
    ) -> bool {
        let Some(room) = self.rooms.find(SESSION_ROOM_CODE) else {
            return false;
        };
        let Some(owner) = room.gamepad_owner(server_slot) else {
            return false;
        };
        let Some(peer) = self.peers.find(&owner) else {
            return false;
        };

        let frame = wire::encode_rumble(server_slot, low_freq, high_freq, duration_ms);
        peer.send_binary(INPUT_CHANNEL_LABEL, &frame).await
    }

    /// Tear a peer down in dependency order: media first, then room
    /// membership, then the connection mapping.
    async fn cleanup_peer(&self, peer_id: &str) {
        // Stop media sends before touching room state
        self.peers.remove(peer_id).await;

        let Some(room) = self.rooms.find_by_peer(peer_id) else {
            return;
        };

        let player = room.player(peer_id);
        let room_code = room.code().to_string();
        let host_left = room.remove_peer(peer_id);
        self.rooms.unregister_peer(peer_id);

        // A vanished peer may have left keys or buttons held down
        if let Some(player) = &player {
            if player.can_use_keyboard || player.can_use_mouse || !player.gamepad_slots.is_empty()
            {
                self.input.reset().await;
            }
        }

        if host_left {
            info!(room = %room_code, "host left, closing room");
            self.broadcast_to_room(
                &room,
                &ServerMessage::RoomClosed {
                    reason: "host_left".to_string(),
                },
                Some(peer_id),
            );
            self.rooms.remove(&room_code);

            if self.rooms.room_count() == 0 {
                info!("last room closed, stopping capture");
                self.encoder.stop_capture().await;
            }
        } else if let Some(player) = player {
            self.broadcast_to_room(
                &room,
                &ServerMessage::PlayerLeft {
                    peer_id: peer_id.to_string(),
                    slot: player.slot,
                },
                Some(peer_id),
            );
            self.broadcast_to_room(
                &room,
                &ServerMessage::RoomUpdated {
                    players: self.player_summaries(&room),
                },
                Some(peer_id),
            );
        }
    }
}

#[async_trait]
impl SignalingHandler for SignalingController {
    async fn on_connect(&self, conn_id: ConnectionId) {
        let peer_id = format!("peer_{conn_id}");
        let mut links = self.links.lock();
        links.peer_by_conn.insert(conn_id, peer_id.clone());
        links.conn_by_peer.insert(peer_id, conn_id);
    }

    async fn on_message(&self, conn_id: ConnectionId, text: String) {
        let Some(peer_id) = self.peer_for_conn(conn_id) else {
            return;
        };

        // Invalid JSON and unknown types get distinct error codes
        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                self.send_error(&peer_id, &Error::Parse(e));
                return;
            }
        };
        let message: ClientMessage = match serde_json::from_value(value.clone()) {
            Ok(message) => message,
            Err(_) => {
                let kind = value["type"].as_str().unwrap_or("<missing>").to_string();
                self.send_error(&peer_id, &Error::UnknownType(kind));
                return;
            }
        };

        debug!(peer = %peer_id, "signaling message: {message:?}");

        if let Err(e) = self.dispatch(&peer_id, message).await {
            self.send_error(&peer_id, &e);
        }
    }

    async fn on_disconnect(&self, conn_id: ConnectionId) {
        let Some(peer_id) = self.peer_for_conn(conn_id) else {
            return;
        };
        info!(peer = %peer_id, "signaling connection closed");

        self.cleanup_peer(&peer_id).await;

        let mut links = self.links.lock();
        links.peer_by_conn.remove(&conn_id);
        links.conn_by_peer.remove(&peer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use crate::config::WebRtcSettings;
    use crate::input::testing::NullInput;
    use crate::state::Runtime;

    #[derive(Default)]
    struct FakeEncoder {
        capturing: AtomicBool,
        idr_requests: AtomicU64,
        last_quality: Mutex<Option<QualitySettings>>,
    }

    #[async_trait]
    impl EncoderControl for FakeEncoder {
        async fn start_capture(&self) -> crate::error::Result<()> {
            self.capturing.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn stop_capture(&self) {
            self.capturing.store(false, Ordering::SeqCst);
        }
        fn request_idr(&self) {
            self.idr_requests.fetch_add(1, Ordering::SeqCst);
        }
        async fn apply_quality(&self, quality: QualitySettings) -> crate::error::Result<()> {
            *self.last_quality.lock() = Some(quality);
            Ok(())
        }
    }

    fn runtime() -> (Arc<Runtime>, Arc<FakeEncoder>) {
        let encoder = Arc::new(FakeEncoder::default());
        let runtime = Runtime::new(
            WebRtcSettings::default(),
            encoder.clone(),
            Arc::new(NullInput),
        );
        (runtime, encoder)
    }

    async fn join(controller: &SignalingController, conn: ConnectionId, name: &str) {
        controller.on_connect(conn).await;
        controller
            .on_message(
                conn,
                format!(r#"{{"type":"join","player_name":"{name}"}}"#),
            )
            .await;
    }

    #[tokio::test]
    async fn test_first_join_creates_session_as_host() {
        let (runtime, encoder) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;

        assert!(encoder.capturing.load(Ordering::SeqCst));
        let room = runtime.rooms.find(SESSION_ROOM_CODE).expect("room exists");
        let host = room.player("peer_1").expect("host present");
        assert_eq!(host.slot, 1);
        assert!(host.is_host);
        assert!(host.can_use_keyboard && host.can_use_mouse);
        assert!(runtime.peers.find("peer_1").is_some());
    }

    #[tokio::test]
    async fn test_second_join_is_spectator_until_promoted() {
        let (runtime, encoder) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;
        join(controller, 2, "Bob").await;

        let room = runtime.rooms.find(SESSION_ROOM_CODE).unwrap();
        let bob = room.player("peer_2").unwrap();
        assert!(bob.is_spectator);
        assert_eq!(bob.slot, 0);

        let idr_before = encoder.idr_requests.load(Ordering::SeqCst);
        controller
            .on_message(2, r#"{"type":"join_as_player"}"#.to_string())
            .await;

        let bob = room.player("peer_2").unwrap();
        assert!(!bob.is_spectator);
        assert_eq!(bob.slot, 2);
        assert!(encoder.idr_requests.load(Ordering::SeqCst) > idr_before);
    }

    #[tokio::test]
    async fn test_gamepad_claim_is_idempotent_over_signaling() {
        let (runtime, _) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;
        join(controller, 2, "Bob").await;
        controller
            .on_message(2, r#"{"type":"join_as_player"}"#.to_string())
            .await;

        controller
            .on_message(2, r#"{"type":"claim_gamepad","gamepad_id":0}"#.to_string())
            .await;
        controller
            .on_message(2, r#"{"type":"claim_gamepad","gamepad_id":0}"#.to_string())
            .await;

        let room = runtime.rooms.find(SESSION_ROOM_CODE).unwrap();
        assert_eq!(room.gamepad_slot("peer_2", 0), Some(0));
        assert_eq!(room.player("peer_2").unwrap().gamepad_slots, vec![0]);
    }

    #[tokio::test]
    async fn test_permission_toggle_host_only() {
        let (runtime, _) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;
        join(controller, 2, "Bob").await;
        controller
            .on_message(2, r#"{"type":"join_as_player"}"#.to_string())
            .await;

        let room = runtime.rooms.find(SESSION_ROOM_CODE).unwrap();
        assert!(room.can_use_keyboard("peer_2"));

        // Host revokes Bob's keyboard
        controller
            .on_message(
                1,
                r#"{"type":"set_guest_keyboard","peer_id":"peer_2","enabled":false}"#.to_string(),
            )
            .await;
        assert!(!room.can_use_keyboard("peer_2"));
        assert!(!room.default_keyboard_access());

        // Bob cannot grant it back to himself
        controller
            .on_message(
                2,
                r#"{"type":"set_guest_keyboard","peer_id":"peer_2","enabled":true}"#.to_string(),
            )
            .await;
        assert!(!room.can_use_keyboard("peer_2"));
    }

    #[tokio::test]
    async fn test_set_quality_clamped_and_host_only() {
        let (runtime, encoder) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;
        join(controller, 2, "Bob").await;

        // Non-host request is rejected before the encoder sees it
        controller
            .on_message(2, r#"{"type":"set_quality","bitrate":5000}"#.to_string())
            .await;
        assert!(encoder.last_quality.lock().is_none());

        controller
            .on_message(
                1,
                r#"{"type":"set_quality","bitrate":500,"framerate":500,"width":320,"height":90}"#
                    .to_string(),
            )
            .await;

        let quality = (*encoder.last_quality.lock()).expect("quality applied");
        assert_eq!(quality.bitrate_kbps, 1_000);
        assert_eq!(quality.framerate, 240);
        assert_eq!(quality.width, 640);
        assert_eq!(quality.height, 480);
    }

    #[tokio::test]
    async fn test_host_disconnect_closes_room_and_stops_capture() {
        let (runtime, encoder) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;
        join(controller, 2, "Bob").await;

        controller.on_disconnect(1).await;

        assert!(runtime.rooms.find(SESSION_ROOM_CODE).is_none());
        assert!(runtime.peers.find("peer_1").is_none());
        assert!(!encoder.capturing.load(Ordering::SeqCst));
        // Bob's peer stays up until his own socket closes
        assert!(runtime.peers.find("peer_2").is_some());
    }

    #[tokio::test]
    async fn test_guest_leave_keeps_room_open() {
        let (runtime, encoder) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;
        join(controller, 2, "Bob").await;
        controller
            .on_message(2, r#"{"type":"leave"}"#.to_string())
            .await;

        let room = runtime.rooms.find(SESSION_ROOM_CODE).expect("room survives");
        assert!(room.player("peer_2").is_none());
        assert!(runtime.peers.find("peer_2").is_none());
        assert!(encoder.capturing.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_join_twice_rejected() {
        let (runtime, _) = runtime();
        let controller = &runtime.controller;

        join(controller, 1, "Alice").await;
        controller
            .on_message(1, r#"{"type":"join","player_name":"Alice"}"#.to_string())
            .await;

        let room = runtime.rooms.find(SESSION_ROOM_CODE).unwrap();
        assert_eq!(room.peer_count(), 1);
    }

    #[tokio::test]
    async fn test_room_full_after_four_players() {
        let (runtime, _) = runtime();
        let controller = &runtime.controller;

        for conn in 1..=5 {
            join(controller, conn, &format!("p{conn}")).await;
            controller
                .on_message(conn, r#"{"type":"join_as_player"}"#.to_string())
                .await;
        }

        let room = runtime.rooms.find(SESSION_ROOM_CODE).unwrap();
        assert_eq!(room.player_count(), 4);
        assert!(room.player("peer_5").unwrap().is_spectator);
    }
}

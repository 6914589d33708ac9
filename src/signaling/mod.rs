//! WebSocket signaling
//!
//! The transport ([`server`]) owns sockets and connection ids; the
//! controller ([`controller`]) owns the session semantics: join/leave,
//! promotion, gamepad claims, permissions, SDP/ICE relay, and the ordered
//! teardown when a socket drops.

pub mod controller;
pub mod messages;
pub mod server;

pub use controller::{SignalingController, SESSION_ROOM_CODE};
pub use messages::{ClientMessage, JoinedRoom, PlayerSummary, ServerMessage};
pub use server::{ConnectionId, SignalingHandler, SignalingServer};

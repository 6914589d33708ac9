//! Streaming configuration
//!
//! Typed view over the host configuration keys this crate consumes. Loading
//! and persisting the configuration file is the embedding server's concern;
//! we only interpret the `webrtc_*` keys and derive ICE settings from them.

use serde::{Deserialize, Serialize};

use crate::rtp::VideoCodec;

/// Default STUN server when none is configured.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Default TURN port for `turn:` URLs without an explicit port.
const DEFAULT_TURN_PORT: u16 = 3478;

/// Default TURNS port for `turns:` URLs without an explicit port.
const DEFAULT_TURNS_PORT: u16 = 5349;

/// Offset of the signaling WebSocket port from the server base port.
const SIGNALING_PORT_OFFSET: u16 = 2;

/// WebRTC streaming settings consumed from the host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRtcSettings {
    /// Master enable for the WebRTC streaming layer.
    #[serde(rename = "webrtc_enabled", default = "default_true")]
    pub enabled: bool,

    /// Maximum number of player slots (clamped to 1..=4).
    #[serde(rename = "webrtc_max_players", default = "default_max_players")]
    pub max_players: u8,

    /// STUN server URL. Empty selects the default public server.
    #[serde(rename = "webrtc_stun_server", default)]
    pub stun_server: String,

    /// TURN server URL (`turn:host[:port]` or `turns:host[:port]`).
    #[serde(rename = "webrtc_turn_server", default)]
    pub turn_server: String,

    /// TURN username. Credentials are only applied when non-empty.
    #[serde(rename = "webrtc_turn_username", default)]
    pub turn_username: String,

    /// TURN password.
    #[serde(rename = "webrtc_turn_password", default)]
    pub turn_password: String,

    /// Lower bound of the UDP port range for ICE (0 = unrestricted).
    #[serde(rename = "webrtc_port_range_min", default)]
    pub port_range_min: u16,

    /// Upper bound of the UDP port range for ICE (0 = unrestricted).
    #[serde(rename = "webrtc_port_range_max", default)]
    pub port_range_max: u16,

    /// Serve the signaling WebSocket over TLS.
    #[serde(rename = "signaling_ssl", default = "default_true")]
    pub signaling_ssl: bool,

    /// Server base port; the signaling WebSocket listens on `base_port + 2`.
    #[serde(rename = "base_port", default = "default_base_port")]
    pub base_port: u16,

    /// Initial video codec. The active codec may change with the encoder.
    #[serde(rename = "webrtc_video_codec", default)]
    pub video_codec: VideoCodec,

    /// Path to the TLS certificate (PEM). Shared with the host HTTPS server.
    #[serde(rename = "ssl_cert", default)]
    pub cert_path: String,

    /// Path to the TLS private key (PEM).
    #[serde(rename = "ssl_key", default)]
    pub key_path: String,
}

fn default_true() -> bool {
    true
}

fn default_max_players() -> u8 {
    4
}

fn default_base_port() -> u16 {
    47989
}

impl Default for WebRtcSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_players: 4,
            stun_server: String::new(),
            turn_server: String::new(),
            turn_username: String::new(),
            turn_password: String::new(),
            port_range_min: 0,
            port_range_max: 0,
            signaling_ssl: true,
            base_port: default_base_port(),
            video_codec: VideoCodec::default(),
            cert_path: String::new(),
            key_path: String::new(),
        }
    }
}

impl WebRtcSettings {
    /// Signaling WebSocket port.
    pub fn signaling_port(&self) -> u16 {
        self.base_port + SIGNALING_PORT_OFFSET
    }

    /// Player slot cap, clamped to the supported range.
    pub fn max_players(&self) -> u8 {
        self.max_players.clamp(1, 4)
    }

    /// Build the ICE settings handed to each new peer connection.
    pub fn ice(&self) -> IceSettings {
        let stun = if self.stun_server.is_empty() {
            DEFAULT_STUN_SERVER.to_string()
        } else {
            self.stun_server.clone()
        };

        let turn = if self.turn_server.is_empty() {
            None
        } else {
            let mut turn = TurnServer::parse(&self.turn_server);
            turn.username = self.turn_username.clone();
            turn.credential = self.turn_password.clone();
            Some(turn)
        };

        let port_range = if self.port_range_min > 0 && self.port_range_max >= self.port_range_min {
            Some((self.port_range_min, self.port_range_max))
        } else {
            None
        };

        IceSettings {
            stun_servers: vec![stun],
            turn_server: turn,
            port_range,
        }
    }
}

/// ICE configuration derived from [`WebRtcSettings`].
#[derive(Debug, Clone, Default)]
pub struct IceSettings {
    /// STUN server URLs.
    pub stun_servers: Vec<String>,
    /// TURN relay, if configured.
    pub turn_server: Option<TurnServer>,
    /// UDP port range restriction for ICE candidates.
    pub port_range: Option<(u16, u16)>,
}

/// A parsed TURN relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnServer {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: String,
    /// True for `turns:` (TURN over TLS).
    pub tls: bool,
}

impl TurnServer {
    /// Parse a `turn[s]:host[:port]` URL. Missing ports default to 3478
    /// (TURN) or 5349 (TURNS); a bare hostname is accepted as plain TURN.
    pub fn parse(url: &str) -> Self {
        let (rest, tls, default_port) = if let Some(rest) = url.strip_prefix("turns:") {
            (rest, true, DEFAULT_TURNS_PORT)
        } else if let Some(rest) = url.strip_prefix("turn:") {
            (rest, false, DEFAULT_TURN_PORT)
        } else {
            (url, false, DEFAULT_TURN_PORT)
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => match port_str.parse::<u16>() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (rest.to_string(), default_port),
            },
            None => (rest.to_string(), default_port),
        };

        Self {
            host,
            port,
            username: String::new(),
            credential: String::new(),
            tls,
        }
    }

    /// Rebuild the URL form consumed by the ICE agent.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "turns" } else { "turn" };
        format!("{}:{}:{}", scheme, self.host, self.port)
    }
}

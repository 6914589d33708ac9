use thiserror::Error;

/// Crate-wide error type.
///
/// Signaling handlers map these onto `{"type":"error","code":...}` replies via
/// [`Error::code`]. Media paths never propagate errors upward; they count and
/// drop instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid SDP: {0}")]
    BadSdp(String),

    #[error("invalid ICE candidate: {0}")]
    BadIce(String),

    #[error("no player slots available")]
    RoomFull,

    #[error("room not found")]
    RoomNotFound,

    #[error("not in a room")]
    NotInRoom,

    #[error("only the host can do that")]
    NotHost,

    #[error("peer already in a room")]
    AlreadyJoined,

    #[error("all gamepad slots are in use")]
    GamepadExhausted,

    #[error("spectators cannot claim gamepads")]
    SpectatorInput,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("malformed message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("peer not found: {0}")]
    PeerGone(String),

    #[error("webrtc error: {0}")]
    WebRtc(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wire code used in signaling `error` replies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport_error",
            Error::BadSdp(_) | Error::BadIce(_) | Error::WebRtc(_) => "peer_error",
            Error::RoomFull => "room_full",
            Error::RoomNotFound => "room_not_found",
            Error::NotInRoom => "not_in_room",
            Error::NotHost => "not_host",
            Error::AlreadyJoined => "join_error",
            Error::GamepadExhausted | Error::SpectatorInput => "gamepad_error",
            Error::UnknownType(_) => "unknown_type",
            Error::Parse(_) => "parse_error",
            Error::PeerGone(_) => "peer_not_found",
            Error::Input(_) => "input_error",
            Error::Encoder(_) => "encoder_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<webrtc::Error> for Error {
    fn from(e: webrtc::Error) -> Self {
        Error::WebRtc(e.to_string())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

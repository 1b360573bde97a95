//! Shared message envelope for the IRIS realtime WS transport.
//!
//! Every frame on the wire is a JSON text object carrying a `type`
//! discriminator. Server pushes decode into [`Inbound`]; dashboard commands
//! encode from [`Outbound`]. Fields only the dashboard views care about stay
//! as raw `serde_json` values so new server fields never break decoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error returned by [`decode_inbound`] and [`encode_outbound`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("failed to parse JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame parsed, but the top-level value is not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// The object has no string `type` discriminator.
    #[error("frame has no string `type` field")]
    MissingType,
    /// A known `type` carried fields of the wrong shape.
    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    /// A command could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

// =============================================================================
// INBOUND
// =============================================================================

/// Presence change for one identity, broadcast to admins when a user or
/// agent socket connects or drops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Logical username, e.g. `"user3"` or `"agent1"`.
    pub username: String,
    /// `"online"` means connected; any other value means gone.
    pub status: String,
    /// Server-side role label (`"user"`, `"agent"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Raw database id of the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl StatusUpdate {
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}

/// Game-state push. Only `shift` matters to routing; everything else
/// (temperature, power, treasury, modes) is kept opaque in `fields`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<i64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Snapshot sent once to admin sockets right after the handshake.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InitSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Presence snapshot. Accepted as an array of usernames or as an object
    /// keyed by username; see [`InitSnapshot::online_usernames`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InitSnapshot {
    /// Usernames listed as online by the snapshot, or `None` when the
    /// snapshot carries no presence information at all.
    ///
    /// Object form counts a key as online when its value is `true`, the
    /// string `"online"`, or a non-empty array (a list of live sockets).
    #[must_use]
    pub fn online_usernames(&self) -> Option<Vec<String>> {
        match self.online.as_ref()? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect(),
            ),
            Value::Object(map) => Some(
                map.iter()
                    .filter(|(_, v)| match v {
                        Value::Bool(b) => *b,
                        Value::String(s) => s == "online",
                        Value::Array(a) => !a.is_empty(),
                        _ => false,
                    })
                    .map(|(k, _)| k.clone())
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// A decoded server push.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Server-initiated heartbeat probe.
    Ping,
    /// Heartbeat acknowledgment.
    Pong,
    StatusUpdate(StatusUpdate),
    GameStateUpdate(GameStateUpdate),
    Init(InitSnapshot),
    /// Any `type` the core does not interpret (chat messages, task refresh
    /// triggers, translation updates). Forwarded to views untouched.
    Other {
        kind: String,
        data: Map<String, Value>,
    },
}

impl Inbound {
    /// The wire `type` string this message was decoded from.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::StatusUpdate(_) => "status_update",
            Self::GameStateUpdate(_) => "gamestate_update",
            Self::Init(_) => "init",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Whether this frame belongs to the heartbeat exchange and must never
    /// reach the application.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }
}

/// Decode one JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for invalid JSON, [`CodecError::NotAnObject`]
/// / [`CodecError::MissingType`] for a malformed envelope, and
/// [`CodecError::Payload`] when a known type carries mistyped fields.
pub fn decode_inbound(text: &str) -> Result<Inbound, CodecError> {
    let Value::Object(mut data) = serde_json::from_str::<Value>(text)? else {
        return Err(CodecError::NotAnObject);
    };
    let kind = match data.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(CodecError::MissingType),
    };

    match kind.as_str() {
        "ping" => Ok(Inbound::Ping),
        "pong" => Ok(Inbound::Pong),
        "status_update" => payload(&kind, data).map(Inbound::StatusUpdate),
        "gamestate_update" => payload(&kind, data).map(Inbound::GameStateUpdate),
        "init" => payload(&kind, data).map(Inbound::Init),
        _ => Ok(Inbound::Other { kind, data }),
    }
}

fn payload<T>(kind: &str, data: Map<String, Value>) -> Result<T, CodecError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(Value::Object(data)).map_err(|source| CodecError::Payload {
        kind: kind.to_owned(),
        source,
    })
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Reactor power mode accepted by `chernobyl_mode_command`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    Normal,
    LowPower,
    Overclock,
}

/// Message visibility mode accepted by `hyper_vis_command`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperVisMode {
    Normal,
    Blackbox,
    Forensic,
}

/// A command sent from the dashboard to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Ping,
    Pong,
    /// Rotate agents one slot forward.
    ShiftCommand,
    /// Jump to an absolute shift (server reduces it mod N).
    SetShiftCommand { value: i64 },
    TemperatureCommand { value: f64 },
    ChernobylModeCommand { mode: PowerMode },
    HyperVisCommand { mode: HyperVisMode },
    ResetGame,
    AdminBroadcast { content: String },
    AdminViewSync { view: String },
    TestModeToggle { enabled: bool },
}

/// Encode a command as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails. No frame should be
/// sent in that case.
pub fn encode_outbound(msg: &Outbound) -> Result<String, CodecError> {
    encode_json(msg)
}

fn encode_json<T: Serialize + ?Sized>(msg: &T) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::Encode)
}

/// Error returned when parsing a mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode `{0}`")]
pub struct UnknownMode(pub String);

impl FromStr for PowerMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "low_power" => Ok(Self::LowPower),
            "overclock" => Ok(Self::Overclock),
            other => Err(UnknownMode(other.to_owned())),
        }
    }
}

impl FromStr for HyperVisMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "blackbox" => Ok(Self::Blackbox),
            "forensic" => Ok(Self::Forensic),
            other => Err(UnknownMode(other.to_owned())),
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::LowPower => "low_power",
            Self::Overclock => "overclock",
        })
    }
}

impl fmt::Display for HyperVisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Blackbox => "blackbox",
            Self::Forensic => "forensic",
        })
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

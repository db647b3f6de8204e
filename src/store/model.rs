//! On-disk record shapes for the Store's logical buckets.

use serde::{Deserialize, Serialize};

/// A dense, process-assigned user identity. Its decimal form doubles as
/// the username exposed to the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// The big-endian byte encoding used as the Users-bucket key and as
    /// the prefix for every bucket keyed by this user's children.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user. Owns Networks, Channels, OpenDMs, Settings, and a
/// message log partitioned by (network, channel).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// This user's identity.
    pub id: UserId,
    /// Opaque per-user UI preferences (highlight words, timestamp format).
    pub settings: serde_json::Value,
}

/// One configured IRC network, keyed by `(UserId, host)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Network {
    /// Hostname to dial.
    pub host: String,
    /// Port to dial.
    pub port: u16,
    /// Whether to negotiate TLS.
    pub tls: bool,
    /// Server password, if configured.
    pub password: Option<String>,
    /// Nickname to register with.
    pub nick: String,
    /// `USER` username field.
    pub username: String,
    /// `USER` realname field.
    pub realname: String,
    /// Friendly display name, distinct from the IRC nick.
    pub display_name: Option<String>,
    /// Channels rejoined automatically on every successful registration.
    pub autojoin: Vec<String>,
}

/// A joined channel, keyed by `(UserId, host, name)` with the name
/// case-folded per the network's casemapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name, including its sigil.
    pub name: String,
    /// Last known topic. Authoritative value lives in ChannelStore while
    /// connected; this is the cached value for display before reconnect.
    pub topic: Option<String>,
}

/// A marker that a direct-message tab should be shown for `nick`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenDm {
    /// The remote nick this DM tab is with.
    pub nick: String,
}

/// The event kind a stored Message represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// `PRIVMSG`.
    Privmsg,
    /// CTCP ACTION (`/me`).
    Action,
    /// `NOTICE`.
    Notice,
    /// `JOIN`.
    Join,
    /// `PART`.
    Part,
    /// `QUIT`.
    Quit,
    /// `NICK`.
    Nick,
    /// `MODE`.
    Mode,
    /// `TOPIC`.
    Topic,
}

/// A single append-only log entry under `(network, to)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Lexicographically sortable unique ID; ordering equals arrival order
    /// within a `(network, to)` log.
    pub id: MessageId,
    /// Network host this message arrived on or was sent to.
    pub network: String,
    /// Channel name or nick this message belongs to.
    pub to: String,
    /// Sender nick, or the network host for server-originated messages.
    pub from: String,
    /// Message body.
    pub content: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    /// What kind of event this entry represents.
    pub kind: MessageKind,
}

impl StoredMessage {
    /// A zero-valued placeholder used by `MessagesByID` when a requested ID
    /// is missing, preserving positional order without raising an error.
    pub fn missing(id: MessageId) -> StoredMessage {
        StoredMessage {
            id,
            network: String::new(),
            to: String::new(),
            from: String::new(),
            content: String::new(),
            timestamp: 0,
            kind: MessageKind::Privmsg,
        }
    }
}

/// A sortable message identifier: `(timestamp_millis, per-millis sequence)`
/// encoded so that byte-lexicographic order equals arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64, pub u32);

impl MessageId {
    /// Encodes this ID as a sortable 12-byte key.
    pub fn to_sortable_bytes(self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.0.to_be_bytes());
        buf[8..].copy_from_slice(&self.1.to_be_bytes());
        buf
    }

    /// Decodes a sortable key produced by [`MessageId::to_sortable_bytes`].
    pub fn from_sortable_bytes(bytes: &[u8]) -> Option<MessageId> {
        if bytes.len() != 12 {
            return None;
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[..8]);
        let mut seq = [0u8; 4];
        seq.copy_from_slice(&bytes[8..]);
        Some(MessageId(u64::from_be_bytes(ts), u32::from_be_bytes(seq)))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// An authenticated viewer session, binding a session key to a `UserId`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// The owning user.
    pub user_id: UserId,
    /// Unix epoch milliseconds the session expires at.
    pub expires_at: i64,
}

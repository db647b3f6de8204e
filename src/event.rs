//! Typed viewer events: the websocket envelope's `data` payload.
//!
//! The source system carries these as a universal value cast at the
//! websocket boundary; here each event kind gets its own struct so payload
//! shape is checked at compile time instead of at serialization time.

use serde::Serialize;

/// One event broadcast to every viewer attached to a user's State.
///
/// Serializes as `{"type": "...", "data": {...}}`, matching the envelope
/// described for the (out-of-scope) websocket layer.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ViewerEvent {
    /// A channel message.
    Message(MessageEvent),
    /// A direct message.
    Pm(PmEvent),
    /// A user joined a channel.
    Join(JoinEvent),
    /// A user parted a channel.
    Part(PartEvent),
    /// A user quit the network.
    Quit(QuitEvent),
    /// A user changed nickname.
    Nick(NickEvent),
    /// Registration was rejected due to the requested nick.
    NickFail(NickFailEvent),
    /// A channel or user mode change.
    Mode(ModeEvent),
    /// A channel topic changed.
    Topic(TopicEvent),
    /// A channel's user list, assembled from NAMES.
    Users(UsersEvent),
    /// The network MOTD, assembled from 372/375/376.
    Motd(MotdEvent),
    /// A WHOIS reply, assembled from 311/312/313/317/318/319.
    Whois(WhoisEvent),
    /// A LIST refresh result.
    Channels(ChannelsEvent),
    /// A search result.
    Search(SearchEvent),
    /// A server-originated error numeric or a local failure.
    Error(ErrorEvent),
}

/// Fields common to every event: the network host the event originated on.
pub trait HasServer {
    /// The network host this event concerns.
    fn server(&self) -> &str;
}

macro_rules! server_field_event {
    ($(#[$doc:meta])* $name:ident { $($(#[$fdoc:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Serialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            /// The network host this event originated on.
            pub server: String,
            $($(#[$fdoc])* pub $field: $ty,)*
        }

        impl HasServer for $name {
            fn server(&self) -> &str {
                &self.server
            }
        }
    };
}

server_field_event!(
    /// A channel message, per §8 scenario 4.
    MessageEvent { from: String, to: String, content: String }
);

server_field_event!(
    /// A direct message. `to` is empty for an inbound PM addressed to us.
    PmEvent { from: String, to: String, content: String }
);

server_field_event!(
    /// §8 scenario: a user joined a channel.
    JoinEvent { user: String, channel: String }
);

server_field_event!(
    /// §8 scenario 2: a user parted, optionally with a reason.
    PartEvent { user: String, channel: String, reason: Option<String> }
);

server_field_event!(
    /// A user quit the network, with an optional reason.
    QuitEvent { user: String, reason: Option<String> }
);

server_field_event!(
    /// §8 scenario 1: a nick change.
    NickEvent { old: String, new: String }
);

server_field_event!(
    /// §8 scenario 7: registration was rejected due to the nick.
    NickFailEvent { nick: String, reason: String }
);

server_field_event!(
    /// §8 scenario 3: a mode change split into added/removed letters.
    ModeEvent { channel: String, user: String, add: String, remove: String }
);

server_field_event!(
    /// A channel's topic changed, or was cleared (`RPL_NOTOPIC`).
    TopicEvent { channel: String, topic: Option<String> }
);

server_field_event!(
    /// §8 scenario 6: a channel's user list, assembled from NAMES.
    UsersEvent { channel: String, users: Vec<String> }
);

server_field_event!(
    /// The assembled MOTD.
    MotdEvent { title: Option<String>, lines: Vec<String> }
);

server_field_event!(
    /// §8 scenario 5: a WHOIS reply.
    WhoisEvent {
        nick: String,
        username: String,
        host: String,
        realname: String,
        server_name: String,
        channels: Vec<String>,
    }
);

server_field_event!(
    /// A `LIST` refresh result.
    ChannelsEvent { channels: Vec<ChannelListing> }
);

/// One entry of a `ChannelsEvent`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelListing {
    /// Channel name, including its `#`/`&` sigil.
    pub name: String,
    /// Reported member count.
    pub user_count: u32,
    /// Channel topic, if any.
    pub topic: String,
}

server_field_event!(
    /// A full-text search result.
    SearchEvent { query: String, message_ids: Vec<String> }
);

server_field_event!(
    /// A server-originated error numeric, or a local Client/Handler failure.
    ErrorEvent { code: Option<u16>, message: String }
);

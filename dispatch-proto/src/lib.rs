//! The IRC wire protocol: messages, CTCP, ISUPPORT, and modes.

#![warn(missing_docs)]

pub mod chan;
pub mod command;
pub mod ctcp;
pub mod error;
pub mod irc;
pub mod isupport;
pub mod line;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod response;

pub use self::chan::{CaseMapping, ChannelExt};
pub use self::command::Command;
pub use self::ctcp::Ctcp;
pub use self::error::{MessageParseError, ProtocolError};
pub use self::irc::IrcCodec;
pub use self::isupport::{FeatureMap, PrefixMap};
pub use self::message::Message;
pub use self::mode::{ChannelMode, Mode, UserMode};
pub use self::prefix::Prefix;
pub use self::response::Response;

//! Errors produced while parsing or encoding the IRC wire protocol.

use std::io;
use thiserror::Error;

/// A `Result` type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// An error at the wire-protocol layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An underlying I/O error, typically surfaced by the line codec.
    #[error("an io error occurred")]
    Io(#[from] io::Error),

    /// A line could not be parsed into a [`Message`](crate::Message).
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw line that failed to parse.
        string: String,
        /// The reason parsing failed.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors that occur while parsing a single IRC line into a [`Message`](crate::Message).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageParseError {
    /// The line was empty once whitespace-only content was discarded.
    #[error("empty message")]
    EmptyMessage,

    /// The command token was missing.
    #[error("invalid command")]
    InvalidCommand,

    /// The line exceeded the 512-byte IRC line length limit.
    #[error("message exceeds the maximum line length")]
    MaxLengthExceeded,

    /// A mode string attached to a MODE command was malformed.
    #[error("invalid mode string: {string}")]
    InvalidModeString {
        /// The offending mode string.
        string: String,
        /// The detailed parse failure.
        #[source]
        cause: ModeParseError,
    },
}

/// Errors that occur while parsing a mode string (e.g. `+o-v`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModeParseError {
    /// A character appeared where `+` or `-` was expected.
    #[error("invalid mode modifier: {modifier}")]
    InvalidModeModifier {
        /// The invalid modifier character.
        modifier: char,
    },

    /// A mode run had no leading `+`/`-`.
    #[error("missing mode modifier")]
    MissingModeModifier,
}

/// An error decoding a CTCP envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CtcpError {
    /// The envelope had an empty command, which is always invalid.
    #[error("empty CTCP command")]
    EmptyCommand,

    /// The content was not delimited by `0x01` bytes at all.
    #[error("not a CTCP envelope")]
    NotCtcp,
}

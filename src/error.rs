//! The top-level error taxonomy: how failures at each layer are classified
//! and what a caller is expected to do about them.
//!
//! Protocol and Transport errors are recovered from locally (log and drop
//! the frame, or close and reconnect); Storage errors propagate to the
//! caller; Config errors are fatal only at startup. See the Store and
//! Client modules for where each variant is actually raised.

use std::io;
use thiserror::Error;

/// A `Result` type threaded through the core.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure at any layer of the session fabric.
#[derive(Debug, Error)]
pub enum Error {
    /// A malformed frame arrived from the server. The connection stays up;
    /// the frame is logged and dropped.
    #[error("protocol error: {0}")]
    Protocol(#[from] dispatch_proto::ProtocolError),

    /// The underlying socket failed. The owning Client closes and schedules
    /// a reconnect.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// TLS handshake or certificate validation failed.
    #[error("tls error: {0}")]
    Tls(String),

    /// A Store transaction failed to commit. In-memory state is left
    /// untouched; the caller decides whether to retry.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A value could not be deserialized out of the Store.
    #[error("storage decode error: {0}")]
    StorageDecode(#[from] serde_json::Error),

    /// A lookup found nothing. Callers generally treat this as benign.
    #[error("not found")]
    NotFound,

    /// A session cookie or token did not match a live session.
    #[error("session invalid")]
    Auth,

    /// The on-disk config file or data directory was invalid. Fatal only
    /// at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error should end the owning Client's connection and
    /// trigger a reconnect, as opposed to being absorbed in place.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Tls(_))
    }
}

impl From<io::Error> for Error {
    fn from(cause: io::Error) -> Error {
        Error::Transport(cause)
    }
}

//! Dispatch is the session fabric behind a hosted, multi-user IRC bouncer:
//! it maintains persistent per-user IRC network connections, multiplexes
//! inbound protocol events onto attached viewers, persists chat history for
//! replay and search, and reconnects every configured network on restart.
//!
//! This crate covers the core session fabric only. HTTP routing, websocket
//! framing, and the full-text search engine's internals are external
//! collaborators that consume the types and traits defined here.

#![warn(missing_docs)]

pub mod channel_index_mgr;
pub mod channel_store;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod index;
pub mod state;
pub mod store;

pub use self::channel_index_mgr::{ChannelIndex, ChannelIndexMgr};
pub use self::channel_store::{ChannelState, ChannelStore};
pub use self::client::{Client, ClientEvent, ClientHandle, ClientState};
pub use self::config::{Config, NetworkConfig};
pub use self::error::{Error, Result};
pub use self::event::ViewerEvent;
pub use self::handler::{Effect, HandlerContext};
pub use self::index::{Indexer, MemIndexer};
pub use self::state::{State, ViewerCommand, ViewerId};
pub use self::store::model::UserId;
pub use self::store::Store;

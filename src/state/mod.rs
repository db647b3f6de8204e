//! Per-user session state: the live Clients, the Store/Index/ChannelStore/
//! ChannelIndexMgr references, and the set of connected websocket viewers.
//!
//! Dispatches every Client's inbound messages through Handler on a single
//! logical task per user, so a user's event ordering is deterministic even
//! though each of their Clients reads its own socket concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dispatch_proto::{Command as IrcCommand, FeatureMap};
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channel_index_mgr::{ChannelIndex, ChannelIndexMgr};
use crate::channel_store::ChannelStore;
use crate::client::{Client, ClientEvent, ClientHandle};
use crate::config::NetworkConfig;
use crate::error::Result;
use crate::event::ViewerEvent;
use crate::handler::{self, Effect, HandlerContext};
use crate::index::Indexer;
use crate::store::model::{Channel, MessageId, StoredMessage, UserId};
use crate::store::Store;

/// Default number of messages replayed to a viewer attaching to a tab.
const DEFAULT_REPLAY: usize = 50;
/// Bound on a single viewer's outbound event buffer; once full, further
/// events for that viewer are dropped rather than blocking the broadcaster.
const VIEWER_BUFFER: usize = 256;

/// Opaque handle identifying an attached viewer, returned by `AttachViewer`
/// and required by `DetachViewer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewerId(u64);

/// A command accepted from an attached viewer.
#[derive(Debug)]
pub enum ViewerCommand {
    /// Join a channel on a network.
    Join { network: String, channel: String },
    /// Part a channel, optionally with a reason.
    Part { network: String, channel: String, reason: Option<String> },
    /// Send a message to a channel or nick.
    Say { network: String, target: String, content: String },
    /// Request a nick change.
    Nick { network: String, nick: String },
    /// Set a channel's topic.
    Topic { network: String, channel: String, topic: String },
    /// Start (or restart) a network's Client.
    Connect { network: String },
    /// Gracefully close a network's Client.
    Disconnect { network: String },
    /// Request (or reuse a cached) channel listing.
    List { network: String },
    /// Full-text search within one (network, channel) log.
    Search { network: String, channel: String, query: String },
    /// Request a WHOIS lookup.
    Whois { network: String, nick: String },
}

struct Viewer {
    id: ViewerId,
    sender: mpsc::Sender<ViewerEvent>,
}

/// Per-user aggregation of live Clients, durable storage references, and
/// attached viewers.
pub struct State {
    user_id: UserId,
    store: Arc<Store>,
    index: Arc<dyn Indexer>,
    channel_store: Arc<ChannelStore>,
    channel_index_mgr: ChannelIndexMgr,
    clients: Mutex<HashMap<String, (ClientHandle, NetworkConfig, JoinHandle<()>)>>,
    features: Mutex<HashMap<String, FeatureMap>>,
    viewers: Mutex<Vec<Viewer>>,
    next_viewer_id: AtomicU64,
    events_tx: mpsc::UnboundedSender<(String, ClientEvent)>,
}

impl State {
    /// Builds a State for `user_id`, starts a Client for every configured
    /// Network, and spawns the per-user dispatch task.
    pub fn new(
        user_id: UserId,
        store: Arc<Store>,
        index: Arc<dyn Indexer>,
        networks: Vec<NetworkConfig>,
    ) -> Arc<State> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let state = Arc::new(State {
            user_id,
            store,
            index,
            channel_store: Arc::new(ChannelStore::new()),
            channel_index_mgr: ChannelIndexMgr::new(),
            clients: Mutex::new(HashMap::new()),
            features: Mutex::new(HashMap::new()),
            viewers: Mutex::new(Vec::new()),
            next_viewer_id: AtomicU64::new(1),
            events_tx,
        });

        for network in networks {
            state.start_client(network);
        }

        tokio::spawn(State::dispatch_loop(state.clone(), events_rx));

        state
    }

    fn start_client(&self, network: NetworkConfig) {
        let host = network.host.clone();
        let (handle, mut events, join_handle) = Client::spawn(network.clone());

        let events_tx = self.events_tx.clone();
        let forward_host = host.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if events_tx.send((forward_host.clone(), event)).is_err() {
                    break;
                }
            }
        });

        self.clients.lock().insert(host, (handle, network, join_handle));
    }

    async fn dispatch_loop(state: Arc<State>, mut events: mpsc::UnboundedReceiver<(String, ClientEvent)>) {
        while let Some((host, event)) = events.recv().await {
            state.apply_client_event(&host, event);
        }
    }

    fn apply_client_event(&self, host: &str, event: ClientEvent) {
        match event {
            ClientEvent::Inbound(message) => {
                let Some((self_nick, ctcp_version, ctcp_source, realname)) =
                    self.clients.lock().get(host).map(|(_, network, _)| {
                        (
                            network.nick.clone(),
                            network.ctcp_version.clone(),
                            network.ctcp_source.clone(),
                            network.realname.clone(),
                        )
                    })
                else {
                    return;
                };
                let features = self.features.lock().get(host).cloned().unwrap_or_default();
                let ctx = HandlerContext {
                    network: host,
                    self_nick: &self_nick,
                    features: &features,
                    ctcp_version: &ctcp_version,
                    ctcp_source: &ctcp_source,
                    realname: &realname,
                };
                let effects = handler::handle(&message, &ctx);
                for effect in effects {
                    self.apply_effect(host, effect);
                }
            }
            ClientEvent::NamesReady { channel, names } => {
                self.channel_store.set_users(host, &channel, names.clone());
                self.broadcast(handler::users_event(host, &channel, names));
            }
            ClientEvent::WhoisReady(acc) => {
                self.broadcast(handler::whois_event(host, &acc));
            }
            ClientEvent::MotdReady { title, lines } => {
                self.broadcast(handler::motd_event(host, title, lines));
            }
            ClientEvent::ListReady(rows) => {
                self.channel_index_mgr.set(host, ChannelIndex::finish(rows.clone()));
                self.broadcast(handler::channels_event(host, rows));
            }
            ClientEvent::Connected => {
                debug!(host, "client registered");
            }
            ClientEvent::Disconnected { will_reconnect } => {
                warn!(host, will_reconnect, "client disconnected");
            }
            ClientEvent::FeaturesUpdated(features) => {
                self.features.lock().insert(host.to_owned(), features);
            }
        }
    }

    fn apply_effect(&self, host: &str, effect: Effect) {
        match effect {
            Effect::Emit(event) => self.broadcast(event),
            Effect::ChannelStoreJoin { channel, user } => self.channel_store.join(host, &channel, &user),
            Effect::ChannelStorePart { channel, user } => self.channel_store.part(host, &channel, &user),
            Effect::ChannelStoreQuit { user } => self.channel_store.quit(host, &user),
            Effect::ChannelStoreRename { old, new } => self.channel_store.rename(host, &old, &new),
            Effect::ChannelStoreTopic { channel, topic } => self.channel_store.set_topic(host, &channel, topic),
            Effect::ChannelStoreUsers { channel, users } => self.channel_store.set_users(host, &channel, users),
            Effect::StoreJoinChannel { channel } => {
                if let Err(cause) = self.store.put_channel(self.user_id, host, &Channel { name: channel, topic: None }) {
                    warn!(%cause, "failed to persist joined channel");
                }
            }
            Effect::StorePartChannel { channel } => {
                if let Err(cause) = self.store.delete_channel(self.user_id, host, &channel) {
                    warn!(%cause, "failed to remove parted channel");
                }
            }
            Effect::AppendMessage { to, from, content, kind } => {
                match self.store.append_message(self.user_id, host, &to, &from, &content, kind) {
                    Ok(stored) => self.index.index(self.user_id, &stored),
                    Err(cause) => warn!(%cause, "failed to append message"),
                }
            }
            Effect::Reply(command) => {
                if let Some((handle, _, _)) = self.clients.lock().get(host) {
                    let _ = handle.send(command);
                }
            }
        }
    }

    /// Attaches a new viewer, replaying the last `DEFAULT_REPLAY` messages
    /// of its selected tab and the tab's current user list.
    pub fn attach_viewer(&self, network: &str, channel: &str) -> (ViewerId, mpsc::Receiver<ViewerEvent>) {
        let (sender, receiver) = mpsc::channel(VIEWER_BUFFER);
        let id = ViewerId(self.next_viewer_id.fetch_add(1, Ordering::Relaxed));

        let (history, _has_more) = self
            .store
            .messages(self.user_id, network, channel, DEFAULT_REPLAY, None)
            .unwrap_or_default();
        for message in history {
            let _ = sender.try_send(to_replay_event(network, &message));
        }

        if let Some(live) = self.channel_store.get(network, channel) {
            let users: Vec<String> = live.users.into_iter().collect();
            let _ = sender.try_send(handler::users_event(network, channel, users));
        }

        self.viewers.lock().push(Viewer { id, sender });
        (id, receiver)
    }

    /// Detaches a viewer; only that viewer's buffer is affected.
    pub fn detach_viewer(&self, id: ViewerId) {
        self.viewers.lock().retain(|v| v.id != id);
    }

    /// Sends `event` to every attached viewer. A viewer whose buffer is
    /// full has the event dropped for it; the producer never blocks.
    fn broadcast(&self, event: ViewerEvent) {
        let mut viewers = self.viewers.lock();
        viewers.retain(|viewer| match viewer.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("dropping event for slow viewer");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Applies a command from an attached viewer.
    pub fn command(&self, cmd: ViewerCommand) -> Result<()> {
        match cmd {
            ViewerCommand::Join { network, channel } => self.send(&network, IrcCommand::JOIN(channel, None)),
            ViewerCommand::Part { network, channel, reason } => {
                self.send(&network, IrcCommand::PART(channel, reason))
            }
            ViewerCommand::Say { network, target, content } => {
                self.send(&network, IrcCommand::PRIVMSG(target, content))
            }
            ViewerCommand::Nick { network, nick } => self.send(&network, IrcCommand::NICK(nick)),
            ViewerCommand::Topic { network, channel, topic } => {
                self.send(&network, IrcCommand::TOPIC(channel, Some(topic)))
            }
            ViewerCommand::Connect { network } => {
                if let Some(config) = self.clients.lock().get(&network).map(|(_, c, _)| c.clone()) {
                    self.start_client(config);
                }
                Ok(())
            }
            ViewerCommand::Disconnect { network } => {
                if let Some((handle, _, _)) = self.clients.lock().get(&network) {
                    handle.quit();
                }
                Ok(())
            }
            ViewerCommand::List { network } => {
                let (listing, should_refresh) = self.channel_index_mgr.get(&network);
                if should_refresh {
                    self.send(&network, IrcCommand::LIST(None))?;
                }
                self.broadcast(handler::channels_event(&network, listing.list(0, usize::MAX)));
                Ok(())
            }
            ViewerCommand::Search { network, channel, query } => {
                let ids = self.index.search(self.user_id, &network, &channel, &query);
                self.broadcast(ViewerEvent::Search(crate::event::SearchEvent {
                    server: network,
                    query,
                    message_ids: ids.into_iter().map(|id| id.to_string()).collect(),
                }));
                Ok(())
            }
            ViewerCommand::Whois { network, nick } => self.send(&network, IrcCommand::WHOIS(None, nick)),
        }
    }

    fn send(&self, network: &str, command: IrcCommand) -> Result<()> {
        self.clients.lock().get(network).map(|(h, _, _)| h.send(command)).unwrap_or(Ok(()))
    }

    /// Closes every Client in parallel and waits for all of them to reach
    /// `Disconnected` before returning, per the Cancellation/State shutdown
    /// contract: a State is not considered torn down until every one of its
    /// Clients has actually stopped, not merely been asked to.
    pub async fn shutdown(&self) {
        let join_handles: Vec<JoinHandle<()>> = {
            let mut clients = self.clients.lock();
            clients
                .drain()
                .map(|(_, (handle, _, join_handle))| {
                    handle.quit();
                    join_handle
                })
                .collect()
        };
        for result in join_all(join_handles).await {
            if let Err(cause) = result {
                warn!(%cause, "client task panicked during shutdown");
            }
        }
    }

    /// Delegates to the Store's paginated message read.
    pub fn last_messages(
        &self,
        network: &str,
        channel: &str,
        n: usize,
        from_id: Option<MessageId>,
    ) -> Result<(Vec<StoredMessage>, bool)> {
        self.store.messages(self.user_id, network, channel, n, from_id)
    }
}

fn to_replay_event(network: &str, message: &StoredMessage) -> ViewerEvent {
    use crate::event::{MessageEvent, PmEvent};
    use crate::store::model::MessageKind;

    match message.kind {
        MessageKind::Privmsg | MessageKind::Action | MessageKind::Notice => {
            if message.to == message.from {
                ViewerEvent::Pm(PmEvent {
                    server: network.to_owned(),
                    from: message.from.clone(),
                    to: String::new(),
                    content: message.content.clone(),
                })
            } else {
                ViewerEvent::Message(MessageEvent {
                    server: network.to_owned(),
                    from: message.from.clone(),
                    to: message.to.clone(),
                    content: message.content.clone(),
                })
            }
        }
        _ => ViewerEvent::Message(MessageEvent {
            server: network.to_owned(),
            from: message.from.clone(),
            to: message.to.clone(),
            content: message.content.clone(),
        }),
    }
}

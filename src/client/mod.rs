//! The per-(user, network) connection state machine: dial, register,
//! keepalive, reconnect with backoff, send queue, and the multi-line
//! reply buffers described in the component design.

pub mod conn;
pub mod mock;
pub mod replies;

use std::time::Duration;

use dispatch_proto::{Command, FeatureMap, IrcCodec, Message, Response};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::client::conn::Connection;
use crate::client::replies::{ListBuffer, ListingRow, MotdBuffer, NamesBuffer, WhoisAccumulator, WhoisBuffer};
use crate::config::NetworkConfig;
use crate::error::{Error, Result};

/// How long inbound silence is tolerated before sending a keepalive `PING`.
const PING_IDLE: Duration = Duration::from_secs(120);
/// Grace period after a keepalive `PING` before the connection is
/// considered dead.
const PING_GRACE: Duration = Duration::from_secs(60);
/// How long a `Close` drains the send queue before dropping pending writes.
const CLOSE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// The Client's connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// No socket; either never connected or deliberately closed.
    Disconnected,
    /// TCP/TLS handshake in progress.
    Connecting,
    /// Socket is up; `PASS`/`NICK`/`USER` sent, awaiting `RPL_WELCOME`.
    Registering,
    /// Registration completed; normal traffic flows.
    Connected,
    /// `Quit()` was called; draining the send queue before disconnecting.
    Closing,
}

/// Exponential reconnect backoff, 1s -> 5min by default, with jitter.
/// Resets whenever a Client reaches `Connected`.
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Backoff {
        Backoff { initial, max, current: initial }
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Returns the delay to wait before the next attempt, jittered by
    /// +/-20%, and doubles the underlying delay for next time.
    fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);

        let jitter_frac = rand::thread_rng().gen_range(-0.2..=0.2);
        let millis = (base.as_millis() as f64) * (1.0 + jitter_frac);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// Events a Client emits to its owning State as it progresses.
#[derive(Debug)]
pub enum ClientEvent {
    /// Registration completed (`RPL_WELCOME` received).
    Connected,
    /// The connection dropped; `will_reconnect` is false only after `Quit()`.
    Disconnected { will_reconnect: bool },
    /// A fully parsed inbound message, for Handler to process.
    Inbound(Message),
    /// `RPL_ISUPPORT` accumulation changed.
    FeaturesUpdated(FeatureMap),
    /// NAMES assembly finished for a channel.
    NamesReady { channel: String, names: Vec<String> },
    /// WHOIS assembly finished for a nick.
    WhoisReady(WhoisAccumulator),
    /// MOTD assembly finished.
    MotdReady { title: Option<String>, lines: Vec<String> },
    /// LIST assembly finished.
    ListReady(Vec<ListingRow>),
}

/// A lightweight, cloneable reference to a running Client, used to queue
/// outbound commands and request a shutdown.
#[derive(Clone)]
pub struct ClientHandle {
    normal_tx: mpsc::UnboundedSender<Message>,
    priority_tx: mpsc::UnboundedSender<Message>,
    quit_tx: mpsc::UnboundedSender<()>,
}

impl ClientHandle {
    /// Queues a command for ordinary send-queue delivery.
    pub fn send(&self, command: Command) -> Result<()> {
        self.normal_tx
            .send(Message::new(command))
            .map_err(|_| Error::Transport(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client task gone")))
    }

    /// Queues a `PONG`, or any reply that must jump ahead of queued traffic.
    fn send_priority(&self, command: Command) -> Result<()> {
        self.priority_tx
            .send(Message::new(command))
            .map_err(|_| Error::Transport(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client task gone")))
    }

    /// Requests a graceful close: the send queue drains for up to 2s, then
    /// the socket is dropped and no reconnect is scheduled.
    pub fn quit(&self) {
        let _ = self.quit_tx.send(());
    }
}

/// Owns one (user, network) connection's socket, feature map, and
/// multi-line reply buffers.
pub struct Client {
    config: NetworkConfig,
    state: ClientState,
    nick: String,
    features: FeatureMap,
    names: NamesBuffer,
    whois: WhoisBuffer,
    motd: MotdBuffer,
    list: ListBuffer,
    backoff: Backoff,
    last_activity: Instant,
}

impl Client {
    /// Builds a Client for `config`, not yet connected.
    pub fn new(config: NetworkConfig) -> Client {
        let nick = config.nick.clone();
        let backoff = Backoff::new(config.reconnect.initial_delay, config.reconnect.max_delay);
        Client {
            config,
            state: ClientState::Disconnected,
            nick,
            features: FeatureMap::new(),
            names: NamesBuffer::new(),
            whois: WhoisBuffer::new(),
            motd: MotdBuffer::new(),
            list: ListBuffer::new(),
            backoff,
            last_activity: Instant::now(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Current nickname, which may have drifted from `config.nick` via
    /// a successful `NICK` change.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// The accumulated ISUPPORT feature map.
    pub fn features(&self) -> &FeatureMap {
        &self.features
    }

    /// Spawns the Client's run loop on the current Tokio runtime, wiring a
    /// dial function so tests can substitute a mock transport. The returned
    /// `JoinHandle` completes once the Client's task has fully exited, which
    /// only happens after it has emitted a final `Disconnected` event — await
    /// it to know the Client has actually reached `Disconnected`.
    pub fn spawn(
        config: NetworkConfig,
    ) -> (ClientHandle, mpsc::UnboundedReceiver<ClientEvent>, tokio::task::JoinHandle<()>) {
        Self::spawn_with_dialer(config, |config| Box::pin(Connection::dial(config)))
    }

    /// As [`Client::spawn`], but with an injectable dialer for tests.
    pub fn spawn_with_dialer<F>(
        config: NetworkConfig,
        dialer: F,
    ) -> (ClientHandle, mpsc::UnboundedReceiver<ClientEvent>, tokio::task::JoinHandle<()>)
    where
        F: Fn(&NetworkConfig) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Connection>> + Send>>
            + Send
            + 'static,
    {
        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let (priority_tx, priority_rx) = mpsc::unbounded_channel();
        let (quit_tx, quit_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handle = ClientHandle { normal_tx, priority_tx, quit_tx };
        let client = Client::new(config);

        let join_handle = tokio::spawn(client.run_forever(dialer, normal_rx, priority_rx, quit_rx, event_tx));

        (handle, event_rx, join_handle)
    }

    async fn run_forever<F>(
        mut self,
        dialer: F,
        mut normal_rx: mpsc::UnboundedReceiver<Message>,
        mut priority_rx: mpsc::UnboundedReceiver<Message>,
        mut quit_rx: mpsc::UnboundedReceiver<()>,
        event_tx: mpsc::UnboundedSender<ClientEvent>,
    ) where
        F: Fn(&NetworkConfig) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Connection>> + Send>>
            + Send
            + 'static,
    {
        let span = tracing::info_span!("client", host = %self.config.host);
        let _enter = span.enter();

        loop {
            if quit_rx.try_recv().is_ok() {
                self.state = ClientState::Closing;
                let _ = event_tx.send(ClientEvent::Disconnected { will_reconnect: false });
                return;
            }

            self.state = ClientState::Connecting;
            let connect = dialer(&self.config).await;
            let conn = match connect {
                Ok(conn) => conn,
                Err(cause) => {
                    warn!(error = %cause, "connect failed, backing off");
                    let delay = self.backoff.next_delay();
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = quit_rx.recv() => {
                            let _ = event_tx.send(ClientEvent::Disconnected { will_reconnect: false });
                            return;
                        }
                    }
                }
            };

            let outcome = self
                .run_connection(conn, &mut normal_rx, &mut priority_rx, &mut quit_rx, &event_tx)
                .await;

            self.state = ClientState::Disconnected;
            self.features = FeatureMap::new();

            match outcome {
                ConnectionOutcome::QuitRequested => {
                    let _ = event_tx.send(ClientEvent::Disconnected { will_reconnect: false });
                    return;
                }
                ConnectionOutcome::Dropped => {
                    let _ = event_tx.send(ClientEvent::Disconnected { will_reconnect: true });
                    let delay = self.backoff.next_delay();
                    debug!(?delay, "reconnecting after delay");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn run_connection(
        &mut self,
        conn: Connection,
        normal_rx: &mut mpsc::UnboundedReceiver<Message>,
        priority_rx: &mut mpsc::UnboundedReceiver<Message>,
        quit_rx: &mut mpsc::UnboundedReceiver<()>,
        event_tx: &mpsc::UnboundedSender<ClientEvent>,
    ) -> ConnectionOutcome {
        let mut framed = Framed::new(conn, IrcCodec::new());

        self.state = ClientState::Registering;
        if let Some(password) = &self.config.password {
            if framed.send(Message::new(Command::PASS(password.clone()))).await.is_err() {
                return ConnectionOutcome::Dropped;
            }
        }
        if framed.send(Message::new(Command::NICK(self.nick.clone()))).await.is_err() {
            return ConnectionOutcome::Dropped;
        }
        let user_cmd = Command::USER(self.config.username.clone(), "0".into(), self.config.realname.clone());
        if framed.send(Message::new(user_cmd)).await.is_err() {
            return ConnectionOutcome::Dropped;
        }

        self.last_activity = Instant::now();

        loop {
            let idle_for = Instant::now().saturating_duration_since(self.last_activity);
            let timeout = if idle_for >= PING_IDLE {
                PING_GRACE
            } else {
                PING_IDLE - idle_for
            };

            tokio::select! {
                biased;

                _ = quit_rx.recv() => {
                    let _ = tokio::time::timeout(CLOSE_DRAIN_GRACE, drain_queue(&mut framed, priority_rx, normal_rx)).await;
                    return ConnectionOutcome::QuitRequested;
                }

                maybe_line = framed.next() => {
                    match maybe_line {
                        Some(Ok(message)) => {
                            self.last_activity = Instant::now();
                            if self.handle_inbound(&message, &mut framed, event_tx).await.is_err() {
                                return ConnectionOutcome::Dropped;
                            }
                        }
                        Some(Err(cause)) => {
                            debug!(error = %cause, "dropping malformed frame");
                        }
                        None => return ConnectionOutcome::Dropped,
                    }
                }

                Some(msg) = priority_rx.recv() => {
                    if framed.send(msg).await.is_err() {
                        return ConnectionOutcome::Dropped;
                    }
                }

                Some(msg) = normal_rx.recv(), if self.state == ClientState::Connected => {
                    if framed.send(msg).await.is_err() {
                        return ConnectionOutcome::Dropped;
                    }
                }

                _ = tokio::time::sleep(timeout) => {
                    let idle_for = Instant::now().saturating_duration_since(self.last_activity);
                    if idle_for >= PING_IDLE + PING_GRACE {
                        warn!("no traffic within keepalive grace period, dropping connection");
                        return ConnectionOutcome::Dropped;
                    }
                    if idle_for >= PING_IDLE {
                        let _ = framed.send(Message::new(Command::PING(self.config.host.clone(), None))).await;
                    }
                }
            }
        }
    }

    async fn handle_inbound(
        &mut self,
        message: &Message,
        framed: &mut Framed<Connection, IrcCodec>,
        event_tx: &mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<()> {
        trace!(?message, "inbound");

        match &message.command {
            Command::PING(token, _) => {
                framed.send(Message::new(Command::PONG(token.clone(), None))).await?;
                return Ok(());
            }
            Command::NICK(new_nick) => {
                if message.source_nickname() == Some(self.nick.as_str()) {
                    self.nick = new_nick.clone();
                }
            }
            Command::Response(Response::RPL_WELCOME, _, _) => {
                self.state = ClientState::Connected;
                self.backoff.reset();
                let _ = event_tx.send(ClientEvent::Connected);
                for channel in &self.config.autojoin {
                    framed.send(Message::new(Command::JOIN(channel.clone(), None))).await?;
                }
            }
            Command::Response(Response::RPL_ISUPPORT, args, _) => {
                let tokens: Vec<&str> = args.iter().skip(1).map(String::as_str).collect();
                self.features.ingest(&tokens);
                let _ = event_tx.send(ClientEvent::FeaturesUpdated(self.features.clone()));
            }
            Command::Response(Response::RPL_NAMREPLY, args, suffix) => {
                if let (Some(channel), Some(names)) = (args.get(2).or_else(|| args.get(1)), suffix) {
                    self.names.push(channel, names);
                }
            }
            Command::Response(Response::RPL_ENDOFNAMES, args, _) => {
                if let Some(channel) = args.get(1) {
                    let names = self.names.finish(channel);
                    let _ = event_tx.send(ClientEvent::NamesReady { channel: channel.clone(), names });
                }
            }
            Command::Response(Response::RPL_WHOISUSER, args, suffix) => {
                if let Some(nick) = args.get(1) {
                    let acc = self.whois.entry(nick);
                    if let Some(username) = args.get(2) {
                        acc.username = username.clone();
                    }
                    if let Some(host) = args.get(3) {
                        acc.host = host.clone();
                    }
                    if let Some(realname) = suffix {
                        acc.realname = realname.clone();
                    }
                }
            }
            Command::Response(Response::RPL_WHOISSERVER, args, _) => {
                if let (Some(nick), Some(server_name)) = (args.get(1), args.get(2)) {
                    self.whois.entry(nick).server_name = server_name.clone();
                }
            }
            Command::Response(Response::RPL_WHOISCHANNELS, args, suffix) => {
                if let (Some(nick), Some(channels)) = (args.get(1), suffix) {
                    self.whois.entry(nick).channels = channels.split_whitespace().map(str::to_owned).collect();
                }
            }
            Command::Response(Response::RPL_ENDOFWHOIS, args, _) => {
                if let Some(nick) = args.get(1) {
                    if let Some(acc) = self.whois.finish(nick) {
                        let _ = event_tx.send(ClientEvent::WhoisReady(acc));
                    }
                }
            }
            Command::Response(Response::RPL_MOTDSTART, _, suffix) => {
                if let Some(title) = suffix {
                    self.motd.start(title);
                }
            }
            Command::Response(Response::RPL_MOTD, _, suffix) => {
                if let Some(line) = suffix {
                    self.motd.push(line);
                }
            }
            Command::Response(Response::RPL_ENDOFMOTD, _, _) => {
                let (title, lines) = self.motd.finish();
                let _ = event_tx.send(ClientEvent::MotdReady { title, lines });
            }
            Command::Response(Response::RPL_LIST, args, suffix) => {
                if let (Some(name), Some(count)) = (args.get(1), args.get(2)) {
                    let user_count = count.parse().unwrap_or(0);
                    self.list.push(name, user_count, suffix.as_deref().unwrap_or(""));
                }
            }
            Command::Response(Response::RPL_LISTEND, _, _) => {
                let _ = event_tx.send(ClientEvent::ListReady(self.list.finish()));
            }
            _ => {}
        }

        let _ = event_tx.send(ClientEvent::Inbound(message.clone()));
        Ok(())
    }
}

enum ConnectionOutcome {
    QuitRequested,
    Dropped,
}

async fn drain_queue(
    framed: &mut Framed<Connection, IrcCodec>,
    priority_rx: &mut mpsc::UnboundedReceiver<Message>,
    normal_rx: &mut mpsc::UnboundedReceiver<Message>,
) {
    while let Ok(msg) = priority_rx.try_recv() {
        let _ = framed.send(msg).await;
    }
    while let Ok(msg) = normal_rx.try_recv() {
        let _ = framed.send(msg).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockStream;
    use std::sync::{Arc, Mutex};

    fn test_network() -> NetworkConfig {
        NetworkConfig {
            host: "irc.example.com".into(),
            port: 6667,
            tls: false,
            password: None,
            nick: "ferris".into(),
            username: "ferris".into(),
            realname: "Ferris the Crab".into(),
            display_name: None,
            autojoin: vec!["#rust".into()],
            reconnect: Default::default(),
            ctcp_version: "test".into(),
            ctcp_source: "https://example.test/dispatch".into(),
        }
    }

    #[tokio::test]
    async fn registers_then_autojoins_on_welcome() {
        let config = test_network();
        let script = b":irc.example.com 001 ferris :Welcome\r\n".to_vec();
        let mock = Arc::new(Mutex::new(Some(MockStream::new(&script))));

        let (_handle, mut events, _join) = Client::spawn_with_dialer(config, {
            let mock = mock.clone();
            move |_cfg| {
                let stream = mock.lock().unwrap().take().expect("dialed only once in this test");
                Box::pin(async move { Ok(Connection::Mock(stream)) })
            }
        });

        let mut saw_connected = false;
        for _ in 0..8 {
            match tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
                Ok(Some(ClientEvent::Connected)) => {
                    saw_connected = true;
                    break;
                }
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
        assert!(saw_connected, "expected a Connected event after RPL_WELCOME");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8));
        let d1 = backoff.next_delay();
        assert!(d1.as_millis() >= 800 && d1.as_millis() <= 1200);
        backoff.current = Duration::from_secs(8);
        let d2 = backoff.next_delay();
        assert!(d2.as_millis() <= (8_000_f64 * 1.2) as u128);
    }
}

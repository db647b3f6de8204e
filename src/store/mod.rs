//! The durable key-value Store: an append-only hierarchical layout over
//! `sled`, with the bucket structure and pagination rules from the
//! component design.

pub mod model;

use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};

use sled::transaction::{TransactionError, Transactional};
use sled::{Batch, Db, Tree};

use crate::error::{Error, Result};
use model::{Channel, MessageId, MessageKind, Network, OpenDm, Session, StoredMessage, User, UserId};

/// A durable, embedded key-value store holding every user's Networks,
/// Channels, OpenDMs, Messages, and Sessions.
///
/// Buckets that are enumerated by `UserID` prefix (Networks, Channels,
/// OpenDms) live in their own `sled::Tree`, keyed so a `seek + walk-while-
/// prefix` scan over that tree enumerates exactly one user's rows. Message
/// logs get one tree per `(user, network, to)` so that pagination never
/// scans another conversation's rows.
pub struct Store {
    db: Db,
    users: Tree,
    networks: Tree,
    channels: Tree,
    open_dms: Tree,
    sessions: Tree,
}

impl Store {
    /// Opens (or creates) the Store at `path`. A corrupted file fails
    /// startup rather than silently recovering.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Store> {
        let db = sled::open(path)?;
        Ok(Store {
            users: db.open_tree("users")?,
            networks: db.open_tree("networks")?,
            channels: db.open_tree("channels")?,
            open_dms: db.open_tree("open_dms")?,
            sessions: db.open_tree("sessions")?,
            db,
        })
    }

    fn messages_tree(&self, user: UserId, network: &str, to: &str) -> Result<Tree> {
        Ok(self.db.open_tree(format!("messages:{}:{}:{}", user.0, network, to))?)
    }

    // -- Users -----------------------------------------------------------

    /// Inserts or replaces a user row.
    pub fn put_user(&self, user: &User) -> Result<()> {
        self.users.insert(user.id.to_be_bytes(), serde_json::to_vec(user)?)?;
        Ok(())
    }

    /// Looks up a user by ID. `Ok(None)` is the benign not-found case.
    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        match self.users.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Deletes a user's row and every Network, Channel, and OpenDM owned by
    /// that user, as one atomic transaction across all four trees: either
    /// every row is gone or none of them are, never a partial cascade.
    /// Message logs are intentionally left in place; see the design notes
    /// on message retention.
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        let key = id.to_be_bytes();
        let networks_batch = prefix_removal_batch(&self.networks, &key)?;
        let channels_batch = prefix_removal_batch(&self.channels, &key)?;
        let open_dms_batch = prefix_removal_batch(&self.open_dms, &key)?;

        (&self.users, &self.networks, &self.channels, &self.open_dms)
            .transaction(move |(users, networks, channels, open_dms)| {
                users.remove(key.as_slice())?;
                networks.apply_batch(&networks_batch)?;
                channels.apply_batch(&channels_batch)?;
                open_dms.apply_batch(&open_dms_batch)?;
                Ok(())
            })
            .map_err(|cause: TransactionError| match cause {
                TransactionError::Abort(()) => Error::Storage(sled::Error::Unsupported(
                    "delete_user transaction aborted".to_owned(),
                )),
                TransactionError::Storage(cause) => Error::Storage(cause),
            })?;
        Ok(())
    }

    // -- Networks ----------------------------------------------------------

    /// Inserts or replaces a Network row for `user`.
    pub fn put_network(&self, user: UserId, network: &Network) -> Result<()> {
        let key = network_key(user, &network.host);
        self.networks.insert(key, serde_json::to_vec(network)?)?;
        Ok(())
    }

    /// Lists every Network owned by `user`.
    pub fn list_networks(&self, user: UserId) -> Result<Vec<Network>> {
        scan_prefix(&self.networks, &user.to_be_bytes())
    }

    // -- Channels ------------------------------------------------------

    /// Inserts or replaces a Channel row, marking that the user has joined
    /// `name` on `host`.
    pub fn put_channel(&self, user: UserId, host: &str, channel: &Channel) -> Result<()> {
        let key = channel_key(user, host, &channel.name);
        self.channels.insert(key, serde_json::to_vec(channel)?)?;
        Ok(())
    }

    /// Removes the Channel row when the user PARTs for good.
    pub fn delete_channel(&self, user: UserId, host: &str, name: &str) -> Result<()> {
        self.channels.remove(channel_key(user, host, name))?;
        Ok(())
    }

    /// Lists every Channel the user has joined on `host`.
    pub fn list_channels(&self, user: UserId, host: &str) -> Result<Vec<Channel>> {
        let mut prefix = user.to_be_bytes().to_vec();
        prefix.extend(host.as_bytes());
        prefix.push(0);
        scan_prefix(&self.channels, &prefix)
    }

    // -- OpenDMs -------------------------------------------------------

    /// Marks that a direct-message tab with `nick` should be shown.
    pub fn put_open_dm(&self, user: UserId, host: &str, open_dm: &OpenDm) -> Result<()> {
        let key = channel_key(user, host, &open_dm.nick);
        self.open_dms.insert(key, serde_json::to_vec(open_dm)?)?;
        Ok(())
    }

    /// Removes an OpenDM marker.
    pub fn delete_open_dm(&self, user: UserId, host: &str, nick: &str) -> Result<()> {
        self.open_dms.remove(channel_key(user, host, nick))?;
        Ok(())
    }

    // -- Messages --------------------------------------------------------

    /// Appends a new message to the `(user, network, to)` log, assigning
    /// it a sortable ID whose ordering equals arrival order.
    pub fn append_message(
        &self,
        user: UserId,
        network: &str,
        to: &str,
        from: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<StoredMessage> {
        let tree = self.messages_tree(user, network, to)?;
        let id = self.next_message_id()?;
        let message = StoredMessage {
            id,
            network: network.to_owned(),
            to: to.to_owned(),
            from: from.to_owned(),
            content: content.to_owned(),
            timestamp: now_millis(),
            kind,
        };
        tree.insert(id.to_sortable_bytes(), serde_json::to_vec(&message)?)?;
        Ok(message)
    }

    fn next_message_id(&self) -> Result<MessageId> {
        let seq = self.db.generate_id()? as u32;
        Ok(MessageId(now_millis() as u64, seq))
    }

    /// Returns up to `count` messages ordered oldest-to-newest, ending
    /// strictly before `from_id` (or at the tail when `from_id` is `None`).
    /// `hasMore` is true iff an older message exists before the window.
    pub fn messages(
        &self,
        user: UserId,
        network: &str,
        to: &str,
        count: usize,
        from_id: Option<MessageId>,
    ) -> Result<(Vec<StoredMessage>, bool)> {
        let tree = self.messages_tree(user, network, to)?;

        let upper = match from_id {
            Some(id) => Bound::Excluded(id.to_sortable_bytes().to_vec()),
            None => Bound::Unbounded,
        };

        let mut collected = Vec::with_capacity(count);
        for item in tree.range((Bound::Unbounded, upper)).rev() {
            if collected.len() >= count {
                break;
            }
            let (_, value) = item?;
            collected.push(serde_json::from_slice::<StoredMessage>(&value)?);
        }

        let has_more = match collected.last() {
            Some(oldest) => tree.range(..oldest.id.to_sortable_bytes().to_vec()).next_back().is_some(),
            None => false,
        };

        collected.reverse();
        Ok((collected, has_more))
    }

    /// Batch point lookup preserving request order; missing IDs yield a
    /// zero-valued message rather than an error.
    pub fn messages_by_id(
        &self,
        user: UserId,
        network: &str,
        to: &str,
        ids: &[MessageId],
    ) -> Result<Vec<StoredMessage>> {
        let tree = self.messages_tree(user, network, to)?;
        ids.iter()
            .map(|id| match tree.get(id.to_sortable_bytes())? {
                Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
                None => Ok(StoredMessage::missing(*id)),
            })
            .collect()
    }

    // -- Sessions --------------------------------------------------------

    /// Binds a session key to a user, for the out-of-scope HTTP collaborator.
    pub fn put_session(&self, key: &str, session: &Session) -> Result<()> {
        self.sessions.insert(key.as_bytes(), serde_json::to_vec(session)?)?;
        Ok(())
    }

    /// Resolves a session key. `Error::Auth` is the caller-facing failure
    /// for a missing or expired session; this method only reports absence.
    pub fn get_session(&self, key: &str) -> Result<Option<Session>> {
        match self.sessions.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

fn network_key(user: UserId, host: &str) -> Vec<u8> {
    let mut key = user.to_be_bytes().to_vec();
    key.extend(host.as_bytes());
    key
}

fn channel_key(user: UserId, host: &str, name: &str) -> Vec<u8> {
    let mut key = user.to_be_bytes().to_vec();
    key.extend(host.as_bytes());
    key.push(0);
    key.extend(name.as_bytes());
    key
}

fn scan_prefix<T: serde::de::DeserializeOwned>(tree: &Tree, prefix: &[u8]) -> Result<Vec<T>> {
    tree.scan_prefix(prefix)
        .map(|item| {
            let (_, value) = item.map_err(Error::from)?;
            serde_json::from_slice(&value).map_err(Error::from)
        })
        .collect()
}

/// Builds a `Batch` removing every key under `prefix` in `tree`, without
/// applying it, so the caller can fold it into a larger transaction.
fn prefix_removal_batch(tree: &Tree, prefix: &[u8]) -> Result<Batch> {
    let mut batch = Batch::default();
    for item in tree.scan_prefix(prefix) {
        let (key, _) = item?;
        batch.remove(key);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn user_round_trips() {
        let (store, _dir) = open_temp();
        let user = User { id: UserId(1), settings: serde_json::json!({}) };
        store.put_user(&user).unwrap();
        assert_eq!(store.get_user(UserId(1)).unwrap().unwrap().id, UserId(1));
        assert!(store.get_user(UserId(2)).unwrap().is_none());
    }

    #[test]
    fn deleting_a_user_cascades_to_networks_and_channels() {
        let (store, _dir) = open_temp();
        let user = UserId(7);
        store
            .put_network(user, &Network {
                host: "irc.example.com".into(),
                port: 6667,
                tls: false,
                password: None,
                nick: "ferris".into(),
                username: "ferris".into(),
                realname: "Ferris".into(),
                display_name: None,
                autojoin: vec![],
            })
            .unwrap();
        store
            .put_channel(user, "irc.example.com", &Channel { name: "#rust".into(), topic: None })
            .unwrap();

        store.delete_user(user).unwrap();

        assert!(store.list_networks(user).unwrap().is_empty());
        assert!(store.list_channels(user, "irc.example.com").unwrap().is_empty());
    }

    #[test]
    fn pagination_ends_strictly_before_from_id_and_reports_has_more() {
        let (store, _dir) = open_temp();
        let user = UserId(1);
        let mut ids = Vec::new();
        for i in 0..5 {
            let msg = store
                .append_message(user, "net", "#rust", "ferris", &format!("msg{}", i), MessageKind::Privmsg)
                .unwrap();
            ids.push(msg.id);
        }

        let (page, has_more) = store.messages(user, "net", "#rust", 2, None).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "msg3");
        assert_eq!(page[1].content, "msg4");
        assert!(has_more);

        let (page2, has_more2) = store.messages(user, "net", "#rust", 2, Some(page[0].id)).unwrap();
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[0].content, "msg1");
        assert_eq!(page2[1].content, "msg2");
        assert!(has_more2);

        let (page3, has_more3) = store.messages(user, "net", "#rust", 10, Some(page2[0].id)).unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].content, "msg0");
        assert!(!has_more3);
    }

    #[test]
    fn empty_log_has_no_more_pages() {
        let (store, _dir) = open_temp();
        let (page, has_more) = store.messages(UserId(1), "net", "#empty", 10, None).unwrap();
        assert!(page.is_empty());
        assert!(!has_more);
    }

    #[test]
    fn messages_by_id_fills_missing_with_zero_value() {
        let (store, _dir) = open_temp();
        let user = UserId(1);
        let msg = store.append_message(user, "net", "#rust", "ferris", "hi", MessageKind::Privmsg).unwrap();
        let bogus = MessageId(0, 0);

        let results = store.messages_by_id(user, "net", "#rust", &[msg.id, bogus]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "hi");
        assert_eq!(results[1].content, "");
    }
}

//! The live, in-memory `(network, channel) -> {topic, userList}` map.
//! Never persisted: ground truth is reconstructed from server replies on
//! every reconnect. Mutated by the Handler on JOIN/PART/QUIT/NICK/MODE/
//! TOPIC/NAMES; reads are concurrent, writes serialized per key.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

/// Status-prefix characters a server may prepend to a nick in `RPL_NAMREPLY`
/// output (op, halfop, voice, …). Stripped on insertion so membership keys
/// always match the bare nick that JOIN/PART/QUIT/NICK carry.
const PREFIX_CHARS: &[char] = &['~', '&', '@', '%', '+'];

fn strip_member_prefix(nick: &str) -> &str {
    nick.strip_prefix(|c: char| PREFIX_CHARS.contains(&c)).unwrap_or(nick)
}

/// One channel's live topic and membership.
#[derive(Clone, Debug, Default)]
pub struct ChannelState {
    /// Current topic, `None` if unset or cleared by `RPL_NOTOPIC`.
    pub topic: Option<String>,
    /// Member nicks, prefix characters stripped.
    pub users: HashSet<String>,
}

/// The live channel map shared by every viewer of a network.
#[derive(Default)]
pub struct ChannelStore {
    channels: Mutex<HashMap<(String, String), ChannelState>>,
}

impl ChannelStore {
    /// Creates an empty store.
    pub fn new() -> ChannelStore {
        ChannelStore::default()
    }

    /// Returns a snapshot of `(network, channel)`'s state, if known.
    pub fn get(&self, network: &str, channel: &str) -> Option<ChannelState> {
        self.channels.lock().get(&(network.to_owned(), channel.to_owned())).cloned()
    }

    /// Idempotently adds `user` to `channel`'s member set (set semantics:
    /// applying the same JOIN twice leaves the set unchanged).
    pub fn join(&self, network: &str, channel: &str, user: &str) {
        let key = (network.to_owned(), channel.to_owned());
        self.channels.lock().entry(key).or_default().users.insert(user.to_owned());
    }

    /// Removes `user` from `channel`'s member set.
    pub fn part(&self, network: &str, channel: &str, user: &str) {
        let key = (network.to_owned(), channel.to_owned());
        let mut channels = self.channels.lock();
        if let Some(state) = channels.get_mut(&key) {
            state.users.remove(user);
        }
    }

    /// Removes `user` from every channel on `network` (a QUIT).
    pub fn quit(&self, network: &str, user: &str) {
        let mut channels = self.channels.lock();
        for (key, state) in channels.iter_mut() {
            if key.0 == network {
                state.users.remove(user);
            }
        }
    }

    /// Renames `old` to `new` in every channel on `network`'s member set.
    pub fn rename(&self, network: &str, old: &str, new: &str) {
        let mut channels = self.channels.lock();
        for (key, state) in channels.iter_mut() {
            if key.0 == network && state.users.remove(old) {
                state.users.insert(new.to_owned());
            }
        }
    }

    /// Sets `channel`'s topic, or clears it when `topic` is `None`.
    pub fn set_topic(&self, network: &str, channel: &str, topic: Option<String>) {
        let key = (network.to_owned(), channel.to_owned());
        self.channels.lock().entry(key).or_default().topic = topic;
    }

    /// Replaces `channel`'s member set wholesale, as NAMES assembly
    /// produces authoritative membership rather than incremental deltas.
    /// Status-prefix characters (`@`, `+`, …) are stripped from each entry
    /// so the stored keys match the bare nicks PART/QUIT/NICK operate on.
    pub fn set_users(&self, network: &str, channel: &str, users: impl IntoIterator<Item = String>) {
        let key = (network.to_owned(), channel.to_owned());
        let users = users.into_iter().map(|user| strip_member_prefix(&user).to_owned()).collect();
        self.channels.lock().entry(key).or_default().users = users;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joining_twice_is_idempotent() {
        let store = ChannelStore::new();
        store.join("net", "#rust", "ferris");
        store.join("net", "#rust", "ferris");
        assert_eq!(store.get("net", "#rust").unwrap().users.len(), 1);
    }

    #[test]
    fn quit_removes_from_every_channel_on_that_network() {
        let store = ChannelStore::new();
        store.join("net", "#rust", "ferris");
        store.join("net", "#haskell", "ferris");
        store.join("other", "#rust", "ferris");

        store.quit("net", "ferris");

        assert!(!store.get("net", "#rust").unwrap().users.contains("ferris"));
        assert!(!store.get("net", "#haskell").unwrap().users.contains("ferris"));
        assert!(store.get("other", "#rust").unwrap().users.contains("ferris"));
    }

    #[test]
    fn nick_change_renames_membership() {
        let store = ChannelStore::new();
        store.join("net", "#rust", "old");
        store.rename("net", "old", "new");
        let state = store.get("net", "#rust").unwrap();
        assert!(!state.users.contains("old"));
        assert!(state.users.contains("new"));
    }

    #[test]
    fn names_prefix_is_stripped_so_part_converges() {
        let store = ChannelStore::new();
        store.set_users("net", "#rust", vec!["@alice".to_owned(), "+bob".to_owned(), "carol".to_owned()]);
        assert!(store.get("net", "#rust").unwrap().users.contains("alice"));

        store.part("net", "#rust", "alice");
        store.quit("net", "bob");

        let state = store.get("net", "#rust").unwrap();
        assert!(!state.users.contains("alice"));
        assert!(!state.users.contains("bob"));
        assert!(state.users.contains("carol"));
    }

    #[test]
    fn notopic_clears_topic() {
        let store = ChannelStore::new();
        store.set_topic("net", "#rust", Some("hello".into()));
        store.set_topic("net", "#rust", None);
        assert_eq!(store.get("net", "#rust").unwrap().topic, None);
    }
}

//! The `Indexer` contract: full-text search over stored messages, scoped
//! by `(user, network, channel)`. The search engine's internals are out of
//! scope; this module only defines the boundary and a minimal in-memory
//! reference implementation used by tests and small deployments.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::store::model::{MessageId, StoredMessage, UserId};

/// Ingests messages and answers relevance-ordered search queries. Write-only
/// from the core's perspective except for `search`; rebuilding from the
/// Store is a maintenance operation outside the core.
pub trait Indexer: Send + Sync {
    /// Indexes one message for later search.
    fn index(&self, user: UserId, message: &StoredMessage);

    /// Returns matching message IDs ordered by relevance, most relevant
    /// first.
    fn search(&self, user: UserId, network: &str, channel: &str, query: &str) -> Vec<MessageId>;
}

#[derive(Default)]
struct Bucket {
    entries: Vec<(MessageId, String)>,
}

/// A simple in-process reference `Indexer`: substring match over stored
/// content, ranked by match count then recency. Adequate for tests and
/// single-node deployments that don't need a real inverted index.
#[derive(Default)]
pub struct MemIndexer {
    buckets: RwLock<HashMap<(UserId, String, String), Bucket>>,
}

impl MemIndexer {
    /// Creates an empty index.
    pub fn new() -> MemIndexer {
        MemIndexer::default()
    }

    fn key(user: UserId, network: &str, channel: &str) -> (UserId, String, String) {
        (user, network.to_owned(), channel.to_owned())
    }
}

impl Indexer for MemIndexer {
    fn index(&self, user: UserId, message: &StoredMessage) {
        let key = Self::key(user, &message.network, &message.to);
        let mut buckets = self.buckets.write();
        buckets
            .entry(key)
            .or_default()
            .entries
            .push((message.id, message.content.to_ascii_lowercase()));
    }

    fn search(&self, user: UserId, network: &str, channel: &str, query: &str) -> Vec<MessageId> {
        let key = Self::key(user, network, channel);
        let query = query.to_ascii_lowercase();
        let buckets = self.buckets.read();

        let Some(bucket) = buckets.get(&key) else {
            return Vec::new();
        };

        let mut scored: Vec<(usize, MessageId)> = bucket
            .entries
            .iter()
            .filter_map(|(id, content)| {
                let hits = content.matches(&query).count();
                (hits > 0).then_some((hits, *id))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        scored.into_iter().map(|(_, id)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::MessageKind;

    fn msg(id: u64, content: &str) -> StoredMessage {
        StoredMessage {
            id: MessageId(id, 0),
            network: "net".into(),
            to: "#rust".into(),
            from: "ferris".into(),
            content: content.into(),
            timestamp: 0,
            kind: MessageKind::Privmsg,
        }
    }

    #[test]
    fn search_is_scoped_by_user_network_and_channel() {
        let index = MemIndexer::new();
        index.index(UserId(1), &msg(1, "hello rust world"));
        index.index(UserId(2), &msg(2, "hello rust world"));

        assert_eq!(index.search(UserId(1), "net", "#rust", "rust").len(), 1);
        assert!(index.search(UserId(1), "net", "#other", "rust").is_empty());
    }

    #[test]
    fn results_rank_by_match_count() {
        let index = MemIndexer::new();
        index.index(UserId(1), &msg(1, "rust rust rust"));
        index.index(UserId(1), &msg(2, "rust"));

        let results = index.search(UserId(1), "net", "#rust", "rust");
        assert_eq!(results, vec![MessageId(1, 0), MessageId(2, 0)]);
    }
}

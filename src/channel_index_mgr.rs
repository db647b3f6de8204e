//! Per-network `LIST` cache with single-flight refresh and a 24h TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::client::replies::ListingRow;

/// How long a cached listing is trusted before `Get` asks for a refresh.
const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);
/// How long an in-flight refresh is given before the "updating" flag is
/// cleared unconditionally, so a failed `LIST` never locks out retries.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// One finished, searchable channel listing for a network.
#[derive(Clone, Default)]
pub struct ChannelIndex {
    by_rank: Vec<ListingRow>,
    prefixes: HashMap<String, Vec<usize>>,
}

impl ChannelIndex {
    /// Builds and finishes an index from raw `LIST` rows: sorts by
    /// descending user count (ties broken by ascending case-folded name)
    /// and builds the prefix-search buckets.
    pub fn finish(mut rows: Vec<ListingRow>) -> ChannelIndex {
        rows.sort_by(|a, b| {
            b.user_count
                .cmp(&a.user_count)
                .then_with(|| casefold(&a.name).cmp(&casefold(&b.name)))
        });

        let mut prefixes: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            let name = casefold(&row.name);
            let name = name.strip_prefix('#').unwrap_or(&name);
            for end in 1..=name.len() {
                if name.is_char_boundary(end) {
                    prefixes.entry(name[..end].to_owned()).or_default().push(i);
                }
            }
        }

        ChannelIndex { by_rank: rows, prefixes }
    }

    /// Whether this index has any entries.
    pub fn is_empty(&self) -> bool {
        self.by_rank.is_empty()
    }

    /// A paginated window `[start, start+n)` over the full ranked listing.
    pub fn list(&self, start: usize, n: usize) -> Vec<ListingRow> {
        self.by_rank.iter().skip(start).take(n).cloned().collect()
    }

    /// A paginated window `[start, start+n)` over channels whose
    /// case-folded, `#`-stripped name starts with `prefix`.
    pub fn search_prefix(&self, prefix: &str, start: usize, n: usize) -> Vec<ListingRow> {
        let prefix = casefold(prefix);
        let prefix = prefix.strip_prefix('#').unwrap_or(&prefix);
        match self.prefixes.get(prefix) {
            Some(indices) => indices
                .iter()
                .skip(start)
                .take(n)
                .map(|&i| self.by_rank[i].clone())
                .collect(),
            None => Vec::new(),
        }
    }
}

fn casefold(name: &str) -> String {
    name.to_ascii_lowercase()
}

struct Entry {
    index: ChannelIndex,
    fetched_at: Instant,
    updating: bool,
}

/// Tracks one `ChannelIndex` per network, refreshed at most once per TTL
/// window and never concurrently.
///
/// Held behind an `Arc` by its owner so the 5-minute timeout guard can be
/// spawned as an independent task without borrowing `self`.
#[derive(Clone)]
pub struct ChannelIndexMgr {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    guards: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl Default for ChannelIndexMgr {
    fn default() -> Self {
        ChannelIndexMgr::new()
    }
}

impl ChannelIndexMgr {
    /// Creates an empty manager.
    pub fn new() -> ChannelIndexMgr {
        ChannelIndexMgr {
            entries: Arc::new(Mutex::new(HashMap::new())),
            guards: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the current index for `network` (empty if none yet) and
    /// whether the caller should kick off a `LIST` refresh. Exactly one
    /// concurrent caller is told to refresh per stale window; if told to
    /// refresh, a 5-minute timeout guard is armed that clears the
    /// "updating" flag if `set` never arrives.
    pub fn get(&self, network: &str) -> (ChannelIndex, bool) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(network.to_owned()).or_insert_with(|| Entry {
            index: ChannelIndex::default(),
            fetched_at: Instant::now() - STALE_AFTER - Duration::from_secs(1),
            updating: false,
        });

        let stale = entry.fetched_at.elapsed() >= STALE_AFTER;
        let should_refresh = !entry.updating && stale;

        if should_refresh {
            entry.updating = true;
        }

        let index = entry.index.clone();
        drop(entries);

        if should_refresh {
            self.arm_timeout_guard(network);
        }

        (index, should_refresh)
    }

    fn arm_timeout_guard(&self, network: &str) {
        let network = network.to_owned();
        let entries = self.entries.clone();
        let task_network = network.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(REFRESH_TIMEOUT).await;
            let mut entries = entries.lock();
            if let Some(entry) = entries.get_mut(&task_network) {
                entry.updating = false;
            }
        });

        let mut guards = self.guards.lock();
        if let Some(previous) = guards.insert(network, handle) {
            previous.abort();
        }
    }

    /// Installs a freshly finished index, iff non-empty, and clears the
    /// "updating" flag so the next stale window can refresh again.
    pub fn set(&self, network: &str, index: ChannelIndex) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(network.to_owned()).or_insert_with(|| Entry {
            index: ChannelIndex::default(),
            fetched_at: Instant::now(),
            updating: false,
        });

        if !index.is_empty() {
            entry.index = index;
            entry.fetched_at = Instant::now();
        }
        entry.updating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::replies::ListingRow;

    fn row(name: &str, count: u32) -> ListingRow {
        ListingRow { name: name.into(), user_count: count, topic: String::new() }
    }

    #[test]
    fn finish_sorts_by_descending_count_then_casefolded_name() {
        let index = ChannelIndex::finish(vec![row("#Zen", 10), row("#apple", 10), row("#big", 50)]);
        let names: Vec<_> = index.list(0, 10).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["#big", "#apple", "#Zen"]);
    }

    #[test]
    fn prefix_search_matches_stripped_casefolded_name() {
        let index = ChannelIndex::finish(vec![row("#Rust", 5), row("#rusty", 1), row("#other", 1)]);
        let names: Vec<_> = index.search_prefix("rus", 0, 10).into_iter().map(|r| r.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"#Rust".to_owned()));
        assert!(names.contains(&"#rusty".to_owned()));
    }

    #[tokio::test]
    async fn first_get_on_a_network_requests_a_refresh() {
        let mgr = ChannelIndexMgr::new();
        let (_index, should_refresh) = mgr.get("net");
        assert!(should_refresh);
    }

    #[tokio::test]
    async fn concurrent_get_is_single_flight() {
        let mgr = ChannelIndexMgr::new();
        let (_, first) = mgr.get("net");
        let (_, second) = mgr.get("net");
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn set_clears_updating_and_installs_nonempty_index() {
        let mgr = ChannelIndexMgr::new();
        let (_, should_refresh) = mgr.get("net");
        assert!(should_refresh);

        mgr.set("net", ChannelIndex::finish(vec![row("#rust", 5)]));
        let (index, should_refresh_again) = mgr.get("net");
        assert!(!should_refresh_again);
        assert_eq!(index.list(0, 10).len(), 1);
    }

    #[tokio::test]
    async fn set_with_empty_index_does_not_overwrite_but_still_clears_updating() {
        let mgr = ChannelIndexMgr::new();
        mgr.set("net", ChannelIndex::finish(vec![row("#rust", 5)]));
        let (_, _) = mgr.get("net");

        mgr.set("net", ChannelIndex::default());
        let (index, _) = mgr.get("net");
        assert_eq!(index.list(0, 10).len(), 1);
    }
}

//! Multi-line reply assembly: several IRC commands spread one logical
//! reply across a run of numerics terminated by an "end" numeric. Each
//! buffer here is keyed by its own logical key so that interleaved
//! replies for different channels/targets never cross-contaminate.

use std::collections::HashMap;

/// Accumulates `RPL_NAMREPLY` (353) lines for one channel until
/// `RPL_ENDOFNAMES` (366) flushes it.
#[derive(Default)]
pub struct NamesBuffer {
    pending: HashMap<String, Vec<String>>,
}

impl NamesBuffer {
    /// Creates an empty buffer.
    pub fn new() -> NamesBuffer {
        NamesBuffer::default()
    }

    /// Appends one `RPL_NAMREPLY` line's whitespace-separated nicks (with
    /// their prefix characters preserved) to `channel`'s pending list.
    pub fn push(&mut self, channel: &str, names: &str) {
        let entry = self.pending.entry(channel.to_owned()).or_default();
        entry.extend(names.split_whitespace().map(str::to_owned));
    }

    /// Flushes and returns the accumulated nick list for `channel`,
    /// leaving nothing behind for the next NAMES round.
    pub fn finish(&mut self, channel: &str) -> Vec<String> {
        self.pending.remove(channel).unwrap_or_default()
    }
}

/// Accumulates one WHOIS reply (311/312/313/317/319) until
/// `RPL_ENDOFWHOIS` (318) flushes it.
#[derive(Default, Clone, Debug)]
pub struct WhoisAccumulator {
    /// Nickname under whois, set by 311.
    pub nick: String,
    /// `ident@host` fields, set by 311.
    pub username: String,
    /// `username@host`'s host field, set by 311.
    pub host: String,
    /// Realname, set by 311.
    pub realname: String,
    /// Server the target is connected to, set by 312.
    pub server_name: String,
    /// Channel list, split on whitespace, accumulated from 319.
    pub channels: Vec<String>,
}

/// Keyed by target nick so concurrent WHOIS requests for different
/// users don't interleave.
#[derive(Default)]
pub struct WhoisBuffer {
    pending: HashMap<String, WhoisAccumulator>,
}

impl WhoisBuffer {
    /// Creates an empty buffer.
    pub fn new() -> WhoisBuffer {
        WhoisBuffer::default()
    }

    /// Returns the in-progress accumulator for `nick`, creating one on
    /// first touch.
    pub fn entry(&mut self, nick: &str) -> &mut WhoisAccumulator {
        self.pending.entry(nick.to_owned()).or_insert_with(|| WhoisAccumulator {
            nick: nick.to_owned(),
            ..WhoisAccumulator::default()
        })
    }

    /// Flushes and returns the accumulated reply for `nick`.
    pub fn finish(&mut self, nick: &str) -> Option<WhoisAccumulator> {
        self.pending.remove(nick)
    }
}

/// Accumulates the MOTD: title from 375, lines from 372, flushed on 376.
#[derive(Default)]
pub struct MotdBuffer {
    title: Option<String>,
    lines: Vec<String>,
}

impl MotdBuffer {
    /// Creates an empty buffer.
    pub fn new() -> MotdBuffer {
        MotdBuffer::default()
    }

    /// Records the `RPL_MOTDSTART` (375) title line.
    pub fn start(&mut self, title: &str) {
        self.title = Some(title.to_owned());
        self.lines.clear();
    }

    /// Records one `RPL_MOTD` (372) body line.
    pub fn push(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }

    /// Flushes the title and accumulated lines on `RPL_ENDOFMOTD` (376).
    pub fn finish(&mut self) -> (Option<String>, Vec<String>) {
        (self.title.take(), std::mem::take(&mut self.lines))
    }
}

/// One row of an in-progress `LIST` reply, accumulated from 322.
#[derive(Clone, Debug)]
pub struct ListingRow {
    /// Channel name.
    pub name: String,
    /// Reported member count.
    pub user_count: u32,
    /// Channel topic.
    pub topic: String,
}

/// Accumulates `RPL_LIST` (322) rows for one network, flushed to the
/// `ChannelIndexMgr` on `RPL_LISTEND` (323).
#[derive(Default)]
pub struct ListBuffer {
    rows: Vec<ListingRow>,
}

impl ListBuffer {
    /// Creates an empty buffer.
    pub fn new() -> ListBuffer {
        ListBuffer::default()
    }

    /// Appends one `RPL_LIST` row.
    pub fn push(&mut self, name: &str, user_count: u32, topic: &str) {
        self.rows.push(ListingRow {
            name: name.to_owned(),
            user_count,
            topic: topic.to_owned(),
        });
    }

    /// Flushes the accumulated rows on `RPL_LISTEND`.
    pub fn finish(&mut self) -> Vec<ListingRow> {
        std::mem::take(&mut self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_buffer_assembles_across_multiple_353s() {
        let mut buf = NamesBuffer::new();
        buf.push("#rust", "a b c");
        buf.push("#rust", "d");
        assert_eq!(buf.finish("#rust"), vec!["a", "b", "c", "d"]);
        assert!(buf.finish("#rust").is_empty());
    }

    #[test]
    fn names_buffer_keeps_channels_independent() {
        let mut buf = NamesBuffer::new();
        buf.push("#a", "x");
        buf.push("#b", "y");
        assert_eq!(buf.finish("#a"), vec!["x"]);
        assert_eq!(buf.finish("#b"), vec!["y"]);
    }

    #[test]
    fn whois_buffer_accumulates_by_nick() {
        let mut buf = WhoisBuffer::new();
        buf.entry("ferris").username = "crab".into();
        buf.entry("ferris").channels.push("#rust".into());
        let result = buf.finish("ferris").unwrap();
        assert_eq!(result.username, "crab");
        assert_eq!(result.channels, vec!["#rust"]);
        assert!(buf.finish("ferris").is_none());
    }

    #[test]
    fn motd_buffer_flushes_title_and_lines() {
        let mut buf = MotdBuffer::new();
        buf.start("- irc.example.com Message of the Day -");
        buf.push("line one");
        buf.push("line two");
        let (title, lines) = buf.finish();
        assert_eq!(title.unwrap(), "- irc.example.com Message of the Day -");
        assert_eq!(lines, vec!["line one", "line two"]);
    }

    #[test]
    fn list_buffer_flushes_rows() {
        let mut buf = ListBuffer::new();
        buf.push("#rust", 500, "rust programming");
        buf.push("#haskell", 80, "pure functions");
        let rows = buf.finish();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "#rust");
        assert!(buf.finish().is_empty());
    }
}

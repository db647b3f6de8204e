//! The feature map built up from `RPL_ISUPPORT` (numeric 005) lines.
//!
//! A server advertises its capabilities and limits as a series of
//! `KEY` or `KEY=VALUE` tokens spread across one or more 005 lines sent
//! during registration. This module accumulates those tokens and exposes
//! the handful of them the rest of the crate cares about as typed
//! accessors, plus the raw map for anything else.
use std::collections::HashMap;

use crate::chan::CaseMapping;

/// The set of prefix characters a server grants to channel members,
/// paired with the mode letter each one corresponds to, in descending
/// order of privilege (e.g. `@` before `+`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrefixMap {
    /// Mode letters in descending privilege order, e.g. `"ov"`.
    pub modes: String,
    /// Prefix characters in the same order, e.g. `"@+"`.
    pub symbols: String,
}

impl PrefixMap {
    /// Parses a `PREFIX=(ov)@+` style token's value (the part after `=`).
    fn parse(value: &str) -> Option<PrefixMap> {
        let value = value.strip_prefix('(')?;
        let (modes, symbols) = value.split_once(')')?;
        Some(PrefixMap {
            modes: modes.to_owned(),
            symbols: symbols.to_owned(),
        })
    }

    /// Returns the prefix symbol for a mode letter, if granted.
    pub fn symbol_for(&self, mode: char) -> Option<char> {
        self.modes
            .find(mode)
            .and_then(|i| self.symbols.chars().nth(i))
    }

    /// Returns the highest-privilege prefix symbol present in `prefixes`,
    /// e.g. picking `@` out of `"@+"` if a user holds both op and voice.
    pub fn highest<'a>(&self, prefixes: &'a str) -> Option<char> {
        self.symbols.chars().find(|c| prefixes.contains(*c))
    }
}

impl Default for PrefixMap {
    fn default() -> Self {
        PrefixMap {
            modes: "ov".to_owned(),
            symbols: "@+".to_owned(),
        }
    }
}

/// An immutable snapshot of a network's advertised ISUPPORT tokens,
/// accumulated from every 005 line seen before registration finished.
#[derive(Clone, Debug, Default)]
pub struct FeatureMap {
    raw: HashMap<String, Option<String>>,
}

impl FeatureMap {
    /// An empty feature map, used before any 005 line has arrived.
    pub fn new() -> FeatureMap {
        FeatureMap::default()
    }

    /// Folds one 005 line's tokens into the map. Tokens are whitespace
    /// separated; the trailing human-readable "are supported by this
    /// server" text (which never contains `=`) is ignored.
    pub fn ingest(&mut self, tokens: &[&str]) {
        for token in tokens {
            if token.contains(' ') {
                continue;
            }
            match token.split_once('=') {
                Some((k, v)) => {
                    self.raw.insert(k.to_ascii_uppercase(), Some(v.to_owned()));
                }
                None => {
                    self.raw.insert(token.to_ascii_uppercase(), None);
                }
            }
        }
    }

    /// The raw value for a token, if the server advertised it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(&key.to_ascii_uppercase())?.as_deref()
    }

    /// Whether a bare (valueless) or valued token was advertised at all.
    pub fn has(&self, key: &str) -> bool {
        self.raw.contains_key(&key.to_ascii_uppercase())
    }

    /// The network name from `NETWORK=`, if advertised.
    pub fn network(&self) -> Option<&str> {
        self.get("NETWORK")
    }

    /// The channel type prefix characters from `CHANTYPES=`, defaulting to
    /// `#&` per RFC 2812 when not advertised.
    pub fn chantypes(&self) -> &str {
        self.get("CHANTYPES").unwrap_or("#&")
    }

    /// The `PREFIX=` membership prefix table, defaulting to `(ov)@+` when
    /// not advertised.
    pub fn prefix(&self) -> PrefixMap {
        self.get("PREFIX")
            .and_then(PrefixMap::parse)
            .unwrap_or_default()
    }

    /// The server's advertised casemapping, defaulting to RFC 1459.
    pub fn casemapping(&self) -> CaseMapping {
        CaseMapping::from_token(self.get("CASEMAPPING"))
    }

    /// The maximum number of channel modes with a parameter that can be
    /// set in a single MODE command, from `MODES=`.
    pub fn modes_limit(&self) -> Option<u32> {
        self.get("MODES").and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ingest_accumulates_across_lines() {
        let mut map = FeatureMap::new();
        map.ingest(&["NETWORK=Freenode", "PREFIX=(ov)@+", "CHANTYPES=#&"]);
        map.ingest(&["CASEMAPPING=ascii", "SAFELIST"]);

        assert_eq!(map.network(), Some("Freenode"));
        assert_eq!(map.chantypes(), "#&");
        assert!(map.has("SAFELIST"));
        assert_eq!(map.get("SAFELIST"), None);
    }

    #[test]
    fn prefix_defaults_when_absent() {
        let map = FeatureMap::new();
        let prefix = map.prefix();
        assert_eq!(prefix.modes, "ov");
        assert_eq!(prefix.symbols, "@+");
    }

    #[test]
    fn prefix_parses_custom_table() {
        let mut map = FeatureMap::new();
        map.ingest(&["PREFIX=(qaohv)~&@%+"]);
        let prefix = map.prefix();
        assert_eq!(prefix.symbol_for('o'), Some('@'));
        assert_eq!(prefix.symbol_for('v'), Some('+'));
        assert_eq!(prefix.highest("+%"), Some('%'));
    }

    #[test]
    fn casemapping_defaults_to_rfc1459() {
        let map = FeatureMap::new();
        assert_eq!(map.casemapping(), CaseMapping::Rfc1459);
    }
}

//! An extension trait for channel names, plus RFC 1459 case-folding.
//!
//! Channel (and nick) equality on IRC is not ASCII equality: RFC 1459 treats
//! `{`, `}`, `|`, and `~` as the lowercase forms of `[`, `]`, `\`, and `^`. This
//! module picks that casemapping as the default for every `Channel` key in the
//! store, keyed by the server's `CASEMAPPING` ISUPPORT token once known (see
//! `isupport::FeatureMap::casefold`).

/// An extension trait giving strings a function to check if they are a channel.
pub trait ChannelExt {
    /// Returns true if the specified name is a channel name.
    fn is_channel_name(&self) -> bool;
}

impl ChannelExt for str {
    fn is_channel_name(&self) -> bool {
        self.starts_with('#') || self.starts_with('&') || self.starts_with('+')
            || self.starts_with('!')
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }
}

/// The casemapping a server advertises via ISUPPORT `CASEMAPPING`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseMapping {
    /// Plain ASCII folding: only `A-Z` maps to `a-z`.
    Ascii,
    /// RFC 1459 folding: ASCII plus `{}|~` map to `[]\^`.
    Rfc1459,
    /// Like `Rfc1459` but without the `~`/`^` pair (`strict-rfc1459`).
    StrictRfc1459,
}

impl CaseMapping {
    /// Parses the `CASEMAPPING` ISUPPORT token, defaulting to RFC 1459 for
    /// unknown or absent values (most networks that omit the token still
    /// fold this way).
    pub fn from_token(token: Option<&str>) -> CaseMapping {
        match token.map(str::to_ascii_lowercase).as_deref() {
            Some("ascii") => CaseMapping::Ascii,
            Some("strict-rfc1459") => CaseMapping::StrictRfc1459,
            _ => CaseMapping::Rfc1459,
        }
    }

    /// Case-folds a single byte/char per this casemapping.
    fn fold_char(self, c: char) -> char {
        match self {
            CaseMapping::Ascii => c.to_ascii_lowercase(),
            CaseMapping::Rfc1459 => match c {
                '{' => '[',
                '}' => ']',
                '|' => '\\',
                '~' => '^',
                _ => c.to_ascii_lowercase(),
            },
            CaseMapping::StrictRfc1459 => match c {
                '{' => '[',
                '}' => ']',
                '|' => '\\',
                _ => c.to_ascii_lowercase(),
            },
        }
    }

    /// Folds a full string (channel or nick name) into its canonical form for
    /// use as a store/map key.
    pub fn fold(self, s: &str) -> String {
        s.chars().map(|c| self.fold_char(c)).collect()
    }
}

impl Default for CaseMapping {
    fn default() -> Self {
        CaseMapping::Rfc1459
    }
}

/// Folds `s` using the default (RFC 1459) casemapping. Convenience for
/// call sites that don't yet have a feature map (e.g. before registration).
pub fn casefold(s: &str) -> String {
    CaseMapping::Rfc1459.fold(s)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_prefixes() {
        assert!("#rust".is_channel_name());
        assert!("&local".is_channel_name());
        assert!(!"rust".is_channel_name());
    }

    #[test]
    fn rfc1459_folds_braces_to_brackets() {
        assert_eq!(casefold("Test{Chan}|~"), "test[chan]\\^");
    }

    #[test]
    fn ascii_ignores_braces() {
        assert_eq!(CaseMapping::Ascii.fold("Test{Chan}"), "test{chan}");
    }

    #[test]
    fn unknown_token_defaults_to_rfc1459() {
        assert_eq!(CaseMapping::from_token(Some("weird")), CaseMapping::Rfc1459);
        assert_eq!(CaseMapping::from_token(None), CaseMapping::Rfc1459);
    }
}

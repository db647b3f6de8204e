//! A module providing a type for a message prefix.
use std::fmt;
use std::str::FromStr;

/// The prefix indicates the true origin of a message, according to the server.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Prefix {
    /// A server name, e.g. `irc.example.com`.
    ServerName(String),
    /// `nickname [ ["!" username] "@" hostname ]`
    Nickname(String, String, String),
}

impl Prefix {
    /// Creates a prefix by parsing a string.
    ///
    /// # Example
    /// ```
    /// use dispatch_proto::Prefix;
    /// Prefix::new_from_str("nickname!username@hostname");
    /// Prefix::new_from_str("example.com");
    /// ```
    pub fn new_from_str(s: &str) -> Prefix {
        #[derive(Copy, Clone, Eq, PartialEq)]
        enum Active {
            Name,
            User,
            Host,
        }

        let mut name = String::new();
        let mut user = String::new();
        let mut host = String::new();
        let mut active = Active::Name;

        for c in s.chars() {
            match c {
                // A '.' before any '!' means this is a servername, not a nick.
                '.' if active == Active::Name => return Prefix::ServerName(s.to_owned()),
                '!' if active == Active::Name => active = Active::User,
                '@' if active == Active::User => active = Active::Host,
                _ => match active {
                    Active::Name => &mut name,
                    Active::User => &mut user,
                    Active::Host => &mut host,
                }
                .push(c),
            }
        }

        Prefix::Nickname(name, user, host)
    }

    /// Returns the nickname this prefix names, if it is a `Nickname` prefix.
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }
}

/// This implementation never fails and is isomorphic with `Display`.
impl FromStr for Prefix {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Prefix::new_from_str(s))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => write!(f, "{}", name),
            Prefix::Nickname(name, user, host) => match (&name[..], &user[..], &host[..]) {
                ("", "", "") => Ok(()),
                (name, "", "") => write!(f, "{}", name),
                (name, user, "") => write!(f, "{}!{}", name, user),
                (name, "", _host) => write!(f, "{}", name),
                (name, user, host) => write!(f, "{}!{}@{}", name, user, host),
            },
        }
    }
}

impl<'a> From<&'a str> for Prefix {
    fn from(s: &str) -> Self {
        Prefix::new_from_str(s)
    }
}

#[cfg(test)]
mod test {
    use super::Prefix::{self, Nickname, ServerName};

    fn test_parse(s: &str) -> Prefix {
        let prefix = Prefix::new_from_str(s);
        assert_eq!(s, &format!("{}", prefix));
        prefix
    }

    #[test]
    fn print() {
        assert_eq!(
            format!("{}", Nickname("nick".into(), "".into(), "".into())),
            "nick"
        );
        assert_eq!(
            format!("{}", Nickname("nick".into(), "user".into(), "".into())),
            "nick!user"
        );
        assert_eq!(
            format!(
                "{}",
                Nickname("nick".into(), "user".into(), "host".into())
            ),
            "nick!user@host"
        );
    }

    #[test]
    fn parse_word() {
        assert_eq!(
            test_parse("only_nick"),
            Nickname("only_nick".into(), String::new(), String::new())
        )
    }

    #[test]
    fn parse_host() {
        assert_eq!(test_parse("host.tld"), ServerName("host.tld".into()))
    }

    #[test]
    fn parse_nick_user_host() {
        assert_eq!(
            test_parse("test!nick@host"),
            Nickname("test".into(), "nick".into(), "host".into())
        )
    }

    #[test]
    fn parse_danger_cases() {
        assert_eq!(
            test_parse("name!@"),
            Nickname("name".into(), "".into(), "".into())
        );
        assert_eq!(
            test_parse("name!@hostname"),
            Nickname("name".into(), "".into(), "hostname".into())
        );
        assert_eq!(
            test_parse("!user"),
            Nickname("".into(), "user".into(), String::new())
        );
    }

    #[test]
    fn nickname_accessor() {
        assert_eq!(
            Prefix::new_from_str("nick!user@host").nickname(),
            Some("nick")
        );
        assert_eq!(Prefix::new_from_str("irc.example.com").nickname(), None);
    }
}

//! User and channel modes for the MODE command.
//!
//! Channel membership modes (`o`, `v`, ...) are parsed against the network's
//! advertised `PREFIX` ISUPPORT token rather than a fixed table, since
//! networks vary in which letters grant which prefix character (see
//! `isupport::FeatureMap`).
use std::fmt;

use crate::error::MessageParseError;
use crate::error::MessageParseError::InvalidModeString;
use crate::error::ModeParseError::*;

/// User modes for the MODE command (`MODE <nick> <modes>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserMode {
    /// a - user is flagged as away
    Away,
    /// i - marks a user as invisible
    Invisible,
    /// w - user receives wallops
    Wallops,
    /// o - operator flag
    Oper,
    /// s - user receives server notices
    ServerNotices,
    /// Any other mode letter unknown to this crate.
    Unknown(char),
}

impl UserMode {
    fn from_char(c: char) -> UserMode {
        match c {
            'a' => UserMode::Away,
            'i' => UserMode::Invisible,
            'w' => UserMode::Wallops,
            'o' => UserMode::Oper,
            's' => UserMode::ServerNotices,
            _ => UserMode::Unknown(c),
        }
    }
}

impl fmt::Display for UserMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = match *self {
            UserMode::Away => 'a',
            UserMode::Invisible => 'i',
            UserMode::Wallops => 'w',
            UserMode::Oper => 'o',
            UserMode::ServerNotices => 's',
            UserMode::Unknown(c) => c,
        };
        write!(f, "{}", c)
    }
}

/// Channel modes for the MODE command (`MODE <channel> <modes> [params...]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMode {
    /// b - ban mask
    Ban,
    /// i - invite-only
    InviteOnly,
    /// k - channel key
    Key,
    /// l - user limit
    Limit,
    /// m - moderated
    Moderated,
    /// s - secret (hidden from listings)
    Secret,
    /// t - only ops may change the topic
    ProtectedTopic,
    /// n - users must join to message the channel
    NoExternalMessages,
    /// A membership/prefix mode (e.g. `o`, `v`) as advertised by `PREFIX`.
    Prefix(char),
    /// Any other mode letter unknown to this crate.
    Unknown(char),
}

impl ChannelMode {
    fn from_char(c: char, prefix_modes: &str) -> ChannelMode {
        match c {
            'b' => ChannelMode::Ban,
            'i' => ChannelMode::InviteOnly,
            'k' => ChannelMode::Key,
            'l' => ChannelMode::Limit,
            'm' => ChannelMode::Moderated,
            's' => ChannelMode::Secret,
            't' => ChannelMode::ProtectedTopic,
            'n' => ChannelMode::NoExternalMessages,
            c if prefix_modes.contains(c) => ChannelMode::Prefix(c),
            c => ChannelMode::Unknown(c),
        }
    }

    fn takes_arg(self) -> bool {
        matches!(
            self,
            ChannelMode::Ban | ChannelMode::Key | ChannelMode::Limit | ChannelMode::Prefix(_)
        )
    }

    /// The mode letter, if this is a membership/prefix mode.
    pub fn prefix_letter(self) -> Option<char> {
        match self {
            ChannelMode::Prefix(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = match *self {
            ChannelMode::Ban => 'b',
            ChannelMode::InviteOnly => 'i',
            ChannelMode::Key => 'k',
            ChannelMode::Limit => 'l',
            ChannelMode::Moderated => 'm',
            ChannelMode::Secret => 's',
            ChannelMode::ProtectedTopic => 't',
            ChannelMode::NoExternalMessages => 'n',
            ChannelMode::Prefix(c) | ChannelMode::Unknown(c) => c,
        };
        write!(f, "{}", c)
    }
}

/// A single `+`/`-` mode change, with its optional argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode<T> {
    /// Adding the specified mode, optionally with an argument.
    Plus(T, Option<String>),
    /// Removing the specified mode, optionally with an argument.
    Minus(T, Option<String>),
}

impl<T> fmt::Display for Mode<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Mode::Plus(ref mode, Some(ref arg)) => write!(f, "+{} {}", mode, arg),
            Mode::Minus(ref mode, Some(ref arg)) => write!(f, "-{} {}", mode, arg),
            Mode::Plus(ref mode, None) => write!(f, "+{}", mode),
            Mode::Minus(ref mode, None) => write!(f, "-{}", mode),
        }
    }
}

enum PlusMinus {
    Plus,
    Minus,
}

fn leading_sign(c: char, whole: &str) -> Result<PlusMinus, MessageParseError> {
    match c {
        '+' => Ok(PlusMinus::Plus),
        '-' => Ok(PlusMinus::Minus),
        c => Err(InvalidModeString {
            string: whole.to_owned(),
            cause: InvalidModeModifier { modifier: c },
        }),
    }
}

impl Mode<UserMode> {
    /// Parses a user mode string, e.g. `+i-w`.
    pub fn parse_user(s: &str) -> Result<Vec<Mode<UserMode>>, MessageParseError> {
        let mut res = vec![];
        let mut chars = s.chars();
        let mut sign = match chars.next() {
            Some(c) => leading_sign(c, s)?,
            None => {
                return Err(InvalidModeString {
                    string: s.to_owned(),
                    cause: MissingModeModifier,
                })
            }
        };
        for c in chars {
            match c {
                '+' => sign = PlusMinus::Plus,
                '-' => sign = PlusMinus::Minus,
                c => {
                    let mode = UserMode::from_char(c);
                    res.push(match sign {
                        PlusMinus::Plus => Mode::Plus(mode, None),
                        PlusMinus::Minus => Mode::Minus(mode, None),
                    });
                }
            }
        }
        Ok(res)
    }
}

impl Mode<ChannelMode> {
    /// Parses a channel mode string against the network's `PREFIX` mode
    /// letters (e.g. `"ov"` for `PREFIX=(ov)@+`), consuming arguments from
    /// the trailing parameters in the same order modes requiring them appear.
    pub fn parse_channel(
        s: &str,
        args: &[&str],
        prefix_modes: &str,
    ) -> Result<Vec<Mode<ChannelMode>>, MessageParseError> {
        let mut res = vec![];
        let mut args = args.iter();
        let mut chars = s.chars();
        let mut sign = match chars.next() {
            Some(c) => leading_sign(c, s)?,
            None => {
                return Err(InvalidModeString {
                    string: s.to_owned(),
                    cause: MissingModeModifier,
                })
            }
        };
        for c in chars {
            match c {
                '+' => sign = PlusMinus::Plus,
                '-' => sign = PlusMinus::Minus,
                c => {
                    let mode = ChannelMode::from_char(c, prefix_modes);
                    let arg = if mode.takes_arg() {
                        args.next().map(|s| s.to_string())
                    } else {
                        None
                    };
                    res.push(match sign {
                        PlusMinus::Plus => Mode::Plus(mode, arg),
                        PlusMinus::Minus => Mode::Minus(mode, arg),
                    });
                }
            }
        }
        Ok(res)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_simple_user_modes() {
        let modes = Mode::parse_user("+i").unwrap();
        assert_eq!(modes, vec![Mode::Plus(UserMode::Invisible, None)]);
    }

    #[test]
    fn parse_user_modes_with_sign_switch() {
        let modes = Mode::parse_user("+i-w+s").unwrap();
        assert_eq!(
            modes,
            vec![
                Mode::Plus(UserMode::Invisible, None),
                Mode::Minus(UserMode::Wallops, None),
                Mode::Plus(UserMode::ServerNotices, None),
            ]
        );
    }

    #[test]
    fn parse_channel_modes_with_args() {
        let modes = Mode::parse_channel("+o-v", &["nick1", "nick2"], "ov").unwrap();
        assert_eq!(
            modes,
            vec![
                Mode::Plus(ChannelMode::Prefix('o'), Some("nick1".into())),
                Mode::Minus(ChannelMode::Prefix('v'), Some("nick2".into())),
            ]
        );
    }

    #[test]
    fn parse_channel_modes_without_prefix_letters() {
        let modes = Mode::parse_channel("+mt", &[], "ov").unwrap();
        assert_eq!(
            modes,
            vec![
                Mode::Plus(ChannelMode::Moderated, None),
                Mode::Plus(ChannelMode::ProtectedTopic, None),
            ]
        );
    }

    #[test]
    fn missing_modifier_is_an_error() {
        assert_eq!(
            Mode::parse_channel("", &[], "ov"),
            Err(InvalidModeString {
                string: "".into(),
                cause: MissingModeModifier,
            })
        );
    }

    #[test]
    fn bad_modifier_is_an_error() {
        assert_eq!(
            Mode::parse_user("xo"),
            Err(InvalidModeString {
                string: "xo".into(),
                cause: InvalidModeModifier { modifier: 'x' },
            })
        );
    }
}

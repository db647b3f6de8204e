//! Enumeration of the client commands and server numerics this crate speaks.
//!
//! This does not attempt to cover every command in
//! [RFC 2812](http://tools.ietf.org/html/rfc2812); only the subset a bouncer
//! actually issues or must recognize when replying to a user. Anything else
//! round-trips through [`Command::Raw`].
use crate::error::MessageParseError;
use crate::mode::{ChannelMode, Mode, UserMode};
use crate::response::Response;

/// A client command or server reply, already split into its pieces.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    // 3.1 Connection registration
    /// PASS :password
    PASS(String),
    /// NICK :nickname
    NICK(String),
    /// USER user mode * :realname
    USER(String, String, String),
    /// MODE nickname modes
    UserMODE(String, Vec<Mode<UserMode>>),
    /// QUIT :comment
    QUIT(Option<String>),

    // 3.2 Channel operations
    /// JOIN chanlist [chankeys]
    JOIN(String, Option<String>),
    /// PART chanlist :[comment]
    PART(String, Option<String>),
    /// MODE channel [modes [modeparams]]
    ChannelMODE(String, Vec<Mode<ChannelMode>>),
    /// TOPIC channel :[topic]
    TOPIC(String, Option<String>),
    /// NAMES [chanlist]
    NAMES(Option<String>),
    /// LIST [chanlist]
    LIST(Option<String>),

    // 3.3 Sending messages
    /// PRIVMSG msgtarget :message
    PRIVMSG(String, String),
    /// NOTICE msgtarget :message
    NOTICE(String, String),

    // 3.4 Server queries
    /// MOTD :[target]
    MOTD(Option<String>),
    /// WHOIS [target] masklist
    WHOIS(Option<String>, String),

    // 3.7 Miscellaneous messages
    /// PING server1 :[server2]
    PING(String, Option<String>),
    /// PONG server :[server2]
    PONG(String, Option<String>),

    // Default options.
    /// A numeric server response, with arguments and optional trailing.
    Response(Response, Vec<String>, Option<String>),
    /// A command unrecognized by this crate.
    Raw(String, Vec<String>, Option<String>),
}

fn stringify(cmd: &str, args: &[&str], suffix: Option<&str>) -> String {
    let args = args.join(" ");
    let sp = if args.is_empty() { "" } else { " " };
    match suffix {
        Some(suffix) => format!("{}{}{} :{}", cmd, sp, args, suffix),
        None => format!("{}{}{}", cmd, sp, args),
    }
}

fn mode_string<T: std::fmt::Display>(target: &str, modes: &[Mode<T>]) -> String {
    let mut out = format!("MODE {}", target);
    for mode in modes {
        out.push(' ');
        out.push_str(&mode.to_string());
    }
    out
}

impl<'a> From<&'a Command> for String {
    fn from(cmd: &'a Command) -> String {
        match *cmd {
            Command::PASS(ref p) => stringify("PASS", &[], Some(p)),
            Command::NICK(ref n) => stringify("NICK", &[], Some(n)),
            Command::USER(ref u, ref m, ref r) => stringify("USER", &[u, m, "*"], Some(r)),
            Command::UserMODE(ref u, ref m) => mode_string(u, m),
            Command::QUIT(Some(ref m)) => stringify("QUIT", &[], Some(m)),
            Command::QUIT(None) => stringify("QUIT", &[], None),
            Command::JOIN(ref c, Some(ref k)) => stringify("JOIN", &[c, k], None),
            Command::JOIN(ref c, None) => stringify("JOIN", &[c], None),
            Command::PART(ref c, Some(ref m)) => stringify("PART", &[c], Some(m)),
            Command::PART(ref c, None) => stringify("PART", &[c], None),
            Command::ChannelMODE(ref c, ref m) => mode_string(c, m),
            Command::TOPIC(ref c, Some(ref t)) => stringify("TOPIC", &[c], Some(t)),
            Command::TOPIC(ref c, None) => stringify("TOPIC", &[c], None),
            Command::NAMES(Some(ref c)) => stringify("NAMES", &[c], None),
            Command::NAMES(None) => stringify("NAMES", &[], None),
            Command::LIST(Some(ref c)) => stringify("LIST", &[c], None),
            Command::LIST(None) => stringify("LIST", &[], None),
            Command::PRIVMSG(ref t, ref m) => stringify("PRIVMSG", &[t], Some(m)),
            Command::NOTICE(ref t, ref m) => stringify("NOTICE", &[t], Some(m)),
            Command::MOTD(Some(ref t)) => stringify("MOTD", &[], Some(t)),
            Command::MOTD(None) => stringify("MOTD", &[], None),
            Command::WHOIS(Some(ref t), ref m) => stringify("WHOIS", &[t, m], None),
            Command::WHOIS(None, ref m) => stringify("WHOIS", &[m], None),
            Command::PING(ref s, Some(ref t)) => stringify("PING", &[s], Some(t)),
            Command::PING(ref s, None) => stringify("PING", &[], Some(s)),
            Command::PONG(ref s, Some(ref t)) => stringify("PONG", &[s], Some(t)),
            Command::PONG(ref s, None) => stringify("PONG", &[], Some(s)),
            Command::Response(ref resp, ref a, Some(ref s)) => stringify(
                &format!("{:03}", *resp as u16),
                &a.iter().map(|s| &s[..]).collect::<Vec<_>>(),
                Some(s),
            ),
            Command::Response(ref resp, ref a, None) => stringify(
                &format!("{:03}", *resp as u16),
                &a.iter().map(|s| &s[..]).collect::<Vec<_>>(),
                None,
            ),
            Command::Raw(ref c, ref a, Some(ref s)) => {
                stringify(c, &a.iter().map(|s| &s[..]).collect::<Vec<_>>(), Some(s))
            }
            Command::Raw(ref c, ref a, None) => {
                stringify(c, &a.iter().map(|s| &s[..]).collect::<Vec<_>>(), None)
            }
        }
    }
}

impl Command {
    /// Builds a `Command` from its already-split command word, middle
    /// params, and trailing param, as produced by the line parser.
    pub fn new(
        cmd: &str,
        args: Vec<&str>,
        suffix: Option<&str>,
    ) -> Result<Command, MessageParseError> {
        Ok(match cmd.to_ascii_uppercase().as_str() {
            "PASS" => Command::PASS(owned_first(&args, suffix)?),
            "NICK" => Command::NICK(owned_first(&args, suffix)?),
            "USER" => {
                if args.len() >= 2 {
                    Command::USER(
                        args[0].to_owned(),
                        args[1].to_owned(),
                        suffix.unwrap_or_default().to_owned(),
                    )
                } else {
                    return Err(MessageParseError::InvalidCommand);
                }
            }
            "QUIT" => Command::QUIT(suffix.map(str::to_owned).or_else(|| args.first().map(|s| s.to_string()))),
            "JOIN" => Command::JOIN(
                first_owned(&args)?,
                args.get(1).map(|s| s.to_string()),
            ),
            "PART" => Command::PART(first_owned(&args)?, suffix.map(str::to_owned)),
            "TOPIC" => Command::TOPIC(first_owned(&args)?, suffix.map(str::to_owned)),
            "NAMES" => Command::NAMES(args.first().map(|s| s.to_string())),
            "LIST" => Command::LIST(args.first().map(|s| s.to_string())),
            "PRIVMSG" => Command::PRIVMSG(first_owned(&args)?, suffix.unwrap_or_default().to_owned()),
            "NOTICE" => Command::NOTICE(first_owned(&args)?, suffix.unwrap_or_default().to_owned()),
            "MOTD" => Command::MOTD(args.first().map(|s| s.to_string())),
            "WHOIS" if args.len() >= 2 => {
                Command::WHOIS(Some(args[0].to_owned()), args[1].to_owned())
            }
            "WHOIS" => Command::WHOIS(None, first_owned(&args)?),
            "PING" => Command::PING(first_owned(&args)?, suffix.map(str::to_owned)),
            "PONG" => Command::PONG(first_owned(&args)?, suffix.map(str::to_owned)),
            cmd => {
                if let Ok(resp) = cmd.parse::<Response>() {
                    Command::Response(
                        resp,
                        args.into_iter().map(str::to_owned).collect(),
                        suffix.map(str::to_owned),
                    )
                } else {
                    Command::Raw(
                        cmd.to_owned(),
                        args.into_iter().map(str::to_owned).collect(),
                        suffix.map(str::to_owned),
                    )
                }
            }
        })
    }
}

fn first_owned(args: &[&str]) -> Result<String, MessageParseError> {
    args.first()
        .map(|s| s.to_string())
        .ok_or(MessageParseError::InvalidCommand)
}

fn owned_first(args: &[&str], suffix: Option<&str>) -> Result<String, MessageParseError> {
    suffix
        .map(str::to_owned)
        .or_else(|| args.first().map(|s| s.to_string()))
        .ok_or(MessageParseError::InvalidCommand)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn privmsg_round_trips() {
        let cmd = Command::PRIVMSG("#rust".into(), "hello there".into());
        assert_eq!(String::from(&cmd), "PRIVMSG #rust :hello there");
    }

    #[test]
    fn quit_without_reason() {
        let cmd = Command::QUIT(None);
        assert_eq!(String::from(&cmd), "QUIT");
    }

    #[test]
    fn parse_privmsg() {
        let cmd = Command::new("PRIVMSG", vec!["#rust"], Some("hi")).unwrap();
        assert_eq!(cmd, Command::PRIVMSG("#rust".into(), "hi".into()));
    }

    #[test]
    fn parse_unknown_numeric_falls_back_to_raw() {
        let cmd = Command::new("999", vec!["a"], Some("b")).unwrap();
        assert_eq!(cmd, Command::Raw("999".into(), vec!["a".into()], Some("b".into())));
    }

    #[test]
    fn parse_known_numeric() {
        let cmd = Command::new("001", vec!["ferris"], Some("Welcome")).unwrap();
        assert_eq!(
            cmd,
            Command::Response(Response::RPL_WELCOME, vec!["ferris".into()], Some("Welcome".into()))
        );
    }
}

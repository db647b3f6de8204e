//! A parsed IRC message: prefix, command, and parameters.
use std::fmt;
use std::str::FromStr;

use crate::command::Command;
use crate::error::MessageParseError;
use crate::prefix::Prefix;

/// The maximum number of bytes a line may occupy on the wire, including the
/// trailing `\r\n`.
pub const MAX_LINE_LENGTH: usize = 512;

/// A single IRC protocol message: `[":" prefix SPACE] command [params] crlf`.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// The message's source, if one was given.
    pub prefix: Option<Prefix>,
    /// The parsed command or numeric reply.
    pub command: Command,
}

impl Message {
    /// Builds a message with no prefix.
    pub fn new(command: Command) -> Message {
        Message {
            prefix: None,
            command,
        }
    }

    /// Builds a message carrying the given prefix.
    pub fn with_prefix(prefix: Prefix, command: Command) -> Message {
        Message {
            prefix: Some(prefix),
            command,
        }
    }

    /// Parses a single line (without its trailing `\r\n`, which the line
    /// codec strips before handing off the line).
    pub fn parse(line: &str) -> Result<Message, MessageParseError> {
        if line.len() + 2 > MAX_LINE_LENGTH {
            return Err(MessageParseError::MaxLengthExceeded);
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let mut rest = line;

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (word, remainder) = split_word(stripped);
            rest = remainder;
            Some(Prefix::new_from_str(word))
        } else {
            None
        };

        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let (cmd, remainder) = split_word(rest);
        if cmd.is_empty() {
            return Err(MessageParseError::InvalidCommand);
        }
        rest = remainder.trim_start_matches(' ');

        let (middle, trailing) = match rest.find(" :").or_else(|| {
            if rest.starts_with(':') {
                Some(0)
            } else {
                None
            }
        }) {
            Some(0) => ("", Some(&rest[1..])),
            Some(idx) => (&rest[..idx], Some(&rest[idx + 2..])),
            None => (rest.trim_end_matches(' '), None),
        };

        let args: Vec<&str> = middle.split(' ').filter(|s| !s.is_empty()).collect();
        let command = Command::new(cmd, args, trailing)?;

        Ok(Message { prefix, command })
    }

    /// Serializes this message back into wire form, including the trailing
    /// `\r\n`.
    pub fn to_line(&self) -> String {
        format!("{}\r\n", self.to_wire())
    }

    /// Serializes this message without the trailing `\r\n`, for codecs that
    /// append line termination themselves.
    pub fn to_wire(&self) -> String {
        let body = String::from(&self.command);
        match &self.prefix {
            Some(p) => format!(":{} {}", p, body),
            None => body,
        }
    }

    /// The nickname of the message's sender, if the prefix names one.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nickname)
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::Response;

    #[test]
    fn parse_simple_command() {
        let msg = Message::parse("NICK ferris").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, Command::NICK("ferris".into()));
    }

    #[test]
    fn parse_with_prefix() {
        let msg = Message::parse(":nick!user@host PRIVMSG #rust :hi there").unwrap();
        assert_eq!(msg.source_nickname(), Some("nick"));
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#rust".into(), "hi there".into())
        );
    }

    #[test]
    fn trailing_param_may_contain_spaces_and_colon() {
        let msg = Message::parse("PRIVMSG #rust ::colon start and spaces").unwrap();
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#rust".into(), ":colon start and spaces".into())
        );
    }

    #[test]
    fn numeric_command_parses_as_response() {
        let msg = Message::parse(":irc.example.com 001 ferris :Welcome").unwrap();
        assert_eq!(
            msg.command,
            Command::Response(Response::RPL_WELCOME, vec!["ferris".into()], Some("Welcome".into()))
        );
    }

    #[test]
    fn empty_line_is_an_error() {
        assert_eq!(Message::parse(""), Err(MessageParseError::EmptyMessage));
        assert_eq!(Message::parse("   "), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn round_trip_serialization() {
        let msg = Message::with_prefix(
            Prefix::new_from_str("nick!user@host"),
            Command::PRIVMSG("#rust".into(), "hello world".into()),
        );
        assert_eq!(msg.to_line(), ":nick!user@host PRIVMSG #rust :hello world\r\n");
    }

    #[test]
    fn oversized_line_is_rejected() {
        let long = "x".repeat(600);
        assert_eq!(
            Message::parse(&format!("PRIVMSG #rust :{}", long)),
            Err(MessageParseError::MaxLengthExceeded)
        );
    }
}

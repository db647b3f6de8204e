//! Encoding and decoding of CTCP (Client-To-Client Protocol) envelopes.
//!
//! A CTCP message is ordinary `PRIVMSG`/`NOTICE` content delimited by the
//! `0x01` byte. The first whitespace-delimited token inside the envelope is
//! the CTCP command; everything after the following space is its params.

use crate::error::CtcpError;

const DELIM: char = '\u{1}';

/// A decoded CTCP request or reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp {
    /// The CTCP command, e.g. `VERSION`, `ACTION`, `PING`.
    pub command: String,
    /// Everything after the command and its separating space, or empty.
    pub params: String,
}

impl Ctcp {
    /// Returns true if `content` looks like a CTCP envelope (starts and ends
    /// with `0x01`).
    pub fn is_ctcp(content: &str) -> bool {
        content.len() >= 2
            && content.starts_with(DELIM)
            && content.ends_with(DELIM)
    }

    /// Decodes a CTCP envelope. Returns an error if the content isn't a CTCP
    /// envelope, or if the command it carries is empty.
    pub fn decode(content: &str) -> Result<Ctcp, CtcpError> {
        if !Ctcp::is_ctcp(content) {
            return Err(CtcpError::NotCtcp);
        }
        let inner = &content[DELIM.len_utf8()..content.len() - DELIM.len_utf8()];
        let (command, params) = match inner.find(' ') {
            Some(idx) => (&inner[..idx], &inner[idx + 1..]),
            None => (inner, ""),
        };
        if command.is_empty() {
            return Err(CtcpError::EmptyCommand);
        }
        Ok(Ctcp {
            command: command.to_owned(),
            params: params.to_owned(),
        })
    }

    /// Encodes this CTCP value back into its `0x01`-delimited envelope form.
    pub fn encode(&self) -> String {
        if self.params.is_empty() {
            format!("{DELIM}{}{DELIM}", self.command)
        } else {
            format!("{DELIM}{} {}{DELIM}", self.command, self.params)
        }
    }

    /// Builds a CTCP ACTION envelope (`/me <text>`), the one request the
    /// Handler treats as a distinct message kind rather than routing through
    /// the CTCP responder.
    pub fn action(text: &str) -> Ctcp {
        Ctcp {
            command: "ACTION".to_owned(),
            params: text.to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_with_params() {
        let ctcp = Ctcp {
            command: "PING".into(),
            params: "123456".into(),
        };
        assert_eq!(Ctcp::decode(&ctcp.encode()).unwrap(), ctcp);
    }

    #[test]
    fn round_trip_without_params() {
        let ctcp = Ctcp {
            command: "VERSION".into(),
            params: "".into(),
        };
        assert_eq!(Ctcp::decode(&ctcp.encode()).unwrap(), ctcp);
    }

    #[test]
    fn empty_command_is_invalid() {
        assert_eq!(Ctcp::decode("\u{1}\u{1}"), Err(CtcpError::EmptyCommand));
        assert_eq!(Ctcp::decode("\u{1} foo\u{1}"), Err(CtcpError::EmptyCommand));
    }

    #[test]
    fn non_ctcp_content_is_rejected() {
        assert_eq!(Ctcp::decode("hello there"), Err(CtcpError::NotCtcp));
    }

    #[test]
    fn action_helper() {
        let action = Ctcp::action("waves");
        assert_eq!(action.encode(), "\u{1}ACTION waves\u{1}");
    }
}

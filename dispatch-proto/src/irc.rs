//! The IRC message codec, layered over the line codec.
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::line::LineCodec;
use crate::message::Message;

/// Decodes/encodes [`Message`]s directly from/to a byte stream.
#[derive(Default)]
pub struct IrcCodec {
    inner: LineCodec,
}

impl IrcCodec {
    /// Creates a new codec.
    pub fn new() -> IrcCodec {
        IrcCodec::default()
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        match self.inner.decode(src)? {
            Some(line) => {
                if line.is_empty() {
                    return Ok(None);
                }
                let message = Message::parse(&line)
                    .map_err(|cause| error::ProtocolError::InvalidMessage { string: line, cause })?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        self.inner.encode(msg.to_wire(), dst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::Command;

    #[test]
    fn decode_then_encode_round_trips() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from("NICK ferris\r\n".as_bytes());
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.command, Command::NICK("ferris".into()));
    }

    #[test]
    fn encode_includes_prefix() {
        use crate::prefix::Prefix;

        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();
        let msg = Message::with_prefix(
            Prefix::new_from_str("irc.example.com"),
            Command::PING("irc.example.com".into(), None),
        );
        codec.encode(msg, &mut buf).unwrap();
        assert_eq!(&buf[..], b":irc.example.com PING :irc.example.com\r\n");
    }
}

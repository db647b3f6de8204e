//! Line-delimiting codec, UTF-8 only.
//!
//! Networks occasionally send lines with invalid UTF-8 byte sequences
//! (legacy clients, mixed-encoding relays); those bytes are replaced with
//! `U+FFFD` rather than dropping the connection, mirroring how browsers
//! treat malformed text.
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::message::MAX_LINE_LENGTH;

/// A line-based codec splitting on `\n`, trimming a trailing `\r`.
#[derive(Default)]
pub struct LineCodec {
    next_index: usize,
}

impl LineCodec {
    /// Creates a new line codec.
    pub fn new() -> LineCodec {
        LineCodec::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            Ok(Some(line.to_owned()))
        } else {
            self.next_index = src.len();
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> error::Result<()> {
        if msg.len() + 2 > MAX_LINE_LENGTH {
            return Err(error::ProtocolError::InvalidMessage {
                string: msg,
                cause: error::MessageParseError::MaxLengthExceeded,
            });
        }
        dst.extend(msg.as_bytes());
        dst.extend(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_crlf_terminated_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("NICK ferris\r\n".as_bytes());
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("NICK ferris".to_owned()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decodes_lf_only_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("NICK ferris\n".as_bytes());
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("NICK ferris".to_owned()));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let mut codec = LineCodec::new();
        let mut bytes = b"PRIVMSG #rust :\xff\xfe\r\n".to_vec();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&mut bytes);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with("PRIVMSG #rust :"));
    }

    #[test]
    fn encode_rejects_oversized_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        let long = "x".repeat(600);
        assert!(codec.encode(long, &mut buf).is_err());
    }
}

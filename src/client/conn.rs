//! TCP/TLS dial logic for a Client's socket.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::config::NetworkConfig;
use crate::error::{Error, Result};

#[cfg(feature = "tls-native")]
use tokio_native_tls::{TlsConnector, TlsStream};

/// A dialed connection, plaintext or TLS, behind one `AsyncRead`/`AsyncWrite`
/// surface so the Client's codec layer doesn't need to care which.
pub enum Connection {
    /// A plaintext TCP socket.
    Plain(TcpStream),
    /// A TLS-wrapped TCP socket.
    #[cfg(feature = "tls-native")]
    Tls(TlsStream<TcpStream>),
    /// An in-memory transport for tests.
    Mock(crate::client::mock::MockStream),
}

impl Connection {
    /// Dials `config.host:config.port`, negotiating TLS if requested.
    pub async fn dial(config: &NetworkConfig) -> Result<Connection> {
        let addr = (config.host.as_str(), config.port);
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|cause| Error::Transport(cause))?;

        if config.tls {
            #[cfg(feature = "tls-native")]
            {
                let connector = native_tls::TlsConnector::new()
                    .map_err(|cause| Error::Tls(cause.to_string()))?;
                let connector = TlsConnector::from(connector);
                let tls = connector
                    .connect(&config.host, stream)
                    .await
                    .map_err(|cause| Error::Tls(cause.to_string()))?;
                return Ok(Connection::Tls(tls));
            }
            #[cfg(not(feature = "tls-native"))]
            {
                return Err(Error::Tls("no TLS backend compiled in".to_owned()));
            }
        }

        Ok(Connection::Plain(stream))
    }
}

impl AsyncRead for Connection {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(feature = "tls-native")]
            Connection::Tls(s) => Pin::new(s).poll_read(cx, buf),
            Connection::Mock(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(feature = "tls-native")]
            Connection::Tls(s) => Pin::new(s).poll_write(cx, buf),
            Connection::Mock(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_flush(cx),
            #[cfg(feature = "tls-native")]
            Connection::Tls(s) => Pin::new(s).poll_flush(cx),
            Connection::Mock(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(feature = "tls-native")]
            Connection::Tls(s) => Pin::new(s).poll_shutdown(cx),
            Connection::Mock(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

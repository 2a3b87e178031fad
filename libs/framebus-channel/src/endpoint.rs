use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

use crate::error::ChannelError;

/// Parsed socket address. Two schemes are supported: `tcp://host:port`
/// and `ipc:///absolute/path` (a unix domain socket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Ipc(PathBuf),
}

impl Endpoint {
    pub fn parse(address: &str) -> Result<Self, ChannelError> {
        if let Some(rest) = address.strip_prefix("tcp://") {
            match rest.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(Endpoint::Tcp(rest.to_string()))
                }
                _ => Err(ChannelError::Config(format!(
                    "invalid tcp address: {address}"
                ))),
            }
        } else if let Some(rest) = address.strip_prefix("ipc://") {
            if rest.starts_with('/') {
                Ok(Endpoint::Ipc(PathBuf::from(rest)))
            } else {
                Err(ChannelError::Config(format!(
                    "ipc path must be absolute: {address}"
                )))
            }
        } else {
            Err(ChannelError::Config(format!(
                "unsupported address scheme: {address}"
            )))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

pub(crate) enum Listener {
    Tcp(TcpListener),
    Ipc(UnixListener),
}

impl Listener {
    pub(crate) async fn bind(endpoint: &Endpoint) -> std::io::Result<Listener> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Listener::Tcp(TcpListener::bind(addr.as_str()).await?)),
            Endpoint::Ipc(path) => {
                // Rebinding over a stale socket file is routine after a crash.
                let _ = std::fs::remove_file(path);
                Ok(Listener::Ipc(UnixListener::bind(path)?))
            }
        }
    }

    /// The address actually bound, with any ephemeral port resolved.
    pub(crate) fn bound_address(&self, endpoint: &Endpoint) -> String {
        match self {
            Listener::Tcp(listener) => match listener.local_addr() {
                Ok(addr) => format!("tcp://{addr}"),
                Err(_) => endpoint.to_string(),
            },
            Listener::Ipc(_) => endpoint.to_string(),
        }
    }

    pub(crate) async fn accept(&self) -> std::io::Result<IoStream> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(IoStream::Tcp(stream))
            }
            Listener::Ipc(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(IoStream::Ipc(stream))
            }
        }
    }
}

pub(crate) async fn connect(endpoint: &Endpoint) -> std::io::Result<IoStream> {
    match endpoint {
        Endpoint::Tcp(addr) => Ok(IoStream::Tcp(TcpStream::connect(addr.as_str()).await?)),
        Endpoint::Ipc(path) => Ok(IoStream::Ipc(UnixStream::connect(path).await?)),
    }
}

/// Apply SO_RCVBUF / SO_SNDBUF. Platform refusal is logged, not fatal.
pub(crate) fn apply_os_buffers(
    stream: &IoStream,
    recv_bytes: Option<usize>,
    send_bytes: Option<usize>,
) {
    let sock = match stream {
        IoStream::Tcp(stream) => socket2::SockRef::from(stream),
        IoStream::Ipc(stream) => socket2::SockRef::from(stream),
    };
    if let Some(bytes) = recv_bytes {
        if let Err(e) = sock.set_recv_buffer_size(bytes) {
            tracing::warn!(bytes, error = %e, "failed to set os receive buffer");
        }
    }
    if let Some(bytes) = send_bytes {
        if let Err(e) = sock.set_send_buffer_size(bytes) {
            tracing::warn!(bytes, error = %e, "failed to set os send buffer");
        }
    }
}

/// One accepted or connected stream, tcp or unix.
pub(crate) enum IoStream {
    Tcp(TcpStream),
    Ipc(UnixStream),
}

impl AsyncRead for IoStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            IoStream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            IoStream::Ipc(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for IoStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            IoStream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            IoStream::Ipc(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            IoStream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            IoStream::Ipc(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            IoStream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            IoStream::Ipc(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

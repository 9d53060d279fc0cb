//! Opening transports to an endpoint.
//!
//! 打开到端点的传输。

use crate::stream::{ByteSink, ByteSource};
use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use std::{fmt::Debug, io, time::Duration};
use tokio::net::TcpStream;
use tracing::debug;

/// The two halves of a freshly dialed transport.
///
/// 新拨号传输的两个半部。
pub struct DialedStreams {
    pub reader: Box<dyn ByteSource>,
    pub writer: Box<dyn ByteSink>,
}

impl Debug for DialedStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialedStreams").finish_non_exhaustive()
    }
}

/// Establishes a transport to an endpoint.
///
/// Implementations only open the transport; the dial timeout and lifetime
/// cancellation are applied by the connection around `dial`.
///
/// 建立到端点的传输。
#[async_trait]
pub trait Dialer: Send + Sync + Debug + 'static {
    /// Opens a new transport to `endpoint`.
    /// 打开到 `endpoint` 的新传输。
    async fn dial(&self, endpoint: &str) -> io::Result<DialedStreams>;
}

/// Dials plain TCP with `TCP_NODELAY` and keep-alive enabled.
///
/// 使用 `TCP_NODELAY` 和保活拨号普通TCP。
#[derive(Debug, Clone)]
pub struct TcpDialer {
    keep_alive: Duration,
}

impl TcpDialer {
    pub fn new(keep_alive: Duration) -> Self {
        Self { keep_alive }
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)?;

        let keepalive = TcpKeepalive::new().with_time(self.keep_alive);
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "windows"
        ))]
        let keepalive = keepalive.with_interval(self.keep_alive);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, endpoint: &str) -> io::Result<DialedStreams> {
        let stream = TcpStream::connect(endpoint).await?;
        self.configure(&stream)?;
        debug!(
            endpoint,
            local_addr = ?stream.local_addr().ok(),
            "TCP connection established"
        );

        let (reader, writer) = stream.into_split();
        Ok(DialedStreams {
            reader: Box::new(reader),
            writer: Box::new(writer),
        })
    }
}

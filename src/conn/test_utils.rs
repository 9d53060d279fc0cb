//! Mock dialers and in-memory transports for connection tests.

use crate::{
    config::ConnConfig,
    conn::RpcConn,
    dialer::{DialedStreams, Dialer},
    stream::WithDeadline,
};
use async_trait::async_trait;
use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
    time::Duration,
};
use tokio::io::{duplex, split, DuplexStream};

pub const PIPE_CAPACITY: usize = 1024;

/// Helper to initialize tracing for tests.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "kestrel_rpc=debug".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A dialer that hands out in-memory transports and counts its dials.
///
/// Each successful dial keeps the peer end so tests can talk to the
/// connection through [`MockDialer::take_peer`].
#[derive(Debug, Clone, Default)]
pub struct MockDialer {
    dials: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    delay: Duration,
    hang: bool,
    peers: Arc<Mutex<Vec<DuplexStream>>>,
}

impl MockDialer {
    /// Succeeds after `delay`.
    pub fn succeeding(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Refuses the first `failures` dials, then succeeds.
    pub fn refusing(failures: usize) -> Self {
        Self {
            failures_left: Arc::new(AtomicUsize::new(failures)),
            ..Default::default()
        }
    }

    /// Never completes a dial.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// The peer end of the most recent successful dial.
    pub fn take_peer(&self) -> Option<DuplexStream> {
        self.peers.lock().unwrap().pop()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, endpoint: &str) -> io::Result<DialedStreams> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("mock refused {endpoint}"),
            ));
        }

        let (local, peer) = duplex(PIPE_CAPACITY);
        self.peers.lock().unwrap().push(peer);
        let (reader, writer) = split(local);
        Ok(DialedStreams {
            reader: Box::new(WithDeadline(reader)),
            writer: Box::new(WithDeadline(writer)),
        })
    }
}

/// Builds a `Ready` connection over an in-memory pipe whose transport
/// supports deadlines. Returns the peer end of the pipe.
pub fn pipe_conn(config: ConnConfig, capacity: usize) -> (RpcConn, DuplexStream) {
    let (local, peer) = duplex(capacity);
    let (reader, writer) = split(local);
    let conn = RpcConn::builder("mock:0")
        .config(config)
        .build_with_streams(WithDeadline(reader), WithDeadline(writer));
    (conn, peer)
}

/// Builds an `Init` connection that dials through `dialer`.
pub fn mock_conn(dialer: &MockDialer, config: ConnConfig) -> Arc<RpcConn> {
    Arc::new(
        RpcConn::builder("mock:0")
            .config(config)
            .dialer(dialer.clone())
            .build(),
    )
}

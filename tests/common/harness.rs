//! tests/common/harness.rs
use std::net::SocketAddr;
use std::time::Duration;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Once,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "kestrel_rpc=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// How the test server treats each accepted connection.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Echo every byte back.
    Echo,
    /// Read and discard, never reply.
    Silent,
    /// Close the connection right after accepting it.
    HangUp,
}

/// A TCP server on an ephemeral port that counts accepted connections.
pub struct TestServer {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(mode: Mode) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tracing::info!(%peer, ?mode, "Test server accepted connection");

                match mode {
                    Mode::Echo => {
                        tokio::spawn(async move {
                            let (mut reader, mut writer) = stream.into_split();
                            let _ = tokio::io::copy(&mut reader, &mut writer).await;
                        });
                    }
                    Mode::Silent => {
                        tokio::spawn(async move {
                            let mut stream = stream;
                            let mut buf = [0u8; 1024];
                            while let Ok(n) = stream.read(&mut buf).await {
                                if n == 0 {
                                    break;
                                }
                            }
                        });
                    }
                    Mode::HangUp => drop(stream),
                }
            }
        });

        Self {
            addr,
            accepted,
            task,
        }
    }

    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Waits up to a second for the accept loop to catch up with the
    /// client side, then returns the accept count.
    pub async fn wait_accepted(&self, expected: usize) -> usize {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while self.accepted() < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.accepted()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Returns an address on which nothing is listening.
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

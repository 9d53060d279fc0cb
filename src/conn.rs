//! Defines a single RPC connection to one endpoint.
//!
//! `RpcConn` owns at most one transport at a time and tracks its health in a
//! [`ConnState`]. All fields that change are kept in one small record behind a
//! reader/writer lock. The lock is never held across a dial, read or write:
//! each operation takes the lock to check and commit state, and releases it
//! for the blocking part.
//!
//! 定义到单个端点的RPC连接。
//!
//! `RpcConn` 同一时间最多拥有一个传输，并在 [`ConnState`] 中跟踪其健康状况。
//! 所有可变字段都保存在一个由读写锁保护的小记录中。拨号、读取或写入期间从不持有该锁。

pub mod state;

#[cfg(test)]
mod test_utils;

pub use state::ConnState;

use crate::{
    config::ConnConfig,
    dialer::{DialedStreams, Dialer, TcpDialer},
    error::{Direction, Error, Result},
    lifetime::Lifetime,
    stream::{ByteSink, ByteSource, Deadline, ReadStream, WriteStream},
};
use bytes::Bytes;
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CLOSE_REASON: &str = "RpcConn closed";

/// A transport and the adapters bound to it, installed as one unit.
///
/// 一个传输以及绑定到它的适配器，作为一个整体安装。
struct Installed {
    generation: u64,
    reader: Mutex<ReadStream>,
    writer: Mutex<WriteStream>,
    /// Cancelled when the unit is retired, waking every in-flight operation.
    /// 在该单元退役时取消，唤醒所有进行中的操作。
    retired: CancellationToken,
}

impl Installed {
    fn new(generation: u64, streams: DialedStreams, retired: CancellationToken) -> Self {
        Self {
            generation,
            reader: Mutex::new(ReadStream::new(streams.reader)),
            writer: Mutex::new(WriteStream::new(streams.writer)),
            retired,
        }
    }

    async fn read(&self, size: usize, deadline: Deadline) -> Result<Bytes> {
        tokio::select! {
            biased;
            _ = self.retired.cancelled() => Err(Error::ConnectionClosed),
            result = async { self.reader.lock().await.next(size, deadline).await } => result,
        }
    }

    async fn write(&self, buf: &[u8], deadline: Deadline) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.retired.cancelled() => Err(Error::ConnectionClosed),
            result = async { self.writer.lock().await.write(buf, deadline).await } => result,
        }
    }

    /// Aborts in-flight operations, then shuts down the write side. The
    /// transport itself is released once the last in-flight operation drops
    /// its handle.
    async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.retired.cancel();
        let shutdown = async { self.writer.lock().await.shutdown().await };
        tokio::time::timeout(timeout, shutdown)
            .await
            .map_err(|_| Error::DeadlineExceeded {
                direction: Direction::Write,
                timeout,
            })?
    }
}

/// The mutable part of a connection.
struct Shared {
    state: ConnState,
    installed: Option<Arc<Installed>>,
    generation: u64,
}

/// A connection to one RPC endpoint.
///
/// All methods take `&self` and are safe to call concurrently, typically by
/// sharing the connection in an `Arc`.
///
/// 到一个RPC端点的连接。所有方法都可以并发调用。
pub struct RpcConn {
    endpoint: String,
    config: ConnConfig,
    dialer: Arc<dyn Dialer>,
    lifetime: Lifetime,
    shared: RwLock<Shared>,
}

impl std::fmt::Debug for RpcConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.read();
        f.debug_struct("RpcConn")
            .field("endpoint", &self.endpoint)
            .field("state", &shared.state)
            .field("generation", &shared.generation)
            .field("config", &self.config)
            .field("dialer", &self.dialer)
            .finish()
    }
}

impl RpcConn {
    /// Creates an idle connection to `endpoint` in [`ConnState::Init`].
    ///
    /// The connection's lifetime is derived from `parent`: killing `parent`
    /// aborts this connection's dials and in-flight I/O.
    ///
    /// 创建一个处于 [`ConnState::Init`] 的空闲连接。
    pub fn new(parent: &Lifetime, endpoint: impl Into<String>) -> Self {
        Self::builder(endpoint).lifetime(parent).build()
    }

    /// Creates a connection that is already [`ConnState::Ready`] over the
    /// given streams, without dialing.
    ///
    /// 在给定的流上创建一个已经处于 [`ConnState::Ready`] 的连接，不进行拨号。
    pub fn with_streams(
        parent: &Lifetime,
        reader: impl ByteSource + 'static,
        writer: impl ByteSink + 'static,
    ) -> Self {
        Self::builder("").lifetime(parent).build_with_streams(reader, writer)
    }

    pub fn builder(endpoint: impl Into<String>) -> RpcConnBuilder {
        RpcConnBuilder {
            endpoint: endpoint.into(),
            config: ConnConfig::default(),
            dialer: None,
            lifetime: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn config(&self) -> &ConnConfig {
        &self.config
    }

    /// The lifetime scope owned by this connection.
    /// 此连接拥有的生命周期作用域。
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// Returns a snapshot of the current state.
    /// 返回当前状态的快照。
    pub fn state(&self) -> ConnState {
        self.shared.read().state
    }

    /// Dials the endpoint unless the connection is already `Ready` or another
    /// caller is dialing.
    ///
    /// Concurrent callers collapse into a single dial: the first one moves
    /// the state to `Connecting` and the rest return `Ok(())` immediately.
    /// On failure the state becomes `TransientFailure` and the error is
    /// returned; this method never retries.
    ///
    /// 拨号到端点，除非连接已经 `Ready` 或其他调用者正在拨号。
    /// 并发调用只会产生一次拨号。
    pub async fn connect(&self) -> Result<()> {
        {
            let mut shared = self.shared.write();
            if shared.state.is_terminal() {
                return Err(Error::ConnectionClosed);
            }
            if !shared.state.needs_dial() {
                // Ready, or another caller's dial is in flight.
                return Ok(());
            }
            self.transition(&mut shared, ConnState::Connecting);
        }

        debug!(endpoint = %self.endpoint, "Dialing");
        let result = self.dial().await;

        let mut shared = self.shared.write();
        match result {
            Ok(streams) => {
                if shared.state != ConnState::Connecting {
                    // A concurrent close won; the fresh transport is dropped here.
                    debug!(
                        endpoint = %self.endpoint,
                        state = %shared.state,
                        "Discarding dialed transport"
                    );
                    return Err(Error::ConnectionClosed);
                }
                let generation = self.install(&mut shared, streams);
                info!(endpoint = %self.endpoint, generation, "Connection ready");
                Ok(())
            }
            Err(err) => {
                if shared.state == ConnState::Connecting {
                    self.transition(&mut shared, ConnState::TransientFailure);
                }
                warn!(endpoint = %self.endpoint, error = %err, "Dial failed");
                Err(err)
            }
        }
    }

    /// Reads exactly `size` bytes.
    ///
    /// Fails with [`Error::NotReady`] unless the connection is `Ready`; it
    /// never dials implicitly. The read is bounded by the read timeout when
    /// the transport supports deadlines. Retryable failures leave the state
    /// untouched, anything else moves it to `TransientFailure`.
    ///
    /// A read timeout discards any bytes already received for this call while
    /// the connection stays `Ready`, so a retry after a timeout may start in
    /// the middle of a frame.
    ///
    /// The caller cannot cancel a read; [`close`](Self::close) aborts it.
    ///
    /// 读取恰好 `size` 个字节。调用者无法取消读取，只能通过关闭连接来中止。
    pub async fn read(&self, size: usize) -> Result<Bytes> {
        let (installed, deadline) = self.acquire(self.config.read_timeout)?;

        let result = installed.read(size, deadline).await;
        if let Err(err) = &result {
            if err.is_retryable() {
                debug!(endpoint = %self.endpoint, error = %err, "Retryable read failure");
            } else {
                self.fail(installed.generation, Direction::Read, err);
            }
        }
        result
    }

    /// Writes the entire buffer.
    ///
    /// Fails with [`Error::NotReady`] unless the connection is `Ready`. Every
    /// write error moves the state to `TransientFailure`.
    ///
    /// 写入整个缓冲区。任何写入错误都会使状态变为 `TransientFailure`。
    pub async fn write(&self, buf: &[u8]) -> Result<()> {
        let (installed, deadline) = self.acquire(self.config.write_timeout)?;
        if buf.is_empty() {
            return Ok(());
        }

        let result = installed.write(buf, deadline).await;
        if let Err(err) = &result {
            self.fail(installed.generation, Direction::Write, err);
        }
        result
    }

    /// Closes the connection.
    ///
    /// The state becomes `Closed` unconditionally, the installed transport
    /// (if any) is shut down exactly once, and the connection's lifetime is
    /// killed. The returned error only reports a failed shutdown. Calling it
    /// again is a no-op.
    ///
    /// 关闭连接。无论如何状态都会变为 `Closed`，返回的错误只报告关闭传输时的失败。
    pub async fn close(&self) -> Result<()> {
        let installed = {
            let mut shared = self.shared.write();
            if shared.state != ConnState::Closed {
                self.transition(&mut shared, ConnState::Closed);
            }
            shared.installed.take()
        };

        let result = match installed {
            Some(installed) => installed.shutdown(self.config.write_timeout).await,
            None => Ok(()),
        };
        if self.lifetime.kill(CLOSE_REASON) {
            info!(endpoint = %self.endpoint, "Connection closed");
        }
        if let Err(err) = &result {
            warn!(endpoint = %self.endpoint, error = %err, "Failed to shut down transport");
        }
        result
    }

    async fn dial(&self) -> Result<DialedStreams> {
        let timeout = self.config.dial_timeout;
        tokio::select! {
            biased;
            _ = self.lifetime.cancelled() => Err(Error::DialAborted {
                endpoint: self.endpoint.clone(),
                reason: self.lifetime.reason().unwrap_or_else(|| "lifetime killed".to_string()),
            }),
            result = tokio::time::timeout(timeout, self.dialer.dial(&self.endpoint)) => match result {
                Ok(Ok(streams)) => Ok(streams),
                Ok(Err(source)) => Err(Error::Dial {
                    endpoint: self.endpoint.clone(),
                    source,
                }),
                Err(_) => Err(Error::DialTimeout {
                    endpoint: self.endpoint.clone(),
                    timeout,
                }),
            },
        }
    }

    /// Checks for `Ready` and arms the deadline in the same instant.
    fn acquire(&self, timeout: Duration) -> Result<(Arc<Installed>, Deadline)> {
        let shared = self.shared.read();
        match (&shared.state, &shared.installed) {
            (ConnState::Ready, Some(installed)) => {
                Ok((installed.clone(), Deadline::after(timeout)))
            }
            _ => Err(Error::NotReady),
        }
    }

    fn install(&self, shared: &mut Shared, streams: DialedStreams) -> u64 {
        shared.generation += 1;
        let installed = Installed::new(shared.generation, streams, self.lifetime.token());
        shared.installed = Some(Arc::new(installed));
        self.transition(shared, ConnState::Ready);
        shared.generation
    }

    /// Moves a `Ready` connection to `TransientFailure` and retires its
    /// transport, unless the failing operation ran on a transport that has
    /// already been replaced or closed.
    fn fail(&self, generation: u64, direction: Direction, err: &Error) {
        let retired = {
            let mut shared = self.shared.write();
            let current = shared
                .installed
                .as_ref()
                .is_some_and(|installed| installed.generation == generation);
            if shared.state != ConnState::Ready || !current {
                return;
            }
            self.transition(&mut shared, ConnState::TransientFailure);
            shared.installed.take()
        };

        warn!(
            endpoint = %self.endpoint,
            generation,
            %direction,
            error = %err,
            "I/O failure, connection needs a re-dial"
        );
        if let Some(retired) = retired {
            retired.retired.cancel();
        }
    }

    fn transition(&self, shared: &mut Shared, next: ConnState) {
        let from = shared.state;
        debug_assert!(
            from.can_transition_to(next),
            "invalid state transition {from} -> {next}"
        );
        if !from.can_transition_to(next) {
            warn!(
                endpoint = %self.endpoint,
                from = %from,
                to = %next,
                "Invalid state transition attempted"
            );
            return;
        }
        if from != next {
            debug!(endpoint = %self.endpoint, from = %from, to = %next, "State transition");
        }
        shared.state = next;
    }
}

impl Drop for RpcConn {
    fn drop(&mut self) {
        // Stop anything still tied to this connection's lifetime.
        self.lifetime.kill("RpcConn dropped");
    }
}

/// Builds an [`RpcConn`] with non-default settings.
///
/// 使用非默认设置构建 [`RpcConn`]。
#[derive(Debug)]
pub struct RpcConnBuilder {
    endpoint: String,
    config: ConnConfig,
    dialer: Option<Arc<dyn Dialer>>,
    lifetime: Option<Lifetime>,
}

impl RpcConnBuilder {
    pub fn config(mut self, config: ConnConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the default [`TcpDialer`].
    /// 替换默认的 [`TcpDialer`]。
    pub fn dialer(mut self, dialer: impl Dialer) -> Self {
        self.dialer = Some(Arc::new(dialer));
        self
    }

    /// Derives the connection's lifetime from `parent` instead of a fresh root.
    /// 从 `parent` 派生连接的生命周期，而不是新的根作用域。
    pub fn lifetime(mut self, parent: &Lifetime) -> Self {
        self.lifetime = Some(parent.clone());
        self
    }

    /// Builds a connection in [`ConnState::Init`].
    pub fn build(self) -> RpcConn {
        let dialer: Arc<dyn Dialer> = match self.dialer {
            Some(dialer) => dialer,
            None => Arc::new(TcpDialer::new(self.config.keep_alive_interval)),
        };
        let lifetime = self.lifetime.unwrap_or_default().child();
        RpcConn {
            endpoint: self.endpoint,
            config: self.config,
            dialer,
            lifetime,
            shared: RwLock::new(Shared {
                state: ConnState::Init,
                installed: None,
                generation: 0,
            }),
        }
    }

    /// Builds a connection that is already [`ConnState::Ready`] over the given
    /// streams.
    pub fn build_with_streams(
        self,
        reader: impl ByteSource + 'static,
        writer: impl ByteSink + 'static,
    ) -> RpcConn {
        let conn = self.build();
        {
            let mut shared = conn.shared.write();
            shared.generation = 1;
            let installed = Installed::new(
                shared.generation,
                DialedStreams {
                    reader: Box::new(reader),
                    writer: Box::new(writer),
                },
                conn.lifetime.token(),
            );
            shared.installed = Some(Arc::new(installed));
            shared.state = ConnState::Ready;
        }
        conn
    }
}

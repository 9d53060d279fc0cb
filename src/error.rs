//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use std::time::Duration;
use thiserror::Error;

/// The I/O direction an operation was performing when it failed.
/// 操作失败时正在执行的I/O方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Pulling bytes from the transport.
    /// 从传输读取字节。
    Read,
    /// Pushing bytes into the transport.
    /// 向传输写入字节。
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// The primary error type for the RPC connection library.
/// RPC连接库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write was attempted while the connection was not `Ready`.
    /// 在连接未处于 `Ready` 状态时尝试了读或写。
    #[error("connection is not ready")]
    NotReady,

    /// The network dial failed.
    /// 网络拨号失败。
    #[error("failed to dial {endpoint}: {source}")]
    Dial {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The network dial did not complete within the configured dial timeout.
    /// 网络拨号未能在配置的超时时间内完成。
    #[error("dialing {endpoint} timed out after {timeout:?}")]
    DialTimeout { endpoint: String, timeout: Duration },

    /// The dial was aborted because the connection's lifetime was killed.
    /// 由于连接的生命周期被终止，拨号被中止。
    #[error("dialing {endpoint} was aborted: {reason}")]
    DialAborted { endpoint: String, reason: String },

    /// A read or write did not complete before its deadline.
    /// 读或写未能在截止时间之前完成。
    #[error("{direction} deadline of {timeout:?} exceeded")]
    DeadlineExceeded {
        direction: Direction,
        timeout: Duration,
    },

    /// The connection was closed, either before or during the operation.
    /// 连接在操作之前或期间被关闭。
    #[error("connection is closed")]
    ConnectionClosed,

    /// An underlying I/O error occurred.
    /// 发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the connection may be used again after this error without
    /// re-dialing. See [`crate::retry`].
    ///
    /// 发生此错误后，连接是否可以无需重新拨号而继续使用。
    pub fn is_retryable(&self) -> bool {
        crate::retry::is_retryable(self)
    }

    /// Whether this error came out of the dial step.
    /// 此错误是否来自拨号步骤。
    pub fn is_dial_failure(&self) -> bool {
        matches!(
            self,
            Error::Dial { .. } | Error::DialTimeout { .. } | Error::DialAborted { .. }
        )
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::Dial { source, .. } => source,
            Error::NotReady => ErrorKind::NotConnected.into(),
            Error::DialTimeout { .. } => ErrorKind::TimedOut.into(),
            Error::DialAborted { .. } => ErrorKind::ConnectionAborted.into(),
            Error::DeadlineExceeded { .. } => ErrorKind::TimedOut.into(),
            Error::ConnectionClosed => ErrorKind::ConnectionAborted.into(),
        }
    }
}

//! Classifies I/O failures as retryable or fatal for the connection.
//!
//! A retryable failure leaves the connection usable: the caller may issue the
//! same operation again on the same socket. Anything else means the socket
//! should be re-dialed before further use.
//!
//! 将I/O失败分类为可重试或对连接致命。

use crate::error::{Direction, Error};
use std::io::ErrorKind;

/// Returns whether a low-level I/O error is transient.
///
/// 返回底层I/O错误是否是暂时的。
pub fn is_retryable_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// Returns whether a connection error is transient.
///
/// Only read deadline expiry and retryable raw I/O errors qualify. Dial
/// failures, `NotReady` and `ConnectionClosed` are never retryable on the
/// same connection.
///
/// 返回连接错误是否是暂时的。
pub fn is_retryable(err: &Error) -> bool {
    match err {
        Error::DeadlineExceeded {
            direction: Direction::Read,
            ..
        } => true,
        Error::DeadlineExceeded {
            direction: Direction::Write,
            ..
        } => false,
        Error::Io(e) => is_retryable_io(e),
        Error::NotReady
        | Error::ConnectionClosed
        | Error::Dial { .. }
        | Error::DialTimeout { .. }
        | Error::DialAborted { .. } => false,
    }
}

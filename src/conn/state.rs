//! Defines the lifecycle state machine of an RPC connection.
//!
//! 定义RPC连接的生命周期状态机。

use std::fmt;

/// The lifecycle state of an [`RpcConn`](crate::conn::RpcConn).
/// [`RpcConn`](crate::conn::RpcConn) 的生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    /// The state a connection starts from.
    /// 连接的初始状态。
    Init,
    /// A dial is in flight.
    /// 拨号正在进行中。
    Connecting,
    /// A transport is installed and reads/writes are allowed.
    /// 传输已安装，允许读写。
    Ready,
    /// A previous dial or I/O operation failed. A re-dial is warranted.
    /// 之前的拨号或I/O操作失败，需要重新拨号。
    TransientFailure,
    /// `close` was called. Terminal.
    /// 已调用 `close`，终态。
    Closed,
}

impl ConnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::Init => "ConnStateInit",
            ConnState::Connecting => "ConnStateConnecting",
            ConnState::Ready => "ConnStateReady",
            ConnState::TransientFailure => "ConnStateTransientFailure",
            ConnState::Closed => "ConnStateClosed",
        }
    }

    /// Whether `connect` should start a new dial from this state.
    /// 从此状态调用 `connect` 是否应开始新的拨号。
    pub fn needs_dial(&self) -> bool {
        matches!(self, ConnState::Init | ConnState::TransientFailure)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnState::Closed)
    }

    /// Validate if a transition is legal.
    /// 验证状态转换是否合法。
    pub fn can_transition_to(&self, next: ConnState) -> bool {
        use ConnState::*;

        match (self, next) {
            (Closed, Closed) => true,
            (Closed, _) => false,
            (_, Closed) => true,

            (Init, Connecting) => true,
            (TransientFailure, Connecting) => true,
            (Connecting, Ready) => true,
            (Connecting, TransientFailure) => true,
            (Ready, TransientFailure) => true,

            (a, b) => *a == b,
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

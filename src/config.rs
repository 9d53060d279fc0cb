//! 定义了连接的可配置参数。
//! Defines configurable parameters for connections.

use std::time::Duration;

/// Timing parameters for a single RPC connection.
///
/// 单个RPC连接的计时参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnConfig {
    /// The maximum time a dial may take before it is abandoned.
    /// 拨号被放弃前允许的最长时间。
    pub dial_timeout: Duration,
    /// The TCP keep-alive interval applied to dialed sockets.
    /// 应用于已拨号套接字的TCP保活间隔。
    pub keep_alive_interval: Duration,
    /// The deadline armed before every read.
    /// 每次读取前设置的截止时间。
    pub read_timeout: Duration,
    /// The deadline armed before every write.
    /// 每次写入前设置的截止时间。
    pub write_timeout: Duration,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
        }
    }
}

#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The transport-layer connection manager for the RPC client.
//! RPC客户端的传输层连接管理器。
//!
//! An [`RpcConn`] keeps one TCP connection to one endpoint, moves opaque byte
//! buffers over it with per-call deadlines and reports its health as a
//! [`ConnState`]. Every operation is safe to call concurrently.

pub mod config;
pub mod conn;
pub mod dialer;
pub mod error;
pub mod lifetime;
pub mod retry;
pub mod stream;

pub use config::ConnConfig;
pub use conn::{ConnState, RpcConn, RpcConnBuilder};
pub use dialer::{DialedStreams, Dialer, TcpDialer};
pub use error::{Error, Result};
pub use lifetime::Lifetime;

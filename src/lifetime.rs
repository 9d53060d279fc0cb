//! A hierarchical cancellation scope shared by all work of a connection.
//!
//! A [`Lifetime`] is killed at most once. Killing it cancels every scope
//! derived from it with [`Lifetime::child`], so a pool can shut down all of
//! its connections by killing one root. Killing a child never reaches its
//! parent.
//!
//! 连接所有工作共享的分层取消作用域。

use std::sync::{Arc, OnceLock};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A cancellation scope with a recorded kill reason.
///
/// 带有终止原因记录的取消作用域。
#[derive(Debug, Clone)]
pub struct Lifetime {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
    parent: Option<Box<Lifetime>>,
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifetime {
    /// Creates a new root scope.
    /// 创建一个新的根作用域。
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            parent: None,
        }
    }

    /// Derives a child scope that is killed together with `self`.
    /// 派生一个随 `self` 一起被终止的子作用域。
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::new(OnceLock::new()),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Kills this scope and every scope derived from it.
    ///
    /// Returns `true` if this call performed the kill. Later calls keep the
    /// first reason.
    ///
    /// 终止此作用域及其派生的所有作用域。
    pub fn kill(&self, reason: impl Into<String>) -> bool {
        let first = self.reason.set(reason.into()).is_ok();
        self.token.cancel();
        first
    }

    /// Whether this scope, or any of its ancestors, has been killed.
    /// 此作用域或其任何祖先是否已被终止。
    pub fn is_killed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason this scope was killed, inherited from the nearest killed
    /// ancestor when it was not killed directly.
    ///
    /// 此作用域被终止的原因。
    pub fn reason(&self) -> Option<String> {
        if !self.is_killed() {
            return None;
        }
        if let Some(reason) = self.reason.get() {
            return Some(reason.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.reason())
    }

    /// Resolves once this scope is killed.
    /// 在此作用域被终止时完成。
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A token for background work that must stop with this scope.
    /// 用于必须随此作用域停止的后台工作的令牌。
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

//! Call context and progress traits
//!
//! These allow the engine to be driven without depending on a specific
//! terminal UI or signal handling implementation.

use crate::kind::ResourceKind;
use crate::store::RemoteError;
use crate::types::InstanceResult;
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared flag used to abort in-flight work
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context passed to every remote call
///
/// Carries a cancellation token and an optional deadline. Once either
/// fires, no further remote call is issued.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`RemoteError::Cancelled`] if the context is done
    pub fn check(&self) -> Result<(), RemoteError> {
        if self.is_cancelled() {
            Err(RemoteError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress callback for batch execution
///
/// During same-level parallel execution, `on_instance_start` is not called
/// and completions are reported after each level finishes.
pub trait ProgressCallback {
    /// Called when a batch of `count` instances starts
    fn on_batch_start(&mut self, count: usize);

    /// Called before an instance is reconciled
    fn on_instance_start(&mut self, key: &str, kind: ResourceKind);

    /// Called with the result of each instance, including short-circuited ones
    fn on_instance_complete(&mut self, result: &InstanceResult);

    /// Called when the batch completes
    fn on_batch_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_instance_start(&mut self, _key: &str, _kind: ResourceKind) {}
    fn on_instance_complete(&mut self, _result: &InstanceResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Confirmation callback for user interaction
///
/// Consulted once per batch, after the preview has been shown and before
/// any mutation.
pub trait ConfirmCallback {
    /// Ask the user to confirm an action; `true` proceeds
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let ctx = CallContext::new();
        let token = ctx.cancel_token().clone();
        assert!(ctx.check().is_ok());

        token.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.check(), Err(RemoteError::Cancelled));
    }

    #[test]
    fn test_expired_deadline_cancels() {
        let ctx = CallContext::new().with_deadline(Instant::now());
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_no_deadline() {
        let ctx = CallContext::new();
        assert_eq!(ctx.remaining(), None);
        assert!(!ctx.is_cancelled());
    }
}

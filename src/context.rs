//! Cancellation and deadline propagation for function calls.
//!
//! A [`Context`] is a cheap, cloneable handle that becomes *done* when it is
//! cancelled, when its deadline passes, or when any ancestor becomes done.
//! Children are derived with [`Context::with_cancel`] or
//! [`Context::with_timeout`], which hand back a [`CancelGuard`]. Dropping the
//! guard cancels the child, so a derived context is always released on every
//! exit path, unwinding included.
//!
//! Function bodies observe cancellation cooperatively:
//!
//! ```
//! use nixai::context::Context;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (ctx, _guard) = Context::background().with_timeout(Duration::from_millis(10));
//! let slow = tokio::time::sleep(Duration::from_secs(5));
//! let outcome = ctx.run(slow).await;
//! assert!(outcome.is_err());
//! # }
//! ```

use crate::error::ContextError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    parent: Option<Context>,
    deadline: Option<Instant>,
    state: watch::Sender<Option<ContextError>>,
}

impl Context {
    /// A root context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::new(None, None)
    }

    fn new(parent: Option<Context>, deadline: Option<Instant>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                parent,
                deadline,
                state,
            }),
        }
    }

    pub fn with_cancel(&self) -> (Context, CancelGuard) {
        let child = Self::new(Some(self.clone()), self.deadline());
        let guard = CancelGuard { ctx: child.clone() };
        (child, guard)
    }

    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelGuard) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child that expires at `deadline`, or at the parent's
    /// deadline if that comes first.
    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelGuard) {
        let deadline = match self.deadline() {
            Some(inherited) if inherited < deadline => inherited,
            _ => deadline,
        };
        let child = Self::new(Some(self.clone()), Some(deadline));
        let guard = CancelGuard { ctx: child.clone() };
        (child, guard)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Reports why the context is done without waiting, or `None` while it
    /// is still live.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(err) = *self.inner.state.borrow() {
            return Some(err);
        }
        if let Some(err) = self.inner.parent.as_ref().and_then(Context::err) {
            return Some(err);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is done, yielding the reason.
    pub fn done(&self) -> Pin<Box<dyn Future<Output = ContextError> + Send + 'static>> {
        let mut state = self.inner.state.subscribe();
        let parent = self.inner.parent.clone();
        let deadline = self.inner.deadline;

        Box::pin(async move {
            let cancelled = async move {
                let outcome = state
                    .wait_for(Option::is_some)
                    .await
                    .map(|state| (*state).unwrap_or(ContextError::Canceled));
                match outcome {
                    Ok(err) => err,
                    // every handle is gone, nobody can cancel any more
                    Err(_) => std::future::pending().await,
                }
            };
            let parent_done = async move {
                match parent {
                    Some(parent) => parent.done().await,
                    None => std::future::pending().await,
                }
            };
            let expired = async move {
                match deadline {
                    Some(deadline) => {
                        tokio::time::sleep_until(deadline).await;
                        ContextError::DeadlineExceeded
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                err = cancelled => err,
                err = parent_done => err,
                err = expired => err,
            }
        })
    }

    /// Drives `fut` to completion unless the context finishes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            output = fut => Ok(output),
        }
    }

    fn cancel(&self, reason: ContextError) {
        self.inner.state.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

/// Cancels its derived [`Context`] when [`cancel`](CancelGuard::cancel) is
/// called or when the guard is dropped.
#[derive(Debug)]
pub struct CancelGuard {
    ctx: Context,
}

impl CancelGuard {
    pub fn cancel(&self) {
        self.ctx.cancel(ContextError::Canceled);
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

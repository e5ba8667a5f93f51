//! Success/failure plumbing shared by every actor
//!
//! [`Outcome`] is the synchronous form: a plain `Result` whose error side is
//! always [`RecError`], so the standard `map` / `and_then` / `ok()` combinators
//! apply unchanged. [`OutcomeExt`] adds `filter_or` and `recover`.
//!
//! [`AsyncOutcome`] is a single-resolution future of an `Outcome`. Workers
//! resolve it through a [`Completer`], which is consumed on use, so a reply can
//! be sent at most once. Combinators short-circuit: the first failure in a
//! chain is the failure the caller sees.

use crate::error::RecError;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Result of any service operation
pub type Outcome<T> = std::result::Result<T, RecError>;

/// Extra combinators for [`Outcome`]
pub trait OutcomeExt<T> {
    /// Keep a success only when `predicate` holds; otherwise fail with `on_reject`
    fn filter_or<P, E>(self, predicate: P, on_reject: E) -> Outcome<T>
    where
        P: FnOnce(&T) -> bool,
        E: FnOnce(&T) -> RecError;

    /// Turn selected failures back into a value
    ///
    /// Failures for which `handler` returns `None` pass through untouched.
    fn recover<F>(self, handler: F) -> Outcome<T>
    where
        F: FnOnce(&RecError) -> Option<T>;
}

impl<T> OutcomeExt<T> for Outcome<T> {
    fn filter_or<P, E>(self, predicate: P, on_reject: E) -> Outcome<T>
    where
        P: FnOnce(&T) -> bool,
        E: FnOnce(&T) -> RecError,
    {
        match self {
            Ok(value) if predicate(&value) => Ok(value),
            Ok(value) => Err(on_reject(&value)),
            Err(err) => Err(err),
        }
    }

    fn recover<F>(self, handler: F) -> Outcome<T>
    where
        F: FnOnce(&RecError) -> Option<T>,
    {
        match self {
            Ok(value) => Ok(value),
            Err(err) => match handler(&err) {
                Some(value) => Ok(value),
                None => Err(err),
            },
        }
    }
}

/// Write side of a pending [`AsyncOutcome`]
pub struct Completer<T> {
    tx: oneshot::Sender<Outcome<T>>,
}

impl<T> Completer<T> {
    /// Resolve the paired `AsyncOutcome`
    ///
    /// Returns `false` when the waiting side has already gone away.
    pub fn complete(self, outcome: Outcome<T>) -> bool {
        self.tx.send(outcome).is_ok()
    }

    /// True once the waiting side has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

/// Non-blocking view of an [`AsyncOutcome`]
pub enum Attempt<T> {
    /// Not resolved yet; the outcome is handed back so it can still be awaited
    Pending(AsyncOutcome<T>),
    Success(T),
    Failure(RecError),
}

impl<T> Attempt<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Attempt::Pending(_))
    }
}

/// Single-resolution future of an [`Outcome`]
#[must_use = "an AsyncOutcome does nothing unless awaited"]
pub struct AsyncOutcome<T> {
    inner: BoxFuture<'static, Outcome<T>>,
}

impl<T: Send + 'static> AsyncOutcome<T> {
    /// Create an unresolved outcome and the completer that resolves it
    ///
    /// Dropping the completer without completing resolves the outcome to
    /// [`RecError::WorkerRetired`].
    pub fn pending() -> (Completer<T>, Self) {
        let (tx, rx) = oneshot::channel();
        let inner = async move { rx.await.unwrap_or(Err(RecError::WorkerRetired)) }.boxed();
        (Completer { tx }, Self { inner })
    }

    /// Already-resolved outcome
    pub fn ready(outcome: Outcome<T>) -> Self {
        Self {
            inner: futures::future::ready(outcome).boxed(),
        }
    }

    pub fn failed(err: RecError) -> Self {
        Self::ready(Err(err))
    }

    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    pub fn map<U, F>(self, f: F) -> AsyncOutcome<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        AsyncOutcome::from_future(async move { self.await.map(f) })
    }

    /// Chain another asynchronous step; skipped when `self` fails
    pub fn and_then<U, F>(self, f: F) -> AsyncOutcome<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> AsyncOutcome<U> + Send + 'static,
    {
        AsyncOutcome::from_future(async move {
            match self.await {
                Ok(value) => f(value).await,
                Err(err) => Err(err),
            }
        })
    }

    /// Asynchronous counterpart of [`OutcomeExt::recover`]
    pub fn recover<F>(self, handler: F) -> AsyncOutcome<T>
    where
        F: FnOnce(&RecError) -> Option<T> + Send + 'static,
    {
        AsyncOutcome::from_future(async move { self.await.recover(handler) })
    }

    /// Fail with [`RecError::Timeout`] if no reply arrives within `limit`
    pub fn with_timeout(self, limit: Duration) -> AsyncOutcome<T> {
        AsyncOutcome::from_future(async move {
            match tokio::time::timeout(limit, self).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RecError::Timeout(limit)),
            }
        })
    }

    /// Inspect the outcome without waiting
    pub fn attempt(mut self) -> Attempt<T> {
        match (&mut self.inner).now_or_never() {
            Some(Ok(value)) => Attempt::Success(value),
            Some(Err(err)) => Attempt::Failure(err),
            None => Attempt::Pending(self),
        }
    }
}

impl<T> Future for AsyncOutcome<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for AsyncOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncOutcome { .. }")
    }
}

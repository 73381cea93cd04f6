//! Deadline and cancellation plumbing.
//!
//! Every protocol operation takes a [`CallContext`]. Lock acquisitions and
//! in-flight calls race against it, so nothing waits past the caller's
//! deadline or after the caller has cancelled.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineExceeded,
    Cancelled,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Deadline plus cancellation token, cheap to clone.
#[derive(Clone, Debug)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// No deadline; only explicit cancellation stops it.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// A context cancelled together with `self`, with the earlier of the
    /// two deadlines.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `Some(reason)` once the context can no longer start work.
    pub fn interrupted(&self) -> Option<Interrupted> {
        if self.cancel.is_cancelled() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the deadline passes or the context is cancelled.
    pub async fn done(&self) -> Interrupted {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = tokio::time::sleep_until(deadline) => Interrupted::DeadlineExceeded,
                _ = self.cancel.cancelled() => Interrupted::Cancelled,
            },
            None => {
                self.cancel.cancelled().await;
                Interrupted::Cancelled
            }
        }
    }

    /// Drive `fut` unless the context ends first. A context that has
    /// already ended never polls `fut`.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if let Some(reason) = self.interrupted() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            out = fut => Ok(out),
            reason = self.done() => Err(reason),
        }
    }
}

/// An async mutex whose acquisition is bounded by a [`CallContext`].
#[derive(Debug, Default)]
pub struct DeadlineMutex<T> {
    inner: Mutex<T>,
}

impl<T> DeadlineMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Wait for the lock, giving up when `ctx` ends.
    pub async fn lock(&self, ctx: &CallContext) -> Result<MutexGuard<'_, T>, Interrupted> {
        ctx.run(self.inner.lock()).await
    }
}

/// One lock per key, bounded by a [`CallContext`] like [`DeadlineMutex`].
///
/// Holders of different keys never wait on each other. A key's slot is
/// dropped once nobody holds or waits for it.
pub struct KeyedLock<K> {
    slots: std::sync::Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Wait for the lock on `key`, giving up when `ctx` ends.
    pub async fn lock(&self, ctx: &CallContext, key: K) -> Result<KeyGuard<'_, K>, Interrupted> {
        let slot = {
            // The map only holds Arcs, so a poisoned lock leaves nothing half-written.
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let mut guard = KeyGuard {
            owner: self,
            key,
            held: None,
        };
        guard.held = Some(ctx.run(slot.lock_owned()).await?);
        Ok(guard)
    }

    /// Keys currently held or waited for.
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one key of a [`KeyedLock`] until dropped.
pub struct KeyGuard<'a, K: Eq + Hash> {
    owner: &'a KeyedLock<K>,
    key: K,
    held: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut slots = self.owner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.key);
        }
    }
}

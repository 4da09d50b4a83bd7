//! Cancellation token for cooperative cancellation
//!
//! Workers and pools check their token at loop checkpoints and exit
//! gracefully. Tokens form parent-child trees: cancelling a parent cancels
//! every descendant, while cancelling a child leaves its parent and siblings
//! running.

use core::sync::atomic::{AtomicBool, Ordering};
use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// Token for checking, awaiting and triggering cancellation
///
/// Cancellation is one-shot and broadcast: once fired, every clone and every
/// child observes it, and every thread blocked in [`wait`](Self::wait) or
/// selecting on [`done`](Self::done) is released. Nothing is interrupted;
/// holders notice cancellation only where they look for it.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    /// Cancellation flag
    cancelled: AtomicBool,

    /// Parent token (if any)
    parent: Option<CancellationToken>,

    /// Never sent on. Dropping it disconnects `done_rx`, which is what wakes
    /// blocked receivers.
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,

    /// Children to cascade into
    children: Mutex<Vec<Weak<TokenInner>>>,
}

impl TokenInner {
    fn new(parent: Option<CancellationToken>) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            parent,
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        // The flag goes up before the children are taken, so a child registered
        // concurrently either lands in the list below or sees the flag itself.
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        self.done_tx.lock().take();

        let children = mem::take(&mut *self.children.lock());
        for child in children {
            if let Some(child) = child.upgrade() {
                child.cancel();
            }
        }
    }
}

impl CancellationToken {
    /// Create a new root token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner::new(None)),
        }
    }

    /// Create a child token linked to this one
    ///
    /// Cancelling this token cancels the child. Cancelling the child does
    /// not affect this token or any other child.
    pub fn child(&self) -> Self {
        let child = Self {
            inner: Arc::new(TokenInner::new(Some(self.clone()))),
        };

        {
            let mut children = self.inner.children.lock();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        if self.is_cancelled() {
            child.cancel();
        }

        child
    }

    /// Check if cancellation was requested
    ///
    /// Also checks parent tokens recursively.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match self.inner.parent {
            Some(ref parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Request cancellation
    ///
    /// Idempotent. Propagates to all descendants, never to the parent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Receiver that becomes ready (disconnected) once this token is cancelled
    ///
    /// Intended for `crossbeam_channel::select!`:
    ///
    /// ```ignore
    /// select! {
    ///     recv(token.done()) -> _ => break,
    ///     recv(work) -> job => run(job),
    /// }
    /// ```
    #[inline]
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }

    /// Block until cancelled
    pub fn wait(&self) {
        // Nothing is ever sent, so this only returns on disconnect.
        let _ = self.inner.done_rx.recv();
    }

    /// Block until cancelled or until `timeout` elapses
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_cancelled(),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

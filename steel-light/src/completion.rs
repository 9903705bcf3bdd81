//! Completion signals for queued light batches.
//!
//! Every request that lands in the same batch receives a clone of one
//! [`CompletionSignal`]. The batch resolves it exactly once, either after it was
//! applied or when it was abandoned because its chunk unloaded.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    FutureExt,
    channel::oneshot,
    future::Shared,
};

/// How a batch finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was propagated.
    Applied,
    /// The batch was dropped without touching any light data.
    Abandoned,
}

/// Creates a connected completer/signal pair.
#[must_use]
pub fn completion_pair() -> (Completer, CompletionSignal) {
    let (sender, receiver) = oneshot::channel();
    (
        Completer {
            sender: Some(sender),
        },
        CompletionSignal {
            inner: receiver.shared(),
        },
    )
}

/// The resolving half of a completion signal.
///
/// Dropping it without calling [`Completer::complete`] resolves the signal as
/// [`BatchOutcome::Abandoned`].
#[derive(Debug)]
pub struct Completer {
    sender: Option<oneshot::Sender<BatchOutcome>>,
}

impl Completer {
    /// Resolves the signal.
    pub fn complete(mut self, outcome: BatchOutcome) {
        if let Some(sender) = self.sender.take() {
            // Nobody listening is fine
            let _ = sender.send(outcome);
        }
    }
}

/// A cloneable future resolving to the [`BatchOutcome`] of a batch.
#[derive(Clone)]
#[must_use = "a completion signal does nothing unless awaited or inspected"]
pub struct CompletionSignal {
    inner: Shared<oneshot::Receiver<BatchOutcome>>,
}

impl CompletionSignal {
    /// A signal that is already resolved.
    pub fn resolved(outcome: BatchOutcome) -> Self {
        let (completer, signal) = completion_pair();
        completer.complete(outcome);
        signal
    }

    /// The outcome if the batch has finished, without blocking.
    #[must_use]
    pub fn try_outcome(&self) -> Option<BatchOutcome> {
        self.inner
            .clone()
            .now_or_never()
            .map(|result| result.unwrap_or(BatchOutcome::Abandoned))
    }

    /// Whether the batch has finished.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.try_outcome().is_some()
    }

    /// Blocks the current thread until the batch finishes.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> BatchOutcome {
        futures::executor::block_on(self)
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("outcome", &self.try_outcome())
            .finish()
    }
}

impl Future for CompletionSignal {
    type Output = BatchOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner
            .poll_unpin(cx)
            .map(|result| result.unwrap_or(BatchOutcome::Abandoned))
    }
}

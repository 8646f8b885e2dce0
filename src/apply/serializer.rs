//! One-at-a-time execution of change-sets.
//!
//! The managed directory and the reload command are shared by every request. A single worker
//! task owns the [`ChangeApplier`] and takes batches off a FIFO channel, so "is anything running"
//! and "start the next batch" are the same step: the worker finishing its current batch and
//! receiving the next one. Submitters get a [`PendingApply`] that resolves once their own batch
//! has been applied.
//!
//! There is no cancellation. A batch that was submitted runs even if its submitter stops waiting.

use crate::apply::{ChangeApplier, Changes};
use crate::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

struct Job {
    changes: Changes,
    done: oneshot::Sender<Result<(), Error>>,
}

/// Handle for submitting change-sets to the single applier worker.
///
/// Cloning the handle is cheap; all clones feed the same queue. The worker stops once every
/// handle has been dropped and the queue has drained.
#[derive(Clone)]
pub struct MutationSerializer {
    jobs: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

/// The outcome of a submitted change-set, available once the worker has applied it.
#[must_use = "the change-set is applied regardless, but its result is only seen by awaiting"]
pub struct PendingApply {
    result: oneshot::Receiver<Result<(), Error>>,
}

impl MutationSerializer {
    /// Start the worker task. Must be called from within a Tokio runtime.
    pub fn spawn(applier: ChangeApplier) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn(run(applier, queue, Arc::clone(&pending)));
        Self { jobs, pending }
    }

    /// Queue a change-set behind any that were submitted earlier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializerClosed`] if the worker is no longer running.
    pub fn submit(&self, changes: Changes) -> Result<PendingApply, Error> {
        let (done, result) = oneshot::channel();
        let ahead = self.pending.fetch_add(1, Ordering::SeqCst);
        if ahead > 0 {
            tracing::debug!(queue_length = ahead, "update in progress, queueing change-set");
        }
        if self.jobs.send(Job { changes, done }).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::SerializerClosed);
        }
        Ok(PendingApply { result })
    }

    /// Queue a change-set and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns whatever [`ChangeApplier::apply`] returned for this change-set, or
    /// [`Error::SerializerClosed`].
    pub async fn apply(&self, changes: Changes) -> Result<(), Error> {
        self.submit(changes)?.await
    }

    /// Number of change-sets submitted but not yet finished, including the one running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Future for PendingApply {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Error::SerializerClosed)))
    }
}

async fn run(
    applier: ChangeApplier,
    mut queue: mpsc::UnboundedReceiver<Job>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(Job { changes, done }) = queue.recv().await {
        let res = applier.apply(&changes).await;
        if let Err(err) = &res {
            tracing::error!("failed to apply DNS changes: {err}");
        }
        pending.fetch_sub(1, Ordering::SeqCst);
        if done.send(res).is_err() {
            tracing::debug!("submitter stopped waiting before its change-set was applied");
        }
    }
    tracing::debug!("change-set serializer stopped");
}

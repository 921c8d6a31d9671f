use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use spool_store::EnvelopeStore;
use spool_types::Envelope;
use spool_worker::BackgroundWorker;
use tracing::{debug, warn};

use crate::error::SendError;
use crate::sender::Sender;

/// Snapshot of delivery counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Sends that succeeded.
    pub delivered: u64,
    /// Sends that failed.
    pub failed: u64,
    /// Failed envelopes written to the store.
    pub staged: u64,
    /// Failed envelopes lost: the worker rejected the save or the envelope had no identity.
    pub dropped: u64,
    /// Failed diagnostic-only envelopes, never staged.
    pub diagnostic_skipped: u64,
    /// Store I/O failures during staging or cleanup.
    pub store_errors: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    staged: AtomicU64,
    dropped: AtomicU64,
    diagnostic_skipped: AtomicU64,
    store_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            staged: self.staged.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            diagnostic_skipped: self.diagnostic_skipped.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

/// Wraps a [`Sender`], staging failed envelopes and cleaning up delivered ones.
///
/// Cheap to clone; clones share the sender, store, worker and counters.
#[derive(Clone)]
pub struct DeliveryInterceptor {
    sender: Arc<dyn Sender>,
    store: Arc<dyn EnvelopeStore>,
    worker: Arc<BackgroundWorker>,
    counters: Arc<Counters>,
}

impl DeliveryInterceptor {
    pub fn new(
        sender: Arc<dyn Sender>,
        store: Arc<dyn EnvelopeStore>,
        worker: Arc<BackgroundWorker>,
    ) -> Self {
        Self {
            sender,
            store,
            worker,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Send `envelope` on the calling thread.
    ///
    /// On success any staged copy is removed in-line. On failure the envelope
    /// is handed to the worker for staging (unless it is diagnostic-only) and
    /// the sender's error is returned unchanged.
    pub fn deliver(&self, envelope: &Envelope) -> Result<(), SendError> {
        self.send_with(envelope, Staging::Queued)
    }

    /// Resend an envelope that was taken out of the store.
    ///
    /// Same as [`deliver`](Self::deliver), except that a failed envelope is
    /// written back to the store before this returns. Replay passes use it so
    /// a record is never held only in memory behind the pass that removed it.
    pub fn redeliver(&self, envelope: &Envelope) -> Result<(), SendError> {
        self.send_with(envelope, Staging::Inline)
    }

    fn send_with(&self, envelope: &Envelope, staging: Staging) -> Result<(), SendError> {
        match self.sender.send(envelope) {
            Ok(()) => {
                Counters::bump(&self.counters.delivered);
                if !envelope.is_diagnostic_only() {
                    self.discard_staged(envelope);
                }
                Ok(())
            }
            Err(err) => {
                Counters::bump(&self.counters.failed);
                if envelope.is_diagnostic_only() {
                    Counters::bump(&self.counters.diagnostic_skipped);
                    debug!(
                        sender = self.sender.name(),
                        error = %err,
                        "diagnostic envelope not delivered; not staging"
                    );
                } else {
                    match staging {
                        Staging::Queued => self.stage(envelope),
                        Staging::Inline => persist(&*self.store, &self.counters, envelope),
                    }
                }
                Err(err)
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn EnvelopeStore> {
        &self.store
    }

    pub fn worker(&self) -> &Arc<BackgroundWorker> {
        &self.worker
    }

    pub fn sender_name(&self) -> &'static str {
        self.sender.name()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.counters.snapshot()
    }

    fn stage(&self, envelope: &Envelope) {
        let store = Arc::clone(&self.store);
        let counters = Arc::clone(&self.counters);
        let envelope = envelope.clone();

        let submitted = self
            .worker
            .submit(move || persist(&*store, &counters, &envelope));

        if let Err(e) = submitted {
            Counters::bump(&self.counters.dropped);
            warn!(error = %e, "could not schedule staging; envelope lost");
        }
    }

    fn discard_staged(&self, envelope: &Envelope) {
        match self.store.remove(envelope) {
            Ok(true) => debug!("removed staged copy of delivered envelope"),
            Ok(false) => {}
            // Nothing can have been staged without an identity.
            Err(e) if e.is_identity_missing() => {}
            Err(e) => {
                Counters::bump(&self.counters.store_errors);
                warn!(error = %e, "failed to remove staged copy of delivered envelope");
            }
        }
    }
}

/// Where a failed envelope is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Staging {
    /// Queued on the background worker.
    Queued,
    /// Written before returning to the caller.
    Inline,
}

fn persist(store: &dyn EnvelopeStore, counters: &Counters, envelope: &Envelope) {
    match store.save(envelope) {
        Ok(address) => {
            Counters::bump(&counters.staged);
            debug!(address = %address, "staged undelivered envelope");
        }
        Err(e) if e.is_identity_missing() => {
            Counters::bump(&counters.dropped);
            warn!(error = %e, "envelope has no storage identity; not staged");
        }
        Err(e) => {
            Counters::bump(&counters.store_errors);
            warn!(error = %e, "failed to stage undelivered envelope");
        }
    }
}

impl std::fmt::Debug for DeliveryInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryInterceptor")
            .field("sender", &self.sender.name())
            .field("stats", &self.stats())
            .finish()
    }
}

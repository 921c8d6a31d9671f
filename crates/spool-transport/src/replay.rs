use std::thread;
use std::time::Duration;

use spool_store::{StoreResult, StoredEnvelope};
use spool_worker::WorkerResult;
use tracing::{debug, info, warn};

use crate::interceptor::DeliveryInterceptor;

/// Pause between successive resubmissions during a replay pass.
pub const DEFAULT_REPLAY_INTERVAL: Duration = Duration::from_millis(100);

/// Result of one replay pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records the store returned.
    pub listed: usize,
    /// Records resent successfully.
    pub delivered: usize,
    /// Records whose resend failed; these are written back before the pass moves on.
    pub failed: usize,
    /// Records left on disk because they could not be removed first.
    pub skipped: usize,
    /// Whether the pass stopped early, at a failed resend or because the
    /// worker was shut down.
    pub halted: bool,
}

impl ReplayReport {
    /// Records the pass never reached because it halted.
    pub fn untouched(&self) -> usize {
        self.listed - self.delivered - self.failed - self.skipped
    }
}

/// Resubmits staged envelopes through a [`DeliveryInterceptor`].
#[derive(Clone, Debug)]
pub struct ReplayScheduler {
    interceptor: DeliveryInterceptor,
    interval: Duration,
    halt_on_failure: bool,
}

impl ReplayScheduler {
    pub fn new(interceptor: DeliveryInterceptor) -> Self {
        Self {
            interceptor,
            interval: DEFAULT_REPLAY_INTERVAL,
            halt_on_failure: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop a pass at the first failed resend instead of trying the rest.
    pub fn with_halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Queue one replay pass on the background worker.
    ///
    /// The pass stops before the next record once the worker is killed.
    pub fn schedule(&self) -> WorkerResult<()> {
        let scheduler = self.clone();
        self.interceptor.worker().submit(move || {
            if let Err(e) = scheduler.pass(true) {
                warn!(error = %e, "replay pass failed to list staged envelopes");
            }
        })
    }

    /// Run one replay pass on the calling thread.
    ///
    /// Each record is removed (by the address it was listed under) before it
    /// is resent, and written back before the next one if the resend fails.
    /// A record that cannot be removed is skipped for this pass.
    pub fn run(&self) -> StoreResult<ReplayReport> {
        self.pass(false)
    }

    fn pass(&self, stop_on_shutdown: bool) -> StoreResult<ReplayReport> {
        let store = self.interceptor.store();
        let records = store.list()?;
        let mut report = ReplayReport {
            listed: records.len(),
            ..ReplayReport::default()
        };
        if records.is_empty() {
            debug!("no staged envelopes to replay");
            return Ok(report);
        }

        let mut resent_any = false;
        for StoredEnvelope { address, envelope } in records {
            // Pace before touching the record so it stays on disk while we wait.
            if resent_any && !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
            if stop_on_shutdown && self.interceptor.worker().is_shutdown() {
                info!(remaining = report.untouched(), "worker shut down; stopping replay");
                report.halted = true;
                break;
            }

            if let Err(e) = store.remove_address(&address) {
                warn!(address = %address, error = %e, "cannot remove staged envelope; skipping");
                report.skipped += 1;
                continue;
            }
            resent_any = true;

            match self.interceptor.redeliver(&envelope) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(address = %address, error = %e, "replayed envelope not delivered");
                    if self.halt_on_failure {
                        report.halted = true;
                        break;
                    }
                }
            }
        }

        info!(
            listed = report.listed,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            halted = report.halted,
            "replay pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSender;
    use spool_store::InMemoryStore;
    use spool_types::{Envelope, Item};
    use spool_worker::BackgroundWorker;
    use std::sync::Arc;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);

    fn event(payload: &[u8]) -> Envelope {
        Envelope::new().with_item(Item::event(payload.to_vec()))
    }

    fn scheduler(
        sender: &Arc<ScriptedSender>,
        store: &Arc<InMemoryStore>,
    ) -> ReplayScheduler {
        let worker = Arc::new(BackgroundWorker::spawn(64).unwrap());
        let interceptor = DeliveryInterceptor::new(sender.clone(), store.clone(), worker);
        ReplayScheduler::new(interceptor).with_interval(Duration::ZERO)
    }

    fn staged(payloads: &[&str]) -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_envelopes(payloads.iter().map(|p| event(p.as_bytes()))).unwrap())
    }

    #[test]
    fn healthy_sender_drains_store() {
        let sender = Arc::new(ScriptedSender::healthy());
        let store = staged(&["a", "b", "c"]);
        let replay = scheduler(&sender, &store);

        let report = replay.run().unwrap();

        assert_eq!(report.listed, 3);
        assert_eq!(report.delivered, 3);
        assert!(store.is_empty());
        assert_eq!(sender.sent().len(), 3);
    }

    #[test]
    fn empty_store_sends_nothing() {
        let sender = Arc::new(ScriptedSender::healthy());
        let store = Arc::new(InMemoryStore::new());

        let report = scheduler(&sender, &store).run().unwrap();
        assert_eq!(report, ReplayReport::default());
        assert_eq!(sender.attempts(), 0);
    }

    #[test]
    fn failed_resend_is_staged_again() {
        let sender = Arc::new(ScriptedSender::failing());
        let store = staged(&["a", "b"]);
        let replay = scheduler(&sender, &store);

        let report = replay.run().unwrap();

        // Written back before run returns, without going through the worker.
        assert_eq!(report.failed, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(replay.interceptor.worker().stats().accepted, 0);
    }

    #[test]
    fn halt_on_failure_leaves_rest_untouched() {
        let sender = Arc::new(ScriptedSender::failing());
        let store = staged(&["a", "b", "c"]);
        let replay = scheduler(&sender, &store).with_halt_on_failure(true);

        let report = replay.run().unwrap();
        replay.interceptor.worker().flush(WAIT);

        assert!(report.halted);
        assert_eq!(report.failed, 1);
        assert_eq!(report.untouched(), 2);
        assert_eq!(sender.attempts(), 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn resends_are_paced() {
        let sender = Arc::new(ScriptedSender::healthy());
        let store = staged(&["a", "b", "c"]);
        let replay = scheduler(&sender, &store).with_interval(Duration::from_millis(30));

        let started = Instant::now();
        replay.run().unwrap();

        // Two gaps between three resends.
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn schedule_runs_on_worker() {
        let sender = Arc::new(ScriptedSender::healthy());
        let store = staged(&["a", "b"]);
        let replay = scheduler(&sender, &store);

        replay.schedule().unwrap();
        assert!(replay.interceptor.worker().flush(WAIT).drained);

        assert!(store.is_empty());
        assert_eq!(sender.sent().len(), 2);
    }

    #[test]
    fn scheduled_pass_keeps_every_failure_beyond_capacity() {
        let sender = Arc::new(ScriptedSender::failing());
        let store = staged(&["a", "b", "c", "d", "e", "f"]);
        let worker = Arc::new(BackgroundWorker::spawn(2).unwrap());
        let interceptor = DeliveryInterceptor::new(sender.clone(), store.clone(), worker);
        let replay = ReplayScheduler::new(interceptor).with_interval(Duration::ZERO);

        replay.schedule().unwrap();
        assert!(replay.interceptor.worker().flush(WAIT).drained);

        assert_eq!(store.len(), 6);
        assert_eq!(sender.attempts(), 6);
        assert_eq!(replay.interceptor.stats().dropped, 0);
        assert_eq!(replay.interceptor.stats().staged, 6);
    }

    #[test]
    fn pacing_happens_before_a_record_is_removed() {
        let sender = Arc::new(ScriptedSender::healthy());
        let store = staged(&["a", "b"]);
        let replay = scheduler(&sender, &store).with_interval(Duration::from_millis(200));

        let runner = {
            let replay = replay.clone();
            std::thread::spawn(move || replay.run().unwrap())
        };
        // First resend is immediate; the second record waits on disk.
        let deadline = Instant::now() + WAIT;
        while sender.attempts() < 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(store.len(), 1);

        assert_eq!(runner.join().unwrap().delivered, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn run_on_caller_ignores_worker_shutdown() {
        let sender = Arc::new(ScriptedSender::failing());
        let store = staged(&["a", "b"]);
        let replay = scheduler(&sender, &store);
        replay.interceptor.worker().kill();

        let report = replay.run().unwrap();
        assert!(!report.halted);
        assert_eq!(report.failed, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn schedule_after_kill_is_rejected() {
        let sender = Arc::new(ScriptedSender::healthy());
        let store = staged(&["a"]);
        let replay = scheduler(&sender, &store);
        replay.interceptor.worker().kill();

        assert!(replay.schedule().is_err());
        assert_eq!(store.len(), 1);
    }
}

use std::sync::Arc;
use std::time::Duration;

use spool_store::{EnvelopeStore, FilesystemStore};
use spool_types::Envelope;
use spool_worker::{BackgroundWorker, FlushOutcome, WorkerStats};
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::{SendError, TransportResult};
use crate::interceptor::{DeliveryInterceptor, DeliveryStats};
use crate::logging;
use crate::replay::{ReplayReport, ReplayScheduler};
use crate::sender::Sender;

/// A [`Sender`] wrapper that survives being offline.
///
/// Failed deliveries are staged in the store by a background worker and
/// replayed later, on startup or on request.
///
/// ```no_run
/// use spool_transport::{Envelope, Item, OfflineTransport, SendError, Sender, TransportConfig};
///
/// struct Http;
///
/// impl Sender for Http {
///     fn send(&self, _envelope: &Envelope) -> Result<(), SendError> {
///         Err(SendError::Timeout)
///     }
/// }
///
/// let transport = OfflineTransport::new(TransportConfig::new("~/.cache/app/spool"), Http)?;
/// let envelope = Envelope::with_event_id("4f1c").with_item(Item::event(b"{}".to_vec()));
/// let _ = transport.deliver(&envelope);
/// # Ok::<(), spool_transport::TransportError>(())
/// ```
pub struct OfflineTransport {
    config: TransportConfig,
    interceptor: DeliveryInterceptor,
    replay: ReplayScheduler,
}

impl OfflineTransport {
    /// Build a transport staging into a [`FilesystemStore`] at the configured
    /// location, creating the directory if needed.
    pub fn new<S>(config: TransportConfig, sender: S) -> TransportResult<Self>
    where
        S: Sender + 'static,
    {
        let root = config.resolved_storage_location()?;
        let store = FilesystemStore::open(root, config.address_scheme)?;
        Self::with_store(config, sender, Arc::new(store))
    }

    /// Build a transport around an existing store.
    pub fn with_store<S>(
        config: TransportConfig,
        sender: S,
        store: Arc<dyn EnvelopeStore>,
    ) -> TransportResult<Self>
    where
        S: Sender + 'static,
    {
        if config.debug {
            logging::init_debug_logging();
        }

        let worker = Arc::new(BackgroundWorker::spawn(config.queue_capacity)?);
        let interceptor = DeliveryInterceptor::new(Arc::new(sender), store, worker);
        let replay = ReplayScheduler::new(interceptor.clone())
            .with_interval(config.replay_interval())
            .with_halt_on_failure(config.halt_replay_on_failure);

        info!(
            sender = interceptor.sender_name(),
            scheme = ?config.address_scheme,
            capacity = config.queue_capacity,
            "offline transport ready"
        );

        if config.replay_on_startup {
            if let Err(e) = replay.schedule() {
                warn!(error = %e, "could not schedule startup replay");
            }
        }

        Ok(Self {
            config,
            interceptor,
            replay,
        })
    }

    /// Send on the calling thread; see [`DeliveryInterceptor::deliver`].
    pub fn deliver(&self, envelope: &Envelope) -> Result<(), SendError> {
        self.interceptor.deliver(envelope)
    }

    /// Send on the background worker without waiting for the result.
    pub fn capture(&self, envelope: Envelope) -> TransportResult<()> {
        let interceptor = self.interceptor.clone();
        self.interceptor.worker().submit(move || {
            if let Err(e) = interceptor.deliver(&envelope) {
                debug!(error = %e, "captured envelope not delivered");
            }
        })?;
        Ok(())
    }

    /// Queue a replay pass on the background worker.
    pub fn replay(&self) -> TransportResult<()> {
        self.replay.schedule()?;
        Ok(())
    }

    /// Run a replay pass on the calling thread.
    pub fn replay_now(&self) -> TransportResult<ReplayReport> {
        Ok(self.replay.run()?)
    }

    pub fn flush(&self, timeout: Duration) -> FlushOutcome {
        self.interceptor.worker().flush(timeout)
    }

    pub fn flush_with<F>(&self, timeout: Duration, callback: F) -> FlushOutcome
    where
        F: FnOnce(FlushOutcome),
    {
        self.interceptor.worker().flush_with(timeout, callback)
    }

    /// Stop the background worker, discarding queued work.
    ///
    /// A replay pass already running stops before its next record; every
    /// record it has not resent stays staged.
    pub fn kill(&self) {
        self.interceptor.worker().kill();
    }

    pub fn store(&self) -> &Arc<dyn EnvelopeStore> {
        self.interceptor.store()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn stats(&self) -> DeliveryStats {
        self.interceptor.stats()
    }

    pub fn worker_stats(&self) -> WorkerStats {
        self.interceptor.worker().stats()
    }
}

impl Drop for OfflineTransport {
    fn drop(&mut self) {
        // Queued tasks hold clones of the worker; stop it explicitly.
        self.kill();
    }
}

impl std::fmt::Debug for OfflineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineTransport")
            .field("config", &self.config)
            .field("interceptor", &self.interceptor)
            .finish()
    }
}

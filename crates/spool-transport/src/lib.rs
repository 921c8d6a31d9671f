//! Offline transport for Spool.
//!
//! Wraps an injected [`Sender`] so that envelopes it fails to deliver are
//! staged in an [`EnvelopeStore`](spool_store::EnvelopeStore) and replayed
//! later. Disk writes happen on a background worker; the caller only ever
//! waits for the sender itself.
//!
//! # Components
//!
//! - [`DeliveryInterceptor`] -- calls the sender, stages failures, cleans up successes
//! - [`ReplayScheduler`] -- resubmits staged envelopes, paced, remove-before-send
//! - [`OfflineTransport`] -- wires store, worker, interceptor and scheduler from a [`TransportConfig`]
//!
//! # Design Rules
//!
//! 1. A sender failure always reaches the caller unchanged.
//! 2. Persistence problems are logged and counted, never surfaced from `deliver`.
//! 3. Diagnostic-only envelopes (client reports) are never staged.
//! 4. Replay removes a record before resending it, so it is never both on
//!    disk and in flight.
//! 5. No process-wide state: every collaborator is passed in.

pub mod config;
pub mod error;
pub mod interceptor;
pub mod logging;
pub mod replay;
pub mod sender;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::TransportConfig;
pub use error::{SendError, TransportError, TransportResult};
pub use interceptor::{DeliveryInterceptor, DeliveryStats};
pub use replay::{ReplayReport, ReplayScheduler, DEFAULT_REPLAY_INTERVAL};
pub use sender::Sender;
pub use transport::OfflineTransport;

// Re-export the types callers need to build envelopes and inspect the store.
pub use spool_store::{EnvelopeStore, FilesystemStore, InMemoryStore, StoredEnvelope};
pub use spool_types::{AddressScheme, Envelope, Item, ItemType, StorageAddress};
pub use spool_worker::{FlushOutcome, WorkerError, WorkerStats};

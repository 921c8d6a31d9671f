//! Durable envelope storage for Spool.
//!
//! A store holds envelopes that could not be delivered yet, keyed by their
//! [`StorageAddress`](spool_types::StorageAddress). The on-disk layout is a
//! flat directory with one file per envelope; the directory listing is the
//! index.
//!
//! # Storage Backends
//!
//! All backends implement the [`EnvelopeStore`] trait:
//!
//! - [`FilesystemStore`] -- one file per envelope under a root directory
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Saving is idempotent: the same envelope always lands on the same address.
//! 2. Writes are atomic (temp file + rename); readers never see partial files.
//! 3. Removal of an absent envelope is a success, not an error.
//! 4. Listing heals: unreadable files are deleted and reported, never retried.
//! 5. Save and remove are safe to race against each other on one address.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{FilesystemStore, ScanReport};
pub use memory::InMemoryStore;
pub use traits::{EnvelopeStore, StoredEnvelope};

use spool_types::{Envelope, StorageAddress};

use crate::error::StoreResult;

/// An envelope paired with the address it was loaded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEnvelope {
    pub address: StorageAddress,
    pub envelope: Envelope,
}

/// Durable staging area for undelivered envelopes.
///
/// All implementations must satisfy these invariants:
/// - `save` is idempotent: saving the same envelope twice leaves one record.
/// - `remove` and `remove_address` treat a missing record as success.
/// - `list` returns a snapshot; later mutations are not reflected in it.
/// - `list` never fails because of one unreadable record. Unreadable
///   records are deleted and left out.
/// - Concurrent `save` and `remove` on one address never leave a partial
///   record behind.
pub trait EnvelopeStore: Send + Sync {
    /// The address `envelope` is (or would be) stored under.
    fn address_of(&self, envelope: &Envelope) -> StoreResult<StorageAddress>;

    /// Persist an envelope, overwriting any record at the same address.
    fn save(&self, envelope: &Envelope) -> StoreResult<StorageAddress>;

    /// Delete the record at `address`. Returns `true` if it existed.
    fn remove_address(&self, address: &StorageAddress) -> StoreResult<bool>;

    /// Snapshot of every loadable record.
    fn list(&self) -> StoreResult<Vec<StoredEnvelope>>;

    /// Delete the record for `envelope`. Returns `true` if it existed.
    fn remove(&self, envelope: &Envelope) -> StoreResult<bool> {
        let address = self.address_of(envelope)?;
        self.remove_address(&address)
    }
}

use std::collections::HashMap;

use parking_lot::RwLock;
use spool_types::{AddressScheme, Envelope, StorageAddress};

use crate::error::StoreResult;
use crate::traits::{EnvelopeStore, StoredEnvelope};

/// In-memory, HashMap-based envelope store.
///
/// Intended for tests and embedding. Envelopes are cloned on save and list.
pub struct InMemoryStore {
    scheme: AddressScheme,
    records: RwLock<HashMap<StorageAddress, Envelope>>,
}

impl InMemoryStore {
    /// Create an empty store addressing envelopes by content hash.
    pub fn new() -> Self {
        Self::with_scheme(AddressScheme::ContentHash)
    }

    pub fn with_scheme(scheme: AddressScheme) -> Self {
        Self {
            scheme,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-populated with `envelopes`.
    pub fn with_envelopes<I>(envelopes: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = Envelope>,
    {
        let store = Self::new();
        for envelope in envelopes {
            store.save(&envelope)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn contains(&self, address: &StorageAddress) -> bool {
        self.records.read().contains_key(address)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeStore for InMemoryStore {
    fn address_of(&self, envelope: &Envelope) -> StoreResult<StorageAddress> {
        Ok(StorageAddress::derive(envelope, self.scheme)?)
    }

    fn save(&self, envelope: &Envelope) -> StoreResult<StorageAddress> {
        let address = self.address_of(envelope)?;
        self.records
            .write()
            .insert(address.clone(), envelope.clone());
        Ok(address)
    }

    fn remove_address(&self, address: &StorageAddress) -> StoreResult<bool> {
        Ok(self.records.write().remove(address).is_some())
    }

    fn list(&self) -> StoreResult<Vec<StoredEnvelope>> {
        let records = self.records.read();
        let mut listed: Vec<StoredEnvelope> = records
            .iter()
            .map(|(address, envelope)| StoredEnvelope {
                address: address.clone(),
                envelope: envelope.clone(),
            })
            .collect();
        listed.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(listed)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("scheme", &self.scheme)
            .field("record_count", &self.len())
            .finish()
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, EVENT_ID_HEADER};
use crate::error::{TypeError, TypeResult};

/// Longest accepted storage address, in bytes.
pub const MAX_ADDRESS_LEN: usize = 128;

/// Domain tag prepended to envelope bytes before hashing.
const CONTENT_DOMAIN: &str = "spool-envelope-v1";

/// How a [`StorageAddress`] is derived from an envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressScheme {
    /// Domain-separated BLAKE3 digest of the serialized envelope.
    ///
    /// Byte-identical retries collapse onto one file; two logically different
    /// envelopes that serialize identically share an address.
    #[default]
    ContentHash,
    /// The envelope's `event_id` header.
    ///
    /// Distinct envelopes sharing an id overwrite each other, and envelopes
    /// without an id cannot be addressed at all.
    EventId,
}

/// Filesystem-safe key a persisted envelope is stored under.
///
/// Addresses are 1 to [`MAX_ADDRESS_LEN`] characters drawn from
/// `[A-Za-z0-9_-]`, so they are always a single plain path component.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageAddress(String);

impl StorageAddress {
    /// Derive the address of `envelope` under `scheme`.
    pub fn derive(envelope: &Envelope, scheme: AddressScheme) -> TypeResult<Self> {
        match scheme {
            AddressScheme::ContentHash => Ok(Self::from_content(&envelope.to_bytes()?)),
            AddressScheme::EventId => {
                let id = envelope
                    .event_id()
                    .ok_or(TypeError::IdentityMissing(EVENT_ID_HEADER))?;
                Self::parse(id)
            }
        }
    }

    /// Content address of already serialized envelope bytes.
    pub fn from_content(bytes: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(CONTENT_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    /// Validate an existing string (e.g. a file name) as an address.
    pub fn parse(s: &str) -> TypeResult<Self> {
        let valid = !s.is_empty()
            && s.len() <= MAX_ADDRESS_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(TypeError::InvalidAddress(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Debug for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageAddress({})", self.short())
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for StorageAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Item;
    use proptest::prelude::*;

    fn envelope(payload: &[u8]) -> Envelope {
        Envelope::new().with_item(Item::event(payload.to_vec()))
    }

    #[test]
    fn content_address_is_deterministic() {
        let a = StorageAddress::derive(&envelope(b"msg-1"), AddressScheme::ContentHash).unwrap();
        let b = StorageAddress::derive(&envelope(b"msg-1"), AddressScheme::ContentHash).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn different_content_different_address() {
        let a = StorageAddress::derive(&envelope(b"msg-1"), AddressScheme::ContentHash).unwrap();
        let b = StorageAddress::derive(&envelope(b"msg-2"), AddressScheme::ContentHash).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn content_address_is_domain_separated() {
        let bytes = envelope(b"msg-1").to_bytes().unwrap();
        let plain = hex::encode(blake3::hash(&bytes).as_bytes());
        assert_ne!(StorageAddress::from_content(&bytes).as_str(), plain);
    }

    #[test]
    fn event_id_scheme_uses_header() {
        let env = Envelope::with_event_id("0f8ff792fc1c400bb8a0133a47257dbe")
            .with_item(Item::event(b"x".to_vec()));
        let addr = StorageAddress::derive(&env, AddressScheme::EventId).unwrap();
        assert_eq!(addr.as_str(), "0f8ff792fc1c400bb8a0133a47257dbe");
    }

    #[test]
    fn event_id_scheme_fails_closed_without_id() {
        let err = StorageAddress::derive(&envelope(b"x"), AddressScheme::EventId).unwrap_err();
        assert_eq!(err, TypeError::IdentityMissing("event_id"));
    }

    #[test]
    fn event_id_with_path_characters_is_rejected() {
        let env = Envelope::with_event_id("../../etc/passwd");
        assert!(matches!(
            StorageAddress::derive(&env, AddressScheme::EventId),
            Err(TypeError::InvalidAddress(_))
        ));
    }

    #[test]
    fn parse_bounds() {
        assert!(StorageAddress::parse("").is_err());
        assert!(StorageAddress::parse(".hidden").is_err());
        assert!(StorageAddress::parse("a b").is_err());
        assert!(StorageAddress::parse(&"a".repeat(MAX_ADDRESS_LEN)).is_ok());
        assert!(StorageAddress::parse(&"a".repeat(MAX_ADDRESS_LEN + 1)).is_err());
        assert!("bad_envelope".parse::<StorageAddress>().is_ok());
    }

    #[test]
    fn short_form() {
        let addr = StorageAddress::parse("abcdef0123456789").unwrap();
        assert_eq!(addr.short(), "abcdef01");
        assert_eq!(format!("{addr:?}"), "StorageAddress(abcdef01)");
        assert_eq!(StorageAddress::parse("abc").unwrap().short(), "abc");
    }

    #[test]
    fn scheme_serde_names() {
        assert_eq!(
            serde_json::to_string(&AddressScheme::ContentHash).unwrap(),
            "\"content_hash\""
        );
        let parsed: AddressScheme = serde_json::from_str("\"event_id\"").unwrap();
        assert_eq!(parsed, AddressScheme::EventId);
    }

    proptest! {
        #[test]
        fn content_addresses_are_valid_file_names(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
            let addr = StorageAddress::derive(&envelope(&payload), AddressScheme::ContentHash).unwrap();
            prop_assert!(StorageAddress::parse(addr.as_str()).is_ok());
        }
    }
}

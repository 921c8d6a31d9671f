//! Foundation types for Spool, the durable retry buffer for telemetry envelopes.
//!
//! Every other Spool crate depends on `spool-types`.
//!
//! # Key Types
//!
//! - [`Envelope`] -- one deliverable unit: headers plus typed [`Item`]s
//! - [`ItemType`] -- item classification; `client_report` marks diagnostic-only envelopes
//! - [`StorageAddress`] -- filesystem-safe key a persisted envelope lives under
//! - [`AddressScheme`] -- how an address is derived (content hash or `event_id`)
//!
//! The byte form an envelope is persisted in lives in [`codec`]: newline
//! separated JSON headers with length-prefixed item payloads.

pub mod address;
pub mod codec;
pub mod envelope;
pub mod error;

pub use address::{AddressScheme, StorageAddress, MAX_ADDRESS_LEN};
pub use envelope::{Envelope, Headers, Item, ItemType, EVENT_ID_HEADER};
pub use error::{TypeError, TypeResult};

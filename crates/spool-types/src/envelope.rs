use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Header map for envelopes and items.
///
/// A `BTreeMap` keeps keys sorted, so identical logical headers always
/// serialize to identical bytes.
pub type Headers = BTreeMap<String, Value>;

/// Envelope header carrying the explicit unique identifier.
pub const EVENT_ID_HEADER: &str = "event_id";

/// Item header keys written by the codec itself.
pub(crate) const ITEM_TYPE_KEY: &str = "type";
pub(crate) const ITEM_LENGTH_KEY: &str = "length";

/// Classification of an envelope item.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemType {
    Event,
    Transaction,
    Attachment,
    Session,
    Sessions,
    /// Self-referential health statistics about the client itself.
    ClientReport,
    /// Any other item type, kept verbatim.
    Other(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Event => "event",
            Self::Transaction => "transaction",
            Self::Attachment => "attachment",
            Self::Session => "session",
            Self::Sessions => "sessions",
            Self::ClientReport => "client_report",
            Self::Other(name) => name,
        }
    }

    pub fn is_client_report(&self) -> bool {
        matches!(self, Self::ClientReport)
    }
}

impl From<&str> for ItemType {
    fn from(name: &str) -> Self {
        match name {
            "event" => Self::Event,
            "transaction" => Self::Transaction,
            "attachment" => Self::Attachment,
            "session" => Self::Session,
            "sessions" => Self::Sessions,
            "client_report" => Self::ClientReport,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed payload inside an [`Envelope`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    item_type: ItemType,
    headers: Headers,
    payload: Vec<u8>,
}

impl Item {
    pub fn new(item_type: ItemType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            item_type,
            headers: Headers::new(),
            payload: payload.into(),
        }
    }

    /// An `event` item.
    pub fn event(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(ItemType::Event, payload)
    }

    /// A `client_report` item.
    pub fn client_report(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(ItemType::ClientReport, payload)
    }

    /// Attach an extra item header.
    ///
    /// `type` and `length` are owned by the codec; setting them here is ignored.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != ITEM_TYPE_KEY && key != ITEM_LENGTH_KEY {
            self.headers.insert(key, value.into());
        }
        self
    }

    pub(crate) fn from_parts(item_type: ItemType, headers: Headers, payload: Vec<u8>) -> Self {
        Self {
            item_type,
            headers,
            payload,
        }
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// One deliverable unit of telemetry data.
///
/// Envelopes are plain data: an ordered list of items plus a header map that
/// may carry an [`EVENT_ID_HEADER`]. They are persisted in the byte form
/// produced by [`Envelope::to_bytes`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    headers: Headers,
    items: Vec<Item>,
}

impl Envelope {
    /// An envelope with no headers and no items.
    pub fn new() -> Self {
        Self::default()
    }

    /// An envelope carrying `event_id` in its headers.
    pub fn with_event_id(event_id: impl Into<String>) -> Self {
        Self::new().with_header(EVENT_ID_HEADER, event_id.into())
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn add_item(&mut self, item: Item) {
        self.items.push(item);
    }

    pub(crate) fn from_parts(headers: Headers, items: Vec<Item>) -> Self {
        Self { headers, items }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// The explicit unique identifier, if the headers carry one as a string.
    pub fn event_id(&self) -> Option<&str> {
        self.headers.get(EVENT_ID_HEADER).and_then(Value::as_str)
    }

    /// Whether this envelope only reports the client's own processing health.
    ///
    /// Such envelopes may be produced by a network failure, so they are never
    /// staged for replay.
    pub fn is_diagnostic_only(&self) -> bool {
        self.items.iter().any(|item| item.item_type.is_client_report())
    }

    /// Sum of all item payload sizes.
    pub fn payload_len(&self) -> usize {
        self.items.iter().map(|item| item.payload.len()).sum()
    }
}

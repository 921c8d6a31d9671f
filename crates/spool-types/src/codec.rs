//! Envelope byte form.
//!
//! ```text
//! {"event_id":"..."}\n            envelope headers (JSON object)
//! {"length":5,"type":"event"}\n   item headers (JSON object)
//! hello\n                         exactly `length` payload bytes
//! ...                             one header/payload pair per item
//! ```
//!
//! Header keys are written sorted, so serialization is deterministic for
//! identical logical content. On parse an item header without `length` takes
//! its payload up to the next newline, and an empty line ends the item list.

use serde_json::Value;

use crate::envelope::{Envelope, Headers, Item, ItemType, ITEM_LENGTH_KEY, ITEM_TYPE_KEY};
use crate::error::{TypeError, TypeResult};

impl Envelope {
    /// Serialize into the persisted byte form.
    pub fn to_bytes(&self) -> TypeResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.payload_len() + 64 * (self.items().len() + 1));
        write_headers(&mut out, self.headers())?;

        for item in self.items() {
            let mut headers = item.headers().clone();
            headers.insert(
                ITEM_TYPE_KEY.to_string(),
                Value::String(item.item_type().as_str().to_string()),
            );
            headers.insert(
                ITEM_LENGTH_KEY.to_string(),
                Value::from(item.payload().len() as u64),
            );
            write_headers(&mut out, &headers)?;
            out.extend_from_slice(item.payload());
            out.push(b'\n');
        }

        Ok(out)
    }

    /// Parse the persisted byte form.
    pub fn from_bytes(bytes: &[u8]) -> TypeResult<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let header_line = reader
            .line()
            .ok_or_else(|| TypeError::InvalidHeader("empty input".into()))?;
        let headers = parse_headers(header_line)?;

        let mut items = Vec::new();
        while let Some(line) = reader.line() {
            if line.is_empty() {
                break;
            }
            items.push(parse_item(line, &mut reader)?);
        }

        let trailing = reader.rest();
        if !trailing.iter().all(u8::is_ascii_whitespace) {
            return Err(TypeError::TrailingData(trailing.len()));
        }

        Ok(Envelope::from_parts(headers, items))
    }
}

fn write_headers(out: &mut Vec<u8>, headers: &Headers) -> TypeResult<()> {
    serde_json::to_writer(&mut *out, headers)
        .map_err(|e| TypeError::Serialization(e.to_string()))?;
    out.push(b'\n');
    Ok(())
}

fn parse_headers(line: &[u8]) -> TypeResult<Headers> {
    match serde_json::from_slice::<Value>(line) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(TypeError::InvalidHeader(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(TypeError::InvalidHeader(e.to_string())),
    }
}

fn parse_item(header_line: &[u8], reader: &mut Reader<'_>) -> TypeResult<Item> {
    let mut headers = parse_headers(header_line)?;

    let item_type = match headers.remove(ITEM_TYPE_KEY) {
        Some(Value::String(name)) => ItemType::from(name.as_str()),
        _ => return Err(TypeError::MissingItemType),
    };

    let payload = match headers.remove(ITEM_LENGTH_KEY) {
        Some(value) => {
            let length = value.as_u64().ok_or_else(|| {
                TypeError::InvalidHeader(format!("item length is not an unsigned integer: {value}"))
            })?;
            let payload = reader.take(length)?.to_vec();
            reader.skip_newline();
            payload
        }
        None => reader.line().unwrap_or_default().to_vec(),
    };

    Ok(Item::from_parts(item_type, headers, payload))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Next line without its terminator (`\n` or `\r\n`); `None` at end of input.
    fn line(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let rest = &self.bytes[self.pos..];
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => (&rest[..idx], idx + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        Some(line.strip_suffix(b"\r").unwrap_or(line))
    }

    fn take(&mut self, length: u64) -> TypeResult<&'a [u8]> {
        let remaining = self.bytes.len() - self.pos;
        let truncated = TypeError::Truncated {
            expected: length,
            actual: remaining as u64,
        };
        let length = usize::try_from(length).map_err(|_| truncated.clone())?;
        if length > remaining {
            return Err(truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + length];
        self.pos += length;
        Ok(slice)
    }

    fn skip_newline(&mut self) {
        if self.bytes.get(self.pos) == Some(&b'\n') {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }
}

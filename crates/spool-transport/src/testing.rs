//! Sender doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use spool_types::Envelope;

use crate::error::SendError;
use crate::sender::Sender;

/// Records successful sends; fails everything while offline, plus any
/// envelope whose first payload is in the failure list.
pub(crate) struct ScriptedSender {
    online: AtomicBool,
    fail_payloads: Mutex<HashSet<Vec<u8>>>,
    sent: Mutex<Vec<Envelope>>,
    attempts: AtomicUsize,
}

impl ScriptedSender {
    pub(crate) fn healthy() -> Self {
        Self {
            online: AtomicBool::new(true),
            fail_payloads: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        let sender = Self::healthy();
        sender.set_online(false);
        sender
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn fail_payload(&self, payload: &[u8]) {
        self.fail_payloads.lock().unwrap().insert(payload.to_vec());
    }

    pub(crate) fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Sender for ScriptedSender {
    fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(SendError::Connection("offline".into()));
        }
        let payload = envelope.items().first().map(|item| item.payload().to_vec());
        if let Some(payload) = payload {
            if self.fail_payloads.lock().unwrap().contains(&payload) {
                return Err(SendError::Status(503));
            }
        }
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

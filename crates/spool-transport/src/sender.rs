use std::sync::Arc;

use spool_types::Envelope;

use crate::error::SendError;

/// The network call being wrapped.
///
/// A send either fully succeeds or fails; there is no partial delivery.
pub trait Sender: Send + Sync {
    fn send(&self, envelope: &Envelope) -> Result<(), SendError>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str {
        "sender"
    }
}

impl<S: Sender + ?Sized> Sender for Arc<S> {
    fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        (**self).send(envelope)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<S: Sender + ?Sized> Sender for Box<S> {
    fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        (**self).send(envelope)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

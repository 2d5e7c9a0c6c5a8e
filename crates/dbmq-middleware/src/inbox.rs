//! Bounded inboxes feeding the bridge loops.
//!
//! Transport pumps are the producers, a bridge loop is the single consumer.
//! Producers never block: when the consumer falls behind and the queue is
//! full, the new event is dropped and a warning is logged.

use tokio::sync::mpsc;
use tracing::warn;

/// Queue depth of each inbound direction.
pub const INBOUND_CAPACITY: usize = 10;

/// Producer handle. Cheap to clone.
#[derive(Debug)]
pub struct InboxSender<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
}

impl<T> Clone for InboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

/// Consumer handle, owned by exactly one bridge loop.
#[derive(Debug)]
pub struct Inbox<T> {
    rx: mpsc::Receiver<T>,
}

/// Create a named inbox holding at most `capacity` pending events.
pub fn inbox<T>(name: &'static str, capacity: usize) -> (InboxSender<T>, Inbox<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (InboxSender { name, tx }, Inbox { rx })
}

/// Why [`InboxSender::offer`] did not enqueue an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferError {
    Full,
    Closed,
}

impl<T> InboxSender<T> {
    /// Enqueue `event` without waiting.
    ///
    /// A full queue drops the event with a warning. A closed queue means the
    /// consuming loop has stopped; producers should stop as well.
    pub fn offer(&self, event: T) -> Result<(), OfferError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(inbox = self.name, "inbox full, dropping event");
                Err(OfferError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(OfferError::Closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Inbox<T> {
    /// Wait for the next event. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

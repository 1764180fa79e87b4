//! [`Mailbox`] – bounded queue where the newest message always wins.
//!
//! Posting never blocks: when the queue is full the oldest queued message is
//! evicted to make room.  With a capacity of 1 this is a single-slot mailbox
//! that only ever holds the latest value.
//!
//! The posting side owns the [`Mailbox`]; the consuming side holds the plain
//! [`Receiver`] returned by [`Mailbox::receiver`].  Dropping the mailbox
//! disconnects the receiver once it has been drained.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

pub struct Mailbox<T> {
    tx: Sender<T>,
    // Kept so the poster can evict the oldest message when full.
    rx: Receiver<T>,
}

impl<T> Mailbox<T> {
    /// Create a mailbox holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// A receiving handle for the consumer.
    pub fn receiver(&self) -> Receiver<T> {
        self.rx.clone()
    }

    /// Queue `value`, evicting the oldest queued messages if necessary.
    ///
    /// Returns `true` when at least one older message was dropped.
    pub fn post(&self, value: T) -> bool {
        let mut value = value;
        let mut displaced = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return displaced,
                Err(TrySendError::Full(rejected)) => {
                    value = rejected;
                    if self.rx.try_recv().is_ok() {
                        displaced = true;
                    }
                }
                // Unreachable while `self.rx` is alive.
                Err(TrySendError::Disconnected(_)) => return displaced,
            }
        }
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

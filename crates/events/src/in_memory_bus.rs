//! In-process event bus for the single-counter deployment and tests.

use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError, mpsc};

use crate::bus::{EventBus, Subscription};

/// Channel fan-out of committed engine events.
///
/// The workflow publishes one envelope per committed receipt, stock deduction, finalize
/// and print. Every subscription (the receipt printer loop, an audit sink, a test) gets
/// its own copy in publish order. Publishing never blocks on a slow printer: each
/// subscription has an unbounded queue. A subscription whose receiver was dropped is
/// forgotten at the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    // The list only holds senders, so a panic while it was locked cannot leave it half
    // written; keep serving printers rather than going silent.
    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::Sender<M>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscriptions still registered as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = Infallible;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        self.subscribers()
            .retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        self.subscribers().push(tx);
        Subscription::new(rx)
    }
}

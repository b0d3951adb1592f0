//! Single-assignment outcome cell shared by racing completion paths.
//!
//! The network task and the timeout timer both hold the cell; whichever calls
//! [`Settlement::settle`] first delivers the only outcome the caller will see, and
//! every later call is a no-op.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub(crate) struct Settlement<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Settlement<T> {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        let cell = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
        });
        (cell, receiver)
    }

    /// Deliver `value` if nothing has been delivered yet; returns whether it won.
    pub(crate) fn settle(&self, value: T) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        sender.is_some_and(|sender| sender.send(value).is_ok())
    }
}

/// Aborts the wrapped task when dropped, so dropping the caller cancels the work.
pub(crate) struct AbortOnDrop<T>(pub(crate) JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

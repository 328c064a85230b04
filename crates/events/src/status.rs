//! Status holder with replay-last-then-live subscriptions.
//!
//! A `StatusCell` owns exactly one current value. Every write replaces it and
//! fans the new value out to subscribers. Two subscription modes exist:
//!
//! - [`StatusCell::subscribe`]: the current value is queued first, then every
//!   later change.
//! - [`StatusCell::subscribe_changes`]: only values written after subscribing.
//!
//! Writes are not deduplicated: setting a value equal to the current one is
//! still delivered. Subscribers that only care about transitions compare
//! against the last value they saw.

use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
struct Inner<T> {
    current: T,
    subscribers: Vec<mpsc::Sender<T>>,
}

impl<T: Clone> Inner<T> {
    fn publish(&mut self, value: T) {
        self.current = value;
        let current = &self.current;
        self.subscribers.retain(|tx| tx.send(current.clone()).is_ok());
    }
}

/// Synchronized status value plus subscriber fan-out.
#[derive(Debug)]
pub struct StatusCell<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> StatusCell<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    // `current` is only assigned after a `replace_with` closure returns, so a
    // poisoned guard still holds a whole value.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.lock().current.clone()
    }

    /// Replace the current value and notify subscribers.
    pub fn set(&self, value: T) {
        self.lock().publish(value);
    }

    /// Compute the next value from the current one while holding the lock,
    /// then publish it.
    ///
    /// Concurrent writers are serialized for the whole read-compute-swap, so
    /// no update computed from a stale value can overwrite a newer one.
    pub fn replace_with<F>(&self, next: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let mut guard = self.lock();
        let value = next(&guard.current);
        guard.publish(value.clone());
        value
    }

    /// Subscribe and immediately receive the current value, then every change.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel();
        let mut guard = self.lock();
        // Receiver is alive in this scope, so the replay cannot fail.
        let _ = tx.send(guard.current.clone());
        guard.subscribers.push(tx);
        Subscription::new(rx)
    }

    /// Subscribe to values written after this call only.
    pub fn subscribe_changes(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        Subscription::new(rx)
    }
}

impl<T> Default for StatusCell<T>
where
    T: Clone + Default + Send + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> EventBus<T> for StatusCell<T>
where
    T: Clone + Send + 'static,
{
    type Error = Infallible;

    fn publish(&self, message: T) -> Result<(), Self::Error> {
        self.set(message);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<T> {
        StatusCell::subscribe(self)
    }
}

//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus carries notifications from the purchase backend to the entitlement
//! manager, and status changes from the manager to the rest of the application.
//!
//! ## Delivery
//!
//! - **Broadcast**: every live subscriber receives its own copy of each message.
//! - **Ordered per publisher**: messages from one publisher arrive in publish order.
//! - **No persistence**: a subscriber only sees what is published while it is
//!   subscribed (status holders add a replay of the current value on top).

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to a message stream.
///
/// ## Usage Pattern
///
/// ```ignore
/// let subscription = manager.subscribe_entitlement();
///
/// loop {
///     match subscription.recv_timeout(Duration::from_secs(1)) {
///         Ok(status) => render(status),
///         Err(RecvTimeoutError::Timeout) => continue,  // Check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,  // Publisher dropped
///     }
/// }
/// ```
///
/// Subscriptions are designed for single-threaded consumption. Dropping the
/// subscription unregisters it on the publisher's next publish.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Collect every message that is already queued, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub abstraction.
///
/// `publish()` can fail (e.g. the implementation's lock was poisoned). Callers
/// decide whether that is worth logging; publication is never retried here.
///
/// The trait requires `Send + Sync`, so implementations can be shared across the
/// backend's callback threads and the manager's worker thread.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

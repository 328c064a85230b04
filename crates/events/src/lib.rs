//! `entitlekit-events`: publish/subscribe mechanics.
//!
//! Two flavours of fan-out live here:
//! - [`InMemoryEventBus`]: fire-only-while-subscribed delivery of notifications.
//! - [`StatusCell`]: a status holder that replays its current value to new
//!   subscribers before streaming changes.

pub mod bus;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod status;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use status::StatusCell;

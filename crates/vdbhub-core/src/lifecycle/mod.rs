//! Lifecycle notifications, public events, and live mutations.

mod distributor;
mod events;
mod listener;

pub use distributor::{EventDistributor, RecordRef};
pub use events::{EventAdapter, VdbEventListener};
pub use listener::{
    LifecycleBroadcaster, LifecycleEvent, ListenerError, ListenerId, VdbLifecycleListener,
};

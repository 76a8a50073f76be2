//! PMOCast: keeps a local view of a cast receiver's play queue in step with
//! the receiver itself.
//!
//! The crate is organised around a single session worker
//! ([`controller::SessionController`]) that serializes every command, push
//! notification and discovery update. Commands reach the receiver through
//! the [`adapter::RemoteDevice`] trait; after each mutation the queue is
//! refetched and folded back into the local [`queue::SessionState`] by the
//! [`queue::QueueSynchronizer`].

mod events;

pub mod adapter;
pub mod controller;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod media;
pub mod memory_device;
pub mod model;
pub mod queue;
pub mod registry;
pub mod resolver;

use std::fmt;

use serde::Serialize;

pub use adapter::{DeviceNotification, NotificationSink, RemoteDevice};
pub use controller::{SessionCommand, SessionController};
pub use errors::{AdapterError, CastError};
pub use lifecycle::{ConnectionManager, ConnectionState};
pub use media::{CORRELATION_KEY, MediaDescriptor, MusicMetadata};
pub use memory_device::MemoryDevice;
pub use model::{
    CorrelationId, DeviceError, DeviceSummary, IdleReason, MediaStatus, PlayerState,
    RemoteQueueEntry, RemoteQueueItem, SessionEvent, Track,
};
pub use queue::{
    Placement, QueueSynchronizer, QueuedTrack, SessionEntry, SessionSnapshot, SessionState,
};
pub use registry::DeviceRegistry;
pub use resolver::{MediaRootResolver, UrlResolver};

/// Identifier of a receiver, as reported by discovery.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

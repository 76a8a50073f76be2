//! Seam between the session worker and a concrete cast receiver.

use std::fmt;

use crossbeam_channel::Sender;

use crate::DeviceId;
use crate::controller::WorkerMessage;
use crate::errors::AdapterError;
use crate::media::MediaDescriptor;
use crate::model::{DeviceError, MediaStatus, RemoteQueueItem};

/// Asynchronous message pushed by a receiver.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceNotification {
    MediaStatus(MediaStatus),
    MediaError(DeviceError),
    /// Heartbeat lost or socket error.
    ConnectionDead,
    /// The receiver closed the virtual connection.
    RemoteConnectionClosed,
}

/// Push channel handed to an adapter when a session starts.
///
/// Each sink is stamped with the generation of the connection it was
/// created for, so that late pushes from a previous connection can be told
/// apart and dropped by the worker.
#[derive(Clone)]
pub struct NotificationSink {
    tx: Sender<WorkerMessage>,
    generation: u64,
}

impl NotificationSink {
    pub(crate) fn new(tx: Sender<WorkerMessage>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// Forwards a notification to the session worker.
    ///
    /// Returns false once the worker is gone.
    pub fn notify(&self, notification: DeviceNotification) -> bool {
        self.tx
            .send(WorkerMessage::Notification {
                generation: self.generation,
                notification,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSink")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Blocking remote control of one receiver.
///
/// Every call may block on the network and fail with an [`AdapterError`].
/// Implementations use interior mutability: the worker only holds shared
/// references.
pub trait RemoteDevice: Send + Sync {
    fn id(&self) -> DeviceId;
    fn name(&self) -> String;

    /// Opens the control connection.
    fn connect(&self) -> Result<(), AdapterError>;
    /// Starts the receiver application `app_id`.
    fn launch_app(&self, app_id: &str) -> Result<(), AdapterError>;
    fn stop_app(&self) -> Result<(), AdapterError>;
    /// Closes the control connection. Never fails.
    fn disconnect(&self);

    /// Starts delivering pushes to `sink`, replacing any previous sink.
    fn attach(&self, sink: NotificationSink);
    fn detach(&self);

    /// Replaces the receiver queue with `items` and starts the first one.
    fn load(&self, items: &[MediaDescriptor]) -> Result<(), AdapterError>;
    fn append(&self, items: &[MediaDescriptor]) -> Result<(), AdapterError>;
    /// Inserts `items` before the item `anchor`, or at the end when `anchor`
    /// is `None`.
    fn insert_before(
        &self,
        anchor: Option<i32>,
        items: &[MediaDescriptor],
    ) -> Result<(), AdapterError>;
    fn remove_by_ids(&self, item_ids: &[i32]) -> Result<(), AdapterError>;
    /// Moves the current item by `offset` positions.
    fn jump(&self, offset: i32) -> Result<(), AdapterError>;
    /// Current receiver queue, in play order.
    fn queue_items(&self) -> Result<Vec<RemoteQueueItem>, AdapterError>;

    fn pause(&self) -> Result<MediaStatus, AdapterError>;
    fn play(&self) -> Result<MediaStatus, AdapterError>;
    fn stop(&self) -> Result<(), AdapterError>;
    fn next(&self) -> Result<(), AdapterError>;
    fn previous(&self) -> Result<(), AdapterError>;
}

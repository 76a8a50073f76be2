use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::DeviceId;
use crate::media::{MediaDescriptor, correlation_tag};
use crate::queue::SessionSnapshot;

/// A track of the local library.
///
/// Two tracks may compare equal (same song queued twice) and still be two
/// distinct queue entries: queue membership is always decided on
/// [`CorrelationId`], never on `Track` equality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Track {
    pub artist: String,
    pub album: String,
    pub name: String,
    pub path: PathBuf,
}

impl Track {
    pub fn new(
        artist: impl Into<String>,
        album: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Token minted once per queue submission of a track instance.
///
/// It travels to the receiver inside the media custom data and comes back
/// untouched in queue listings and status pushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Mints a fresh random identifier.
    pub fn mint() -> Self {
        CorrelationId(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(CorrelationId)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Why the receiver went idle. Only meaningful with [`PlayerState::Idle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum IdleReason {
    Finished,
    Cancelled,
    Interrupted,
    Error,
}

/// Error reported by the receiver itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceError {
    /// Receiver error type, e.g. `LOAD_FAILED` or `INVALID_REQUEST`.
    pub kind: String,
    pub reason: Option<String>,
    pub code: Option<i32>,
}

impl DeviceError {
    pub fn new(kind: impl Into<String>, reason: Option<String>, code: Option<i32>) -> Self {
        Self {
            kind: kind.into(),
            reason,
            code,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind.to_lowercase().replace('_', " ");
        f.write_str(&kind)?;
        match (&self.reason, self.code) {
            (Some(reason), Some(code)) => write!(f, " ({}, code {})", reason, code),
            (Some(reason), None) => write!(f, " ({})", reason),
            (None, Some(code)) => write!(f, " (code {})", code),
            (None, None) => Ok(()),
        }
    }
}

/// Unsolicited status message pushed by the receiver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaStatus {
    pub player_state: PlayerState,
    pub idle_reason: Option<IdleReason>,
    pub current_item_id: Option<i32>,
    pub media: Option<MediaDescriptor>,
}

/// One entry of the receiver queue listing, as returned by the adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteQueueItem {
    pub item_id: i32,
    /// Opaque custom data echoed by the receiver, if any.
    pub custom_data: Option<serde_json::Value>,
}

/// A listing entry once its correlation tag has been extracted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteQueueEntry {
    pub remote_item_id: i32,
    pub correlation: Option<CorrelationId>,
}

impl From<&RemoteQueueItem> for RemoteQueueEntry {
    fn from(item: &RemoteQueueItem) -> Self {
        RemoteQueueEntry {
            remote_item_id: item.item_id,
            correlation: correlation_tag(item.custom_data.as_ref()),
        }
    }
}

/// Device as listed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
}

/// Everything the session worker publishes to observers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum SessionEvent {
    DevicesChanged(Vec<DeviceSummary>),
    /// A command has been picked up by the worker.
    Busy,
    Connected {
        device_id: DeviceId,
        name: String,
    },
    Disconnected {
        device_id: DeviceId,
        reason: Option<String>,
    },
    TrackChanged(Track),
    QueueChanged(SessionSnapshot),
    PlaybackPaused,
    PlaybackPlaying,
    PlaybackStopped,
    PlaybackFinished,
    Error(String),
}

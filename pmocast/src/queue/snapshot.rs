use serde::Serialize;

use crate::model::{CorrelationId, Track};

/// One queue entry as exposed to observers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueuedTrack {
    /// Stable identity of the entry. Two entries for the same song carry
    /// two different correlations.
    pub correlation: CorrelationId,
    pub track: Track,
}

/// Read-only view of the session queue, published after every mutation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Entries in receiver order.
    pub tracks: Vec<QueuedTrack>,
    pub current_track: Option<Track>,
    /// Set when the last reconciliation could not line the local queue up
    /// with the receiver listing.
    pub desynchronized: bool,
}

impl SessionSnapshot {
    pub fn tracks(&self) -> Vec<&Track> {
        self.tracks.iter().map(|q| &q.track).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

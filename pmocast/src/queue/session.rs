use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::{CorrelationId, IdleReason, MediaStatus, PlayerState, RemoteQueueEntry, Track};

use super::snapshot::{QueuedTrack, SessionSnapshot};

/// One track of the local queue projection.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionEntry {
    pub correlation: CorrelationId,
    pub track: Track,
    /// Receiver item id, known once a listing has echoed the correlation.
    pub remote_item_id: Option<i32>,
}

/// Local projection of the receiver session.
///
/// Owned by the session worker. Commands operate on a clone and the clone
/// replaces the live value only when the command succeeded.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    entries: Vec<SessionEntry>,
    player_state: PlayerState,
    idle_reason: Option<IdleReason>,
    current_item_id: Option<i32>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the queue and forgets the playback status.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.player_state = PlayerState::Idle;
        self.idle_reason = None;
        self.current_item_id = None;
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn is_queue_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn player_state(&self) -> PlayerState {
        self.player_state
    }

    pub fn set_player_state(&mut self, state: PlayerState) {
        self.player_state = state;
        if state != PlayerState::Idle {
            self.idle_reason = None;
        }
    }

    pub fn idle_reason(&self) -> Option<IdleReason> {
        self.idle_reason
    }

    pub fn current_item_id(&self) -> Option<i32> {
        self.current_item_id
    }

    /// Folds a pushed status into the projection.
    ///
    /// When the pushed media carries a correlation tag whose entry is not
    /// bound yet, the entry gets bound to the reported current item.
    pub fn apply_status(&mut self, status: &MediaStatus) {
        self.player_state = status.player_state;
        self.idle_reason = match status.player_state {
            PlayerState::Idle => status.idle_reason,
            _ => None,
        };
        self.current_item_id = status.current_item_id;

        let Some(item_id) = status.current_item_id else {
            return;
        };
        let Some(tag) = status.media.as_ref().and_then(|m| m.correlation()) else {
            return;
        };
        if self.entries.iter().any(|e| e.remote_item_id == Some(item_id)) {
            return;
        }
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.correlation == tag && e.remote_item_id.is_none())
        {
            debug!(correlation = %tag, item_id, "Bound entry from status push");
            entry.remote_item_id = Some(item_id);
        }
    }

    fn current_index(&self) -> Option<usize> {
        let current = self.current_item_id?;
        self.entries
            .iter()
            .position(|e| e.remote_item_id == Some(current))
    }

    /// Track bound to the last pushed current item id.
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index().map(|i| &self.entries[i].track)
    }

    /// Receiver item id bound to the entry at `index`.
    pub fn item_id(&self, index: usize) -> Option<i32> {
        self.entries.get(index).and_then(|e| e.remote_item_id)
    }

    /// Signed distance from the current entry to the entry of `target`.
    ///
    /// Returns 0 when either end cannot be located.
    pub fn jump_offset(&self, target: &CorrelationId) -> i32 {
        let Some(current) = self.current_index() else {
            return 0;
        };
        match self.entries.iter().position(|e| &e.correlation == target) {
            Some(index) => index as i32 - current as i32,
            None => 0,
        }
    }

    /// Receiver item id following the current one in local order.
    ///
    /// `None` when nothing is current or the current entry is the last one.
    pub fn next_item_id(&self) -> Option<i32> {
        let current = self.current_index()?;
        self.entries.get(current + 1).and_then(|e| e.remote_item_id)
    }

    /// Rebuilds the queue from a receiver listing.
    ///
    /// The listing order wins. Entries already known are rebound to their
    /// item id, pending tracks are inserted at their listing position and
    /// consumed from `pending`. Returns true when some listing item or
    /// pending track could not be placed with certainty.
    pub fn merge_listing(
        &mut self,
        listing: &[RemoteQueueEntry],
        pending: &mut HashMap<CorrelationId, Track>,
    ) -> bool {
        let mut desynchronized = false;
        let mut previous: Vec<SessionEntry> = std::mem::take(&mut self.entries);
        let mut merged: Vec<SessionEntry> = Vec::with_capacity(listing.len());

        for (position, item) in listing.iter().enumerate() {
            match item.correlation {
                None => {
                    match previous
                        .iter()
                        .position(|e| e.remote_item_id == Some(item.remote_item_id))
                    {
                        Some(index) => merged.push(previous.remove(index)),
                        None => {
                            debug!(item_id = item.remote_item_id, "Untagged queue item");
                            desynchronized = true;
                        }
                    }
                }
                Some(correlation) => {
                    if let Some(index) = previous.iter().position(|e| e.correlation == correlation)
                    {
                        let mut entry = previous.remove(index);
                        entry.remote_item_id = Some(item.remote_item_id);
                        merged.push(entry);
                    } else if let Some(track) = pending.remove(&correlation) {
                        if position > merged.len() {
                            debug!(
                                correlation = %correlation,
                                position,
                                "Pending track listed past the rebuilt queue"
                            );
                            desynchronized = true;
                        } else {
                            merged.insert(
                                position,
                                SessionEntry {
                                    correlation,
                                    track,
                                    remote_item_id: Some(item.remote_item_id),
                                },
                            );
                        }
                    } else {
                        debug!(correlation = %correlation, "Unknown correlation in listing");
                        desynchronized = true;
                    }
                }
            }
        }

        if !pending.is_empty() {
            debug!(count = pending.len(), "Pending tracks missing from listing");
            pending.clear();
            desynchronized = true;
        }
        for dropped in previous {
            debug!(correlation = %dropped.correlation, "Entry gone from receiver queue");
        }

        self.entries = merged;
        desynchronized
    }

    /// Drops the entries the listing no longer mentions, keeping local order.
    ///
    /// Returns true when the listing holds items no kept entry accounts for.
    pub fn prune_to_listing(&mut self, listing: &[RemoteQueueEntry]) -> bool {
        let correlations: HashSet<CorrelationId> =
            listing.iter().filter_map(|i| i.correlation).collect();
        let item_ids: HashSet<i32> = listing
            .iter()
            .filter(|i| i.correlation.is_none())
            .map(|i| i.remote_item_id)
            .collect();

        self.entries.retain(|e| {
            correlations.contains(&e.correlation)
                || e.remote_item_id.is_some_and(|id| item_ids.contains(&id))
        });

        self.entries.len() != listing.len()
    }

    pub fn snapshot(&self, desynchronized: bool) -> SessionSnapshot {
        SessionSnapshot {
            tracks: self
                .entries
                .iter()
                .map(|e| QueuedTrack {
                    correlation: e.correlation,
                    track: e.track.clone(),
                })
                .collect(),
            current_track: self.current_track().cloned(),
            desynchronized,
        }
    }
}

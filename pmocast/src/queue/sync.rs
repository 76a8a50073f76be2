use std::collections::HashMap;

use tracing::{debug, warn};

use crate::adapter::RemoteDevice;
use crate::errors::CastError;
use crate::media::MediaDescriptor;
use crate::model::{CorrelationId, PlayerState, RemoteQueueEntry, Track};
use crate::resolver::UrlResolver;

use super::session::SessionState;
use super::snapshot::SessionSnapshot;

/// Where submitted tracks land in the receiver queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Replace the whole queue and start playing.
    Replace,
    /// Right after the current item.
    InsertAfterCurrent,
    AppendAtEnd,
}

/// Drives queue mutations on a receiver and folds the resulting listing
/// back into a [`SessionState`].
///
/// Every method takes the state to mutate explicitly. On error the state
/// may be partially updated: callers work on a copy.
pub struct QueueSynchronizer<'a> {
    device: &'a dyn RemoteDevice,
    resolver: &'a dyn UrlResolver,
}

impl<'a> QueueSynchronizer<'a> {
    pub fn new(device: &'a dyn RemoteDevice, resolver: &'a dyn UrlResolver) -> Self {
        Self { device, resolver }
    }

    /// Sends `tracks` to the receiver and reconciles.
    ///
    /// Tracks without an URL are skipped. Inserting or appending into an
    /// empty queue loads it instead.
    pub fn submit(
        &self,
        state: &mut SessionState,
        tracks: &[Track],
        placement: Placement,
    ) -> Result<SessionSnapshot, CastError> {
        let mut pending: HashMap<CorrelationId, Track> = HashMap::new();
        let mut items = Vec::with_capacity(tracks.len());
        for track in tracks {
            match self.resolver.resolve_url(&track.path) {
                Ok(url) => {
                    let correlation = CorrelationId::mint();
                    items.push(MediaDescriptor::tagged(&url, track, &correlation));
                    pending.insert(correlation, track.clone());
                }
                Err(err) => warn!(track = %track.name, "Skipping track: {}", err),
            }
        }
        if items.is_empty() {
            return Err(CastError::NothingToQueue);
        }

        let placement = if state.is_queue_empty() {
            Placement::Replace
        } else {
            placement
        };
        debug!(?placement, count = items.len(), "Submitting tracks");

        match placement {
            Placement::Replace => {
                if state.player_state() != PlayerState::Idle {
                    self.stop(state)?;
                }
                self.device.load(&items)?;
            }
            Placement::InsertAfterCurrent => {
                let anchor = state.next_item_id();
                self.device.insert_before(anchor, &items)?;
            }
            Placement::AppendAtEnd => self.device.append(&items)?,
        }

        self.reconcile(state, &mut pending)
    }

    /// Removes the entry at `index`, then prunes against the new listing.
    pub fn remove(
        &self,
        state: &mut SessionState,
        index: usize,
    ) -> Result<SessionSnapshot, CastError> {
        let item_id = state
            .item_id(index)
            .ok_or(CastError::NotYetSynchronized(index))?;
        self.device.remove_by_ids(&[item_id])?;

        let listing = self.fetch_listing()?;
        let desynchronized = state.prune_to_listing(&listing);
        if desynchronized {
            warn!(item_id, "Receiver queue holds untracked items after removal");
        }
        Ok(state.snapshot(desynchronized))
    }

    /// Jumps to the entry of `target`. Returns the offset sent.
    pub fn jump_to(&self, state: &SessionState, target: &CorrelationId) -> Result<i32, CastError> {
        let offset = state.jump_offset(target);
        debug!(correlation = %target, offset, "Jumping");
        self.device.jump(offset)?;
        Ok(offset)
    }

    /// Stops the receiver and empties the projection. No push is awaited.
    pub fn stop(&self, state: &mut SessionState) -> Result<(), CastError> {
        self.device.stop()?;
        state.reset();
        Ok(())
    }

    /// Pauses when playing, resumes otherwise.
    pub fn toggle_playback(&self, state: &mut SessionState) -> Result<PlayerState, CastError> {
        let status = match state.player_state() {
            PlayerState::Playing => self.device.pause()?,
            _ => self.device.play()?,
        };
        state.set_player_state(status.player_state);
        Ok(status.player_state)
    }

    pub fn next(&self) -> Result<(), CastError> {
        self.device.next()?;
        Ok(())
    }

    pub fn previous(&self) -> Result<(), CastError> {
        self.device.previous()?;
        Ok(())
    }

    /// Refetches the listing and reconciles with nothing pending.
    pub fn resync(&self, state: &mut SessionState) -> Result<SessionSnapshot, CastError> {
        self.reconcile(state, &mut HashMap::new())
    }

    fn fetch_listing(&self) -> Result<Vec<RemoteQueueEntry>, CastError> {
        let items = self.device.queue_items()?;
        Ok(items.iter().map(RemoteQueueEntry::from).collect())
    }

    fn reconcile(
        &self,
        state: &mut SessionState,
        pending: &mut HashMap<CorrelationId, Track>,
    ) -> Result<SessionSnapshot, CastError> {
        let listing = self.fetch_listing()?;
        let desynchronized = state.merge_listing(&listing, pending);
        if desynchronized {
            warn!(
                device = %self.device.id(),
                listed = listing.len(),
                tracked = state.entries().len(),
                "Local queue is out of sync with the receiver"
            );
        }
        Ok(state.snapshot(desynchronized))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::memory_device::MemoryDevice;
    use crate::resolver::MediaRootResolver;

    fn fixture() -> (MemoryDevice, MediaRootResolver) {
        let device = MemoryDevice::new("kitchen", "Kitchen");
        device.connect().unwrap();
        (device, MediaRootResolver::new("/music", "127.0.0.1", 8090))
    }

    fn track(name: &str) -> Track {
        Track::new("Artist", "Album", name, format!("/music/{name}.flac"))
    }

    fn names(snapshot: &SessionSnapshot) -> Vec<&str> {
        snapshot.tracks.iter().map(|q| q.track.name.as_str()).collect()
    }

    #[test]
    fn test_submit_on_empty_queue_loads() {
        let (device, resolver) = fixture();
        let sync = QueueSynchronizer::new(&device, &resolver);
        let mut state = SessionState::new();

        let snapshot = sync
            .submit(&mut state, &[track("A"), track("B")], Placement::AppendAtEnd)
            .unwrap();
        assert_eq!(names(&snapshot), ["A", "B"]);
        assert!(!snapshot.desynchronized);
        assert_eq!(device.queue_len(), 2);
    }

    #[test]
    fn test_insert_after_current() {
        let (device, resolver) = fixture();
        let sync = QueueSynchronizer::new(&device, &resolver);
        let mut state = SessionState::new();
        sync.submit(&mut state, &[track("A"), track("B")], Placement::Replace)
            .unwrap();
        state.apply_status(&device.status());

        let snapshot = sync
            .submit(&mut state, &[track("X")], Placement::InsertAfterCurrent)
            .unwrap();
        assert_eq!(names(&snapshot), ["A", "X", "B"]);
    }

    #[test]
    fn test_unresolvable_tracks_are_skipped() {
        let (device, resolver) = fixture();
        let sync = QueueSynchronizer::new(&device, &resolver);
        let mut state = SessionState::new();
        let outside = Track::new("a", "b", "c", Path::new("/elsewhere/c.flac"));

        let err = sync
            .submit(&mut state, &[outside.clone()], Placement::Replace)
            .unwrap_err();
        assert_eq!(err, CastError::NothingToQueue);
        assert_eq!(device.queue_len(), 0);

        let snapshot = sync
            .submit(&mut state, &[outside, track("A")], Placement::Replace)
            .unwrap();
        assert_eq!(names(&snapshot), ["A"]);
    }

    #[test]
    fn test_remove_requires_bound_item() {
        let (device, resolver) = fixture();
        let sync = QueueSynchronizer::new(&device, &resolver);
        let mut state = SessionState::new();
        assert_eq!(
            sync.remove(&mut state, 0).unwrap_err(),
            CastError::NotYetSynchronized(0)
        );
    }

    #[test]
    fn test_toggle_follows_device_response() {
        let (device, resolver) = fixture();
        let sync = QueueSynchronizer::new(&device, &resolver);
        let mut state = SessionState::new();
        sync.submit(&mut state, &[track("A")], Placement::Replace)
            .unwrap();
        state.apply_status(&device.status());

        assert_eq!(sync.toggle_playback(&mut state).unwrap(), PlayerState::Paused);
        assert_eq!(sync.toggle_playback(&mut state).unwrap(), PlayerState::Playing);
    }
}

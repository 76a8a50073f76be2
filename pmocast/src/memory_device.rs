//! In-process receiver keeping a real queue model.
//!
//! Used by the integration tests and the demo. Behaves like a cast
//! receiver: monotonic item ids, a push after every queue or track change,
//! no push on stop, pause or resume.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::DeviceId;
use crate::adapter::{DeviceNotification, NotificationSink, RemoteDevice};
use crate::errors::AdapterError;
use crate::media::MediaDescriptor;
use crate::model::{DeviceError, IdleReason, MediaStatus, PlayerState, RemoteQueueItem};

const FIRST_ITEM_ID: i32 = 1;

#[derive(Default)]
struct MemoryState {
    connected: bool,
    app_running: Option<String>,
    sink: Option<NotificationSink>,
    queue: Vec<(i32, MediaDescriptor)>,
    next_id: i32,
    current: Option<usize>,
    player_state: PlayerState,
    idle_reason: Option<IdleReason>,
    strip_custom_data: bool,
    fail_next: Option<AdapterError>,
    fail_calls: Vec<(&'static str, AdapterError)>,
    fail_connect: Option<AdapterError>,
    calls: Vec<&'static str>,
}

impl MemoryState {
    fn status(&self) -> MediaStatus {
        let item = self.current.and_then(|i| self.queue.get(i));
        MediaStatus {
            player_state: self.player_state,
            idle_reason: self.idle_reason,
            current_item_id: item.map(|(id, _)| *id),
            media: item.map(|(_, media)| self.echo(media)),
        }
    }

    fn echo(&self, media: &MediaDescriptor) -> MediaDescriptor {
        let mut media = media.clone();
        if self.strip_custom_data {
            media.custom_data = None;
        }
        media
    }

    fn push(&mut self, items: &[MediaDescriptor], at: usize) {
        for (offset, media) in items.iter().enumerate() {
            let id = self.next_id;
            self.next_id += 1;
            self.queue.insert(at + offset, (id, media.clone()));
        }
    }

    fn start(&mut self, index: usize) {
        self.current = Some(index);
        self.player_state = PlayerState::Playing;
        self.idle_reason = None;
    }

    fn go_idle(&mut self, reason: IdleReason) {
        self.current = None;
        self.player_state = PlayerState::Idle;
        self.idle_reason = Some(reason);
    }
}

pub struct MemoryDevice {
    id: DeviceId,
    name: String,
    inner: Mutex<MemoryState>,
}

impl MemoryDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(id),
            name: name.into(),
            inner: Mutex::new(MemoryState {
                next_id: FIRST_ITEM_ID,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs one queue call: consumes an injected failure, applies `op`,
    /// then pushes the resulting status outside the lock.
    fn call<T>(
        &self,
        name: &'static str,
        notify: bool,
        op: impl FnOnce(&mut MemoryState) -> Result<T, AdapterError>,
    ) -> Result<T, AdapterError> {
        let (result, push) = {
            let mut state = self.lock();
            state.calls.push(name);
            let injected = match state.fail_next.take() {
                Some(err) => Some(err),
                None => state
                    .fail_calls
                    .iter()
                    .position(|(call, _)| *call == name)
                    .map(|i| state.fail_calls.remove(i).1),
            };
            if let Some(err) = injected {
                debug!(device = %self.id, call = name, "Injected failure");
                return Err(err);
            }
            if !state.connected {
                return Err(AdapterError::Closed);
            }
            let result = op(&mut *state)?;
            let push = if notify {
                state.sink.clone().map(|sink| (sink, state.status()))
            } else {
                None
            };
            (result, push)
        };
        if let Some((sink, status)) = push {
            sink.notify(DeviceNotification::MediaStatus(status));
        }
        Ok(result)
    }

    /// Makes the next adapter call fail with `err`.
    pub fn fail_next(&self, err: AdapterError) {
        self.lock().fail_next = Some(err);
    }

    /// Makes the next call named `call` fail with `err`, whatever runs
    /// before it.
    pub fn fail_call(&self, call: &'static str, err: AdapterError) {
        self.lock().fail_calls.push((call, err));
    }

    /// Makes the next `connect` fail with `err`.
    pub fn fail_connect(&self, err: AdapterError) {
        self.lock().fail_connect = Some(err);
    }

    /// Drops custom data from listings and pushes, like a receiver that
    /// does not echo it.
    pub fn set_strip_custom_data(&self, strip: bool) {
        self.lock().strip_custom_data = strip;
    }

    /// Sends `notification` through the attached sink, if any.
    pub fn emit(&self, notification: DeviceNotification) -> bool {
        let sink = self.lock().sink.clone();
        sink.is_some_and(|s| s.notify(notification))
    }

    /// Plays the current item to its end and moves on, as the receiver
    /// would on its own.
    pub fn finish_current(&self) {
        let (sink, status) = {
            let mut state = self.lock();
            let len = state.queue.len();
            match state.current {
                Some(i) if i + 1 < len => state.start(i + 1),
                _ => state.go_idle(IdleReason::Finished),
            }
            (state.sink.clone(), state.status())
        };
        if let Some(sink) = sink {
            sink.notify(DeviceNotification::MediaStatus(status));
        }
    }

    /// Simulates a lost heartbeat.
    pub fn drop_connection(&self) {
        let sink = {
            let mut state = self.lock();
            state.connected = false;
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.notify(DeviceNotification::ConnectionDead);
        }
    }

    /// Appends an item the session never submitted, as another sender
    /// would.
    pub fn inject_foreign_item(&self, media: MediaDescriptor) -> i32 {
        let mut state = self.lock();
        let at = state.queue.len();
        state.push(std::slice::from_ref(&media), at);
        state.next_id - 1
    }

    pub fn status(&self) -> MediaStatus {
        self.lock().status()
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn queue_titles(&self) -> Vec<String> {
        self.lock()
            .queue
            .iter()
            .filter_map(|(_, m)| m.metadata.as_ref().and_then(|md| md.title.clone()))
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn running_app(&self) -> Option<String> {
        self.lock().app_running.clone()
    }

    pub fn has_sink(&self) -> bool {
        self.lock().sink.is_some()
    }

    /// Sink currently attached, to replay pushes after a reconnection.
    pub fn sink(&self) -> Option<NotificationSink> {
        self.lock().sink.clone()
    }

    /// Names of the adapter calls received so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }
}

impl RemoteDevice for MemoryDevice {
    fn id(&self) -> DeviceId {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn connect(&self) -> Result<(), AdapterError> {
        let mut state = self.lock();
        state.calls.push("connect");
        if let Some(err) = state.fail_connect.take() {
            return Err(err);
        }
        state.connected = true;
        Ok(())
    }

    fn launch_app(&self, app_id: &str) -> Result<(), AdapterError> {
        self.call("launch_app", false, |state| {
            state.app_running = Some(app_id.to_string());
            Ok(())
        })
    }

    fn stop_app(&self) -> Result<(), AdapterError> {
        self.call("stop_app", false, |state| {
            state.app_running = None;
            state.queue.clear();
            state.current = None;
            state.player_state = PlayerState::Idle;
            Ok(())
        })
    }

    fn disconnect(&self) {
        let mut state = self.lock();
        state.calls.push("disconnect");
        state.connected = false;
    }

    fn attach(&self, sink: NotificationSink) {
        self.lock().sink = Some(sink);
    }

    fn detach(&self) {
        self.lock().sink = None;
    }

    fn load(&self, items: &[MediaDescriptor]) -> Result<(), AdapterError> {
        self.call("load", true, |state| {
            state.queue.clear();
            state.push(items, 0);
            state.start(0);
            Ok(())
        })
    }

    fn append(&self, items: &[MediaDescriptor]) -> Result<(), AdapterError> {
        self.call("append", true, |state| {
            let at = state.queue.len();
            state.push(items, at);
            Ok(())
        })
    }

    fn insert_before(
        &self,
        anchor: Option<i32>,
        items: &[MediaDescriptor],
    ) -> Result<(), AdapterError> {
        self.call("insert_before", true, |state| {
            let at = match anchor {
                None => state.queue.len(),
                Some(id) => state
                    .queue
                    .iter()
                    .position(|(item_id, _)| *item_id == id)
                    .ok_or_else(|| invalid_request("unknown insertBefore item"))?,
            };
            if let Some(current) = state.current {
                if at <= current {
                    state.current = Some(current + items.len());
                }
            }
            state.push(items, at);
            Ok(())
        })
    }

    fn remove_by_ids(&self, item_ids: &[i32]) -> Result<(), AdapterError> {
        self.call("remove_by_ids", true, |state| {
            let current_id = state.current.map(|i| state.queue[i].0);
            state.queue.retain(|(id, _)| !item_ids.contains(id));
            match current_id {
                Some(id) if item_ids.contains(&id) => {
                    if state.queue.is_empty() {
                        state.go_idle(IdleReason::Interrupted);
                    } else {
                        let index = state.current.unwrap_or(0).min(state.queue.len() - 1);
                        state.start(index);
                    }
                }
                Some(id) => {
                    state.current = state.queue.iter().position(|(item, _)| *item == id);
                }
                None => {}
            }
            Ok(())
        })
    }

    fn jump(&self, offset: i32) -> Result<(), AdapterError> {
        self.call("jump", true, |state| {
            let current = state.current.ok_or_else(|| invalid_request("no current item"))?;
            let target = current as i64 + offset as i64;
            if target < 0 || target >= state.queue.len() as i64 {
                return Err(invalid_request("jump out of range"));
            }
            state.start(target as usize);
            Ok(())
        })
    }

    fn queue_items(&self) -> Result<Vec<RemoteQueueItem>, AdapterError> {
        self.call("queue_items", false, |state| {
            Ok(state
                .queue
                .iter()
                .map(|(id, media)| RemoteQueueItem {
                    item_id: *id,
                    custom_data: state.echo(media).custom_data,
                })
                .collect())
        })
    }

    fn pause(&self) -> Result<MediaStatus, AdapterError> {
        self.call("pause", false, |state| {
            if state.current.is_some() {
                state.player_state = PlayerState::Paused;
            }
            Ok(state.status())
        })
    }

    fn play(&self) -> Result<MediaStatus, AdapterError> {
        self.call("play", false, |state| {
            if state.current.is_some() {
                state.player_state = PlayerState::Playing;
            }
            Ok(state.status())
        })
    }

    fn stop(&self) -> Result<(), AdapterError> {
        self.call("stop", false, |state| {
            state.queue.clear();
            state.go_idle(IdleReason::Cancelled);
            Ok(())
        })
    }

    fn next(&self) -> Result<(), AdapterError> {
        self.call("next", true, |state| match state.current {
            Some(i) if i + 1 < state.queue.len() => {
                state.start(i + 1);
                Ok(())
            }
            _ => Err(invalid_request("no next item")),
        })
    }

    fn previous(&self) -> Result<(), AdapterError> {
        self.call("previous", true, |state| match state.current {
            Some(i) if i > 0 => {
                state.start(i - 1);
                Ok(())
            }
            _ => Err(invalid_request("no previous item")),
        })
    }
}

fn invalid_request(reason: &str) -> AdapterError {
    AdapterError::Rejected(DeviceError::new(
        "INVALID_REQUEST",
        Some(reason.to_string()),
        None,
    ))
}

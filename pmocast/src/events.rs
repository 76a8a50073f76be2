//! Fan-out of [`SessionEvent`]s to the presentation layer.
//!
//! Late subscribers miss the history, except for the device list: the last
//! `DevicesChanged` is replayed on subscription so a new picker does not
//! stay empty until the next discovery update.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::model::{DeviceSummary, SessionEvent};

#[derive(Default)]
struct BusState {
    subscribers: Vec<Sender<SessionEvent>>,
    devices: Option<Vec<DeviceSummary>>,
}

#[derive(Clone, Default)]
pub(crate) struct SessionEventBus {
    inner: Arc<Mutex<BusState>>,
}

impl SessionEventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded::<SessionEvent>();
        let mut state = self.lock();
        if let Some(devices) = &state.devices {
            // rx is alive, the send cannot fail
            let _ = tx.send(SessionEvent::DevicesChanged(devices.clone()));
        }
        state.subscribers.push(tx);
        rx
    }

    /// Sends `event` to every live subscriber and forgets the dropped ones.
    pub(crate) fn broadcast(&self, event: SessionEvent) {
        let mut state = self.lock();
        if let SessionEvent::DevicesChanged(devices) = &event {
            state.devices = Some(devices.clone());
        }
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

//! Connection lifecycle of the single active session.
//!
//! ```text
//! Disconnected --connect--> Connecting --connect+launch ok--> Connected
//!       ^                        |                                |
//!       +------- failure --------+---- disconnect / dead link ----+
//! ```
//!
//! Every transition back to `Disconnected` discards the session state,
//! detaches the push sink and bumps the generation, so that pushes still in
//! flight for the old connection are recognised as stale.

use std::sync::Arc;

use tracing::{info, warn};

use crate::DeviceId;
use crate::adapter::{NotificationSink, RemoteDevice};
use crate::errors::CastError;
use crate::queue::SessionState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting(DeviceId),
    Connected(DeviceId),
}

/// The connected device and its queue projection.
pub struct ActiveSession {
    pub device: Arc<dyn RemoteDevice>,
    pub device_id: DeviceId,
    pub name: String,
    pub state: SessionState,
    pub generation: u64,
}

pub struct ConnectionManager {
    state: ConnectionState,
    session: Option<ActiveSession>,
    generation: u64,
    app_id: String,
}

impl ConnectionManager {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: None,
            generation: 0,
            app_id: app_id.into(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when `generation` is the one of the live session.
    pub fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ActiveSession> {
        self.session.as_mut()
    }

    pub fn connected_device_id(&self) -> Option<&DeviceId> {
        self.session.as_ref().map(|s| &s.device_id)
    }

    /// Connects to `device` and launches the receiver application.
    ///
    /// `sink_for` builds the push sink for the new generation. On failure
    /// the device is disconnected and the manager is back to
    /// `Disconnected`.
    pub fn connect(
        &mut self,
        device: Arc<dyn RemoteDevice>,
        sink_for: impl FnOnce(u64) -> NotificationSink,
    ) -> Result<&ActiveSession, CastError> {
        if let Some(session) = &self.session {
            return Err(CastError::AlreadyConnected(session.name.clone()));
        }

        let device_id = device.id();
        let name = device.name();
        self.generation += 1;
        let generation = self.generation;
        self.state = ConnectionState::Connecting(device_id.clone());
        info!(device = %device_id, generation, "Connecting to {}", name);

        let result = device
            .connect()
            .and_then(|_| device.launch_app(&self.app_id));
        if let Err(err) = result {
            warn!(device = %device_id, "Connection to {} failed: {}", name, err);
            device.disconnect();
            self.state = ConnectionState::Disconnected;
            return Err(err.into());
        }

        device.attach(sink_for(generation));
        self.state = ConnectionState::Connected(device_id.clone());
        info!(device = %device_id, generation, "Connected to {}", name);

        Ok(&*self.session.insert(ActiveSession {
            device,
            device_id,
            name,
            state: SessionState::new(),
            generation,
        }))
    }

    /// Tears the session down. With `stop_app` the receiver application is
    /// stopped first, on a best-effort basis.
    ///
    /// Returns the id of the device that was connected, if any.
    pub fn disconnect(&mut self, stop_app: bool) -> Option<DeviceId> {
        let session = self.session.take()?;
        session.device.detach();
        if stop_app {
            if let Err(err) = session.device.stop_app() {
                warn!(device = %session.device_id, "Failed to stop receiver app: {}", err);
            }
        }
        session.device.disconnect();
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
        info!(device = %session.device_id, "Disconnected from {}", session.name);
        Some(session.device_id)
    }
}

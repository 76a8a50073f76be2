//! Session controller: the single ordering domain of a playback session.
//!
//! Every command, device push and discovery update goes through one
//! channel and is handled by one worker thread, in arrival order. Results
//! are published on a broadcast bus of [`SessionEvent`]s.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use pmoconfig::Config;
use tracing::{debug, error, info, warn};

use crate::DeviceId;
use crate::adapter::{DeviceNotification, NotificationSink, RemoteDevice};
use crate::errors::{CastError, PLAYBACK_ERROR};
use crate::events::SessionEventBus;
use crate::lifecycle::ConnectionManager;
use crate::model::{CorrelationId, IdleReason, PlayerState, SessionEvent, Track};
use crate::queue::{Placement, QueueSynchronizer, SessionState};
use crate::registry::DeviceRegistry;
use crate::resolver::UrlResolver;

/// Commands acting on the active session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionCommand {
    /// Replace the queue with these tracks.
    Play(Vec<Track>),
    /// Insert right after the current track.
    QueueNext(Vec<Track>),
    QueueLast(Vec<Track>),
    /// Remove the entry at this index of the last published snapshot.
    Remove(usize),
    JumpTo(CorrelationId),
    TogglePlayback,
    Stop,
    Next,
    Previous,
    Resync,
}

pub(crate) enum WorkerMessage {
    Connect(DeviceId),
    Disconnect,
    Session(SessionCommand),
    Notification {
        generation: u64,
        notification: DeviceNotification,
    },
    DeviceDiscovered(Arc<dyn RemoteDevice>),
    DeviceRemoved(DeviceId),
    Shutdown,
}

/// Handle on the session worker.
///
/// All methods post a message and return immediately; they only fail when
/// the worker is gone. Dropping the controller disconnects the active
/// session and stops the worker.
pub struct SessionController {
    tx: Sender<WorkerMessage>,
    bus: SessionEventBus,
    worker: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Spawns the worker with the thread name and receiver application id
    /// taken from `config`.
    pub fn spawn(config: &Config, resolver: Arc<dyn UrlResolver>) -> io::Result<Self> {
        Self::with_options(
            &config.get_worker_thread_name(),
            &config.get_receiver_app_id(),
            resolver,
        )
    }

    pub fn with_options(
        thread_name: &str,
        app_id: &str,
        resolver: Arc<dyn UrlResolver>,
    ) -> io::Result<Self> {
        let (tx, rx) = unbounded::<WorkerMessage>();
        let bus = SessionEventBus::new();
        let worker = SessionWorker::new(rx, tx.clone(), bus.clone(), resolver, app_id);

        let handle = thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || worker.run())?;

        Ok(Self {
            tx,
            bus,
            worker: Some(handle),
        })
    }

    /// New receiver of every event published from now on.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    fn send(&self, message: WorkerMessage) -> Result<(), CastError> {
        self.tx.send(message).map_err(|_| CastError::WorkerStopped)
    }

    pub fn submit(&self, command: SessionCommand) -> Result<(), CastError> {
        self.send(WorkerMessage::Session(command))
    }

    pub fn play(&self, tracks: Vec<Track>) -> Result<(), CastError> {
        self.submit(SessionCommand::Play(tracks))
    }

    pub fn queue_next(&self, tracks: Vec<Track>) -> Result<(), CastError> {
        self.submit(SessionCommand::QueueNext(tracks))
    }

    pub fn queue_last(&self, tracks: Vec<Track>) -> Result<(), CastError> {
        self.submit(SessionCommand::QueueLast(tracks))
    }

    pub fn remove(&self, index: usize) -> Result<(), CastError> {
        self.submit(SessionCommand::Remove(index))
    }

    pub fn jump_to(&self, correlation: CorrelationId) -> Result<(), CastError> {
        self.submit(SessionCommand::JumpTo(correlation))
    }

    pub fn toggle_playback(&self) -> Result<(), CastError> {
        self.submit(SessionCommand::TogglePlayback)
    }

    pub fn stop(&self) -> Result<(), CastError> {
        self.submit(SessionCommand::Stop)
    }

    pub fn next(&self) -> Result<(), CastError> {
        self.submit(SessionCommand::Next)
    }

    pub fn previous(&self) -> Result<(), CastError> {
        self.submit(SessionCommand::Previous)
    }

    pub fn resync(&self) -> Result<(), CastError> {
        self.submit(SessionCommand::Resync)
    }

    pub fn connect(&self, device_id: DeviceId) -> Result<(), CastError> {
        self.send(WorkerMessage::Connect(device_id))
    }

    pub fn disconnect(&self) -> Result<(), CastError> {
        self.send(WorkerMessage::Disconnect)
    }

    pub fn device_discovered(&self, device: Arc<dyn RemoteDevice>) -> Result<(), CastError> {
        self.send(WorkerMessage::DeviceDiscovered(device))
    }

    pub fn device_removed(&self, device_id: DeviceId) -> Result<(), CastError> {
        self.send(WorkerMessage::DeviceRemoved(device_id))
    }

    /// Disconnects the active session and waits for the worker to exit.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.tx.send(WorkerMessage::Shutdown);
            if handle.join().is_err() {
                error!("Session worker panicked");
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

struct SessionWorker {
    rx: Receiver<WorkerMessage>,
    tx: Sender<WorkerMessage>,
    bus: SessionEventBus,
    resolver: Arc<dyn UrlResolver>,
    registry: DeviceRegistry,
    connection: ConnectionManager,
}

impl SessionWorker {
    fn new(
        rx: Receiver<WorkerMessage>,
        tx: Sender<WorkerMessage>,
        bus: SessionEventBus,
        resolver: Arc<dyn UrlResolver>,
        app_id: &str,
    ) -> Self {
        Self {
            rx,
            tx,
            bus,
            resolver,
            registry: DeviceRegistry::new(),
            connection: ConnectionManager::new(app_id),
        }
    }

    fn run(mut self) {
        info!("Session worker started");
        while let Ok(message) = self.rx.recv() {
            match message {
                WorkerMessage::Shutdown => break,
                WorkerMessage::Connect(device_id) => self.handle_connect(device_id),
                WorkerMessage::Disconnect => self.handle_disconnect(),
                WorkerMessage::Session(command) => self.handle_command(command),
                WorkerMessage::Notification {
                    generation,
                    notification,
                } => self.handle_notification(generation, notification),
                WorkerMessage::DeviceDiscovered(device) => {
                    self.registry.add(device);
                    self.bus
                        .broadcast(SessionEvent::DevicesChanged(self.registry.list()));
                }
                WorkerMessage::DeviceRemoved(device_id) => self.handle_device_removed(device_id),
            }
        }
        if let Some(device_id) = self.connection.disconnect(true) {
            self.bus.broadcast(SessionEvent::Disconnected {
                device_id,
                reason: None,
            });
        }
        info!("Session worker stopped");
    }

    fn report(&self, err: CastError) {
        if err.is_connectivity() {
            warn!("Receiver unreachable: {}", err);
        } else if matches!(err, CastError::Device(_)) {
            warn!("Command failed: {}", err);
        } else {
            debug!("Command rejected: {}", err);
        }
        self.bus.broadcast(SessionEvent::Error(err.user_message()));
    }

    fn handle_connect(&mut self, device_id: DeviceId) {
        self.bus.broadcast(SessionEvent::Busy);

        let Some(device) = self.registry.get(&device_id) else {
            let reason = CastError::UnknownDevice(device_id.to_string()).to_string();
            warn!(device = %device_id, "{}", reason);
            self.bus.broadcast(SessionEvent::Disconnected {
                device_id,
                reason: Some(reason),
            });
            return;
        };

        let tx = self.tx.clone();
        let outcome = self
            .connection
            .connect(device, move |generation| NotificationSink::new(tx, generation))
            .map(|session| (session.device_id.clone(), session.name.clone()));

        match outcome {
            Ok((device_id, name)) => {
                self.bus
                    .broadcast(SessionEvent::Connected { device_id, name });
            }
            Err(err @ CastError::AlreadyConnected(_)) => self.report(err),
            Err(err) => self.bus.broadcast(SessionEvent::Disconnected {
                device_id,
                reason: Some(err.user_message()),
            }),
        }
    }

    fn handle_disconnect(&mut self) {
        self.bus.broadcast(SessionEvent::Busy);
        match self.connection.disconnect(true) {
            Some(device_id) => self.bus.broadcast(SessionEvent::Disconnected {
                device_id,
                reason: None,
            }),
            None => self.report(CastError::NoActiveSession),
        }
    }

    fn handle_device_removed(&mut self, device_id: DeviceId) {
        if self.connection.connected_device_id() == Some(&device_id) {
            self.teardown("device not reachable");
        }
        if self.registry.remove(&device_id).is_some() {
            self.bus
                .broadcast(SessionEvent::DevicesChanged(self.registry.list()));
        }
    }

    fn teardown(&mut self, reason: &str) {
        if let Some(device_id) = self.connection.disconnect(false) {
            warn!(device = %device_id, "Session lost: {}", reason);
            self.bus.broadcast(SessionEvent::Disconnected {
                device_id,
                reason: Some(reason.to_string()),
            });
        }
    }

    /// Runs `command` on a copy of the session state and commits the copy
    /// only if every remote call succeeded.
    fn handle_command(&mut self, command: SessionCommand) {
        self.bus.broadcast(SessionEvent::Busy);

        if self.connection.session().is_none() {
            self.report(CastError::NoActiveSession);
            return;
        }

        let outcome = {
            let Some(session) = self.connection.session_mut() else {
                return;
            };
            debug!(device = %session.device_id, ?command, "Running command");
            let sync = QueueSynchronizer::new(session.device.as_ref(), self.resolver.as_ref());
            let mut draft = session.state.clone();
            let outcome = run_command(&sync, &mut draft, command);
            if outcome.is_ok() {
                session.state = draft;
            }
            outcome
        };

        match outcome {
            Ok(events) => {
                for event in events {
                    self.bus.broadcast(event);
                }
            }
            Err(err) => self.report(err),
        }
    }

    fn handle_notification(&mut self, generation: u64, notification: DeviceNotification) {
        if !self.connection.is_current(generation) {
            debug!(generation, ?notification, "Dropping stale notification");
            return;
        }

        match notification {
            DeviceNotification::MediaStatus(status) => {
                let event = {
                    let Some(session) = self.connection.session_mut() else {
                        return;
                    };
                    session.state.apply_status(&status);
                    status_event(&session.state)
                };
                if let Some(event) = event {
                    self.bus.broadcast(event);
                }
            }
            DeviceNotification::MediaError(err) => self.report(CastError::Device(err)),
            DeviceNotification::ConnectionDead => self.teardown("connection dropped"),
            DeviceNotification::RemoteConnectionClosed => {
                self.teardown("connection closed by device")
            }
        }
    }
}

fn run_command(
    sync: &QueueSynchronizer<'_>,
    state: &mut SessionState,
    command: SessionCommand,
) -> Result<Vec<SessionEvent>, CastError> {
    let events = match command {
        SessionCommand::Play(tracks) => vec![SessionEvent::QueueChanged(sync.submit(
            state,
            &tracks,
            Placement::Replace,
        )?)],
        SessionCommand::QueueNext(tracks) => vec![SessionEvent::QueueChanged(sync.submit(
            state,
            &tracks,
            Placement::InsertAfterCurrent,
        )?)],
        SessionCommand::QueueLast(tracks) => vec![SessionEvent::QueueChanged(sync.submit(
            state,
            &tracks,
            Placement::AppendAtEnd,
        )?)],
        SessionCommand::Remove(index) => {
            vec![SessionEvent::QueueChanged(sync.remove(state, index)?)]
        }
        SessionCommand::JumpTo(correlation) => {
            sync.jump_to(state, &correlation)?;
            Vec::new()
        }
        SessionCommand::TogglePlayback => match sync.toggle_playback(state)? {
            PlayerState::Paused => vec![SessionEvent::PlaybackPaused],
            PlayerState::Playing => vec![SessionEvent::PlaybackPlaying],
            // receiver had nothing to resume, the queue is untouched
            PlayerState::Idle => {
                debug!("Toggle left the receiver idle");
                Vec::new()
            }
        },
        SessionCommand::Stop => {
            sync.stop(state)?;
            vec![
                SessionEvent::QueueChanged(state.snapshot(false)),
                SessionEvent::PlaybackStopped,
            ]
        }
        SessionCommand::Next => {
            sync.next()?;
            Vec::new()
        }
        SessionCommand::Previous => {
            sync.previous()?;
            Vec::new()
        }
        SessionCommand::Resync => vec![SessionEvent::QueueChanged(sync.resync(state)?)],
    };
    Ok(events)
}

/// Event announcing the playback status just folded into `state`.
fn status_event(state: &SessionState) -> Option<SessionEvent> {
    match state.player_state() {
        PlayerState::Paused => Some(SessionEvent::PlaybackPaused),
        PlayerState::Playing => Some(match state.current_track() {
            Some(track) => SessionEvent::TrackChanged(track.clone()),
            None => SessionEvent::Error(format!("{}No current track", PLAYBACK_ERROR)),
        }),
        PlayerState::Idle => match state.idle_reason() {
            Some(IdleReason::Cancelled) => Some(SessionEvent::PlaybackStopped),
            Some(IdleReason::Finished) => Some(SessionEvent::PlaybackFinished),
            _ => None,
        },
    }
}

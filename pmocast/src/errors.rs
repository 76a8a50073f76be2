use thiserror::Error;

use crate::model::DeviceError;

/// Prefix of every user-visible message about a failed remote call.
pub const PLAYBACK_ERROR: &str = "Playback error: ";

/// Failure of a single [`RemoteDevice`](crate::RemoteDevice) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Rejected(DeviceError),
    #[error("connection closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CastError {
    #[error("No connected device")]
    NoActiveSession,
    #[error("{0} already connected")]
    AlreadyConnected(String),
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
    /// Transport-level failure (I/O, timeout, closed socket).
    #[error("{0}")]
    Connectivity(String),
    /// The receiver rejected the command.
    #[error("{0}")]
    Device(DeviceError),
    #[error("Queue entry {0} is not synchronized with the device yet")]
    NotYetSynchronized(usize),
    #[error("Cannot resolve an URL for {0}")]
    UnresolvableTrack(String),
    #[error("No playable track to queue")]
    NothingToQueue,
    #[error("Session worker is not running")]
    WorkerStopped,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<AdapterError> for CastError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Rejected(device_error) => CastError::Device(device_error),
            other => CastError::Connectivity(other.to_string()),
        }
    }
}

impl CastError {
    /// Message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            CastError::Connectivity(_)
            | CastError::Device(_)
            | CastError::NotYetSynchronized(_)
            | CastError::UnresolvableTrack(_)
            | CastError::NothingToQueue => format!("{}{}", PLAYBACK_ERROR, self),
            _ => self.to_string(),
        }
    }

    /// True for failures that come from the network link itself.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CastError::Connectivity(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_errors_are_classified() {
        let io: CastError = AdapterError::Io("broken pipe".into()).into();
        assert!(io.is_connectivity());
        assert_eq!(io.user_message(), "Playback error: I/O error: broken pipe");

        let timeout: CastError = AdapterError::Timeout.into();
        assert_eq!(timeout, CastError::Connectivity("request timed out".into()));

        let rejected: CastError = AdapterError::Rejected(DeviceError::new(
            "LOAD_FAILED",
            Some("INVALID_PARAMS".into()),
            Some(104),
        ))
        .into();
        assert!(!rejected.is_connectivity());
        assert_eq!(
            rejected.user_message(),
            "Playback error: load failed (INVALID_PARAMS, code 104)"
        );
    }

    #[test]
    fn test_session_errors_are_not_prefixed() {
        assert_eq!(CastError::NoActiveSession.user_message(), "No connected device");
        assert_eq!(
            CastError::AlreadyConnected("Living room".into()).user_message(),
            "Living room already connected"
        );
    }
}

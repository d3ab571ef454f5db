//! Error types for manager lifecycle operations

use std::fmt;
use std::time::Duration;

/// Result type alias for manager operations
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while creating the async manager
///
/// Per-item check failures are not represented here. They travel as error
/// codes inside [`crate::poller::messages::CheckResult`] and never abort the pool.
#[derive(Debug)]
pub enum ManagerError {
    /// Invalid arguments passed to the manager
    InvalidConfig(String),

    /// Task queue could not be initialized (bad check configuration)
    QueueInit(String),

    /// The OS refused to spawn a worker thread
    WorkerSpawn {
        ordinal: usize,
        source: std::io::Error,
    },

    /// A worker thread started but failed its own initialization
    WorkerInit { ordinal: usize, message: String },

    /// Workers did not all report as started within the startup window
    StartupTimeout {
        started: usize,
        expected: usize,
        timeout: Duration,
    },
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerError::InvalidConfig(msg) => write!(f, "invalid manager arguments: {}", msg),
            ManagerError::QueueInit(msg) => write!(f, "cannot initialize task queue: {}", msg),
            ManagerError::WorkerSpawn { ordinal, source } => {
                write!(f, "cannot spawn worker #{}: {}", ordinal, source)
            }
            ManagerError::WorkerInit { ordinal, message } => {
                write!(f, "worker #{} failed to start: {}", ordinal, message)
            }
            ManagerError::StartupTimeout {
                started,
                expected,
                timeout,
            } => write!(
                f,
                "timeout occurred while waiting for workers to start ({} of {} started within {:?})",
                started, expected, timeout
            ),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManagerError::WorkerSpawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

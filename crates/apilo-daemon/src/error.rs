use thiserror::Error;

/// Daemon lifecycle errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The PID file points at a live process.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning { pid: u32 },

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

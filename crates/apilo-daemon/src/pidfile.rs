//! PID-file guarded single-instance startup.

use crate::error::DaemonError;
use std::fs;
use std::path::{Path, PathBuf};

/// Holds the daemon's PID file; removing it on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claims the PID file for this process.
    ///
    /// A file pointing at a live process refuses with `AlreadyRunning`; a
    /// stale file (dead PID or garbage content) is taken over. The write is
    /// atomic: a temp file in the same directory, then rename.
    pub fn acquire(path: &Path) -> Result<Self, DaemonError> {
        if let Ok(content) = fs::read_to_string(path) {
            if let Ok(pid) = content.trim().parse::<u32>() {
                if process_alive(pid) {
                    return Err(DaemonError::AlreadyRunning { pid });
                }
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("pid.tmp");
        fs::write(&tmp, format!("{}\n", std::process::id()))?;
        fs::rename(&tmp, path)?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Probes liveness by sending the null signal.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    // kill(pid, 0) delivers nothing; it only reports whether the process
    // exists (EPERM still means it exists).
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    false
}

//! Logging setup: stdout plus a size-rotated file sink.

use crate::config::DaemonConfig;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Default rotation threshold: 100 MiB.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 100 * 1024 * 1024;

/// An append-only file sink that rotates once the file crosses a size cap.
///
/// Rotation renames the current file with a timestamp suffix and reopens a
/// fresh one. The lock is held across the close/rename/reopen, so every
/// write issued after the swap lands in the new file.
#[derive(Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Mutex<RotatingInner>>,
}

struct RotatingInner {
    file: File,
    path: PathBuf,
    written: u64,
    max_bytes: u64,
}

impl RotatingFileWriter {
    /// Opens (creating directories as needed) the log file in append mode.
    pub fn new(path: PathBuf, max_bytes: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(RotatingInner {
                file,
                path,
                written,
                max_bytes,
            })),
        })
    }

    /// Path of the active log file.
    pub fn path(&self) -> PathBuf {
        self.inner.lock().path.clone()
    }
}

impl RotatingInner {
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let rotated = PathBuf::from(format!("{}.{}", self.path.display(), stamp));
        fs::rename(&self.path, &rotated)?;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.written + buf.len() as u64 > inner.max_bytes && inner.written > 0 {
            // Rotation failure must not take down the request path; keep
            // writing to the oversized file and retry on the next write.
            if let Err(err) = inner.rotate() {
                eprintln!("apilo: log rotation failed: {err}");
            }
        }
        let n = inner.file.write(buf)?;
        inner.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Parses a level name; anything unrecognized falls back to INFO.
pub fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Installs the global subscriber: one fmt layer to stdout, one to the
/// rotating file. Returns the file writer for introspection. Safe to call
/// more than once; later calls keep the first subscriber.
pub fn init_logging(config: &DaemonConfig) -> io::Result<RotatingFileWriter> {
    let level = parse_level(&config.log_level);
    let writer = RotatingFileWriter::new(config.log_file_path(), DEFAULT_MAX_LOG_BYTES)?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(level));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer.clone())
        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(level));

    let _ = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    Ok(writer)
}

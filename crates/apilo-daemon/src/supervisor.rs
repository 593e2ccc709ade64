//! Daemon lifecycle: PID guard, component wiring, background loops,
//! signal-driven shutdown.

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::pidfile::PidFile;
use crate::server::{self, AppState};
use crate::sysinfo::{memory_rss_bytes, CpuSampler};
use apilo_analytics::{AlertManager, DaemonMetrics};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Metrics sampler tick.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on the shutdown drain.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// A running daemon instance.
///
/// Owns the lifetimes of every component and the root cancellation token;
/// every background loop observes that token.
pub struct Daemon {
    state: AppState,
    pid_file: PidFile,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
    server: JoinHandle<std::io::Result<()>>,
    workers: Vec<JoinHandle<()>>,
    proxy: Option<tokio::process::Child>,
}

impl Daemon {
    /// Starts the daemon: claims the PID file, wires the cache, analytics,
    /// metrics, breaker/failover, and optimizer, binds the loopback control
    /// server, and launches the background loops.
    pub async fn start(config: DaemonConfig) -> Result<Self, DaemonError> {
        config.validate()?;
        let pid_file = PidFile::acquire(&config.pid_file_path())?;
        let shutdown = CancellationToken::new();

        let metrics_enabled = config.metrics_enabled;
        let port = config.port;
        let state = AppState::new(config, shutdown.clone())?;

        // Best-effort: a missing or broken proxy never blocks startup.
        let proxy = spawn_proxy();

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
        let local_addr = listener.local_addr()?;

        let server = tokio::spawn(server::serve(
            listener,
            state.clone(),
            shutdown.clone(),
        ));

        let mut workers = Vec::new();
        if metrics_enabled {
            workers.push(spawn_sampler(
                state.metrics.clone(),
                state.alerts.clone(),
                shutdown.clone(),
            ));
        }
        if let Some(manager) = state.optimizer.failover() {
            workers.push(manager.spawn_recovery(shutdown.clone()));
        }

        tracing::info!(addr = %local_addr, pid = std::process::id(), "apilo daemon started");

        Ok(Self {
            state,
            pid_file,
            shutdown,
            local_addr,
            server,
            workers,
            proxy,
        })
    }

    /// Address the control server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared state, for embedding and tests.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Blocks on the signal set: SIGTERM/SIGINT stop the daemon, SIGHUP
    /// logs a reload note and keeps running.
    #[cfg(unix)]
    pub async fn run(self) -> Result<(), DaemonError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("SIGTERM received");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!("SIGINT received");
                    break;
                }
                _ = sighup.recv() => {
                    tracing::info!("SIGHUP received; config reload applies on restart");
                }
            }
        }
        self.stop().await
    }

    #[cfg(not(unix))]
    pub async fn run(self) -> Result<(), DaemonError> {
        tokio::signal::ctrl_c().await?;
        self.stop().await
    }

    /// Cancels the root token, drains workers (bounded), stops the proxy
    /// child, and removes the PID file.
    pub async fn stop(self) -> Result<(), DaemonError> {
        let Daemon {
            state: _,
            pid_file,
            shutdown,
            local_addr: _,
            server,
            workers,
            proxy,
        } = self;

        tracing::info!("shutting down");
        shutdown.cancel();

        let drain = async move {
            let _ = server.await;
            for worker in workers {
                let _ = worker.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_DRAIN, drain).await.is_err() {
            tracing::warn!("shutdown drain exceeded {SHUTDOWN_DRAIN:?}; detaching workers");
        }

        if let Some(mut child) = proxy {
            let _ = child.kill().await;
        }

        // Dropping the guard removes the PID file.
        drop(pid_file);
        tracing::info!("daemon stopped");
        Ok(())
    }
}

/// 5-second tick: CPU estimate, resident memory, alert evaluation.
fn spawn_sampler(
    metrics: DaemonMetrics,
    alerts: AlertManager,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = CpuSampler::new();
        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    metrics.set_cpu_percent(sampler.sample());
                    metrics.set_memory_bytes(memory_rss_bytes());
                    alerts.evaluate(&metrics.snapshot());
                }
            }
        }
    })
}

/// Spawns the external TLS-intercepting proxy when `APILO_PROXY_CMD` is
/// set. Failure logs a warning and startup continues.
fn spawn_proxy() -> Option<tokio::process::Child> {
    let command = std::env::var("APILO_PROXY_CMD").ok()?;
    let mut parts = command.split_whitespace();
    let program = parts.next()?;

    match tokio::process::Command::new(program).args(parts).spawn() {
        Ok(child) => {
            tracing::info!(%command, "proxy child started");
            Some(child)
        }
        Err(err) => {
            tracing::warn!(%command, error = %err, "proxy child failed to start; continuing");
            None
        }
    }
}

//! `apilod` — the apilo optimization daemon.

use apilo_daemon::{logger, Daemon, DaemonConfig};

#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("apilod: {err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = logger::init_logging(&config) {
        eprintln!("apilod: failed to initialize logging: {err}");
        std::process::exit(2);
    }

    let daemon = match Daemon::start(config).await {
        Ok(daemon) => daemon,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            eprintln!("apilod: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = daemon.run().await {
        tracing::error!(error = %err, "daemon exited with error");
        std::process::exit(1);
    }
}

/// Optional single argument: a path to a JSON config document (the same
/// shape `/config` serves). No argument runs on defaults.
fn load_config() -> Result<DaemonConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| format!("reading config {path}: {e}"))?;
            let config: DaemonConfig = serde_json::from_str(&content)
                .map_err(|e| format!("parsing config {path}: {e}"))?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(DaemonConfig::default()),
    }
}

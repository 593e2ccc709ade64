//! The apilo daemon: a local per-user HTTP optimization service.
//!
//! A long-running process accepts optimization requests over a loopback
//! control interface, forwards the underlying HTTP call to the origin over
//! pooled connections, and serves identical subsequent requests from a
//! memory-bounded response cache. Around that core: rolling analytics, a
//! circuit-breaker/failover pair guarding the upstream, and observability
//! endpoints.
//!
//! The binary entry point is `apilod`; the library surface exists for
//! integration tests and embedding.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logger;
pub mod optimizer;
pub mod pidfile;
pub mod server;
pub mod supervisor;
pub mod sysinfo;

pub use config::DaemonConfig;
pub use error::DaemonError;
pub use optimizer::{OptimizeError, OptimizeOutcome, Optimizer, OptimizerRequest};
pub use supervisor::Daemon;

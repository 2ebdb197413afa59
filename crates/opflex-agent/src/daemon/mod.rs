//! Daemon event loop: registers the C1-C9 Orchs and drives them to
//! completion in priority order off a heartbeat plus the stop/reload
//! signal pair.

pub mod orchdaemon;

pub use orchdaemon::{DaemonSignals, OrchDaemon, OrchDaemonConfig};

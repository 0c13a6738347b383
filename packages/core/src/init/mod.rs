//! Minimal init for the agent container
//!
//! `wpt-init -- <shell> <entrypoint-script>` runs as PID 1. It spawns the
//! entrypoint in its own process group, relays termination and reload
//! signals to that group, reaps every terminated descendant and exits with
//! the agent's status.

mod child;
mod error;
mod signals;
mod supervisor;

pub use child::{ChildExit, LaunchCommand, SupervisedChild, reap_zombies, spawn_child};
pub use error::LaunchError;
pub use signals::{ForwardedSignal, ForwardedSignals};
pub use supervisor::{
    InitEvent, InitSettings, REAP_INTERVAL, enable_subreaper, run_init, spawn_signal_listeners,
    supervise,
};

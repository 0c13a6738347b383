//! PID-1 supervision loop
//!
//! Signal listeners are registered before the agent is spawned so nothing
//! sent during startup is lost. Each listener feeds one channel; the loop
//! forwards signals to the agent's process group and reaps on `SIGCHLD` or
//! on a periodic tick, whichever comes first.

use super::child::{ChildExit, LaunchCommand, SupervisedChild, reap_zombies, spawn_child};
use super::error::LaunchError;
use super::signals::{ForwardedSignal, ForwardedSignals};
use std::io;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Backstop for coalesced or missed `SIGCHLD` deliveries
pub const REAP_INTERVAL: Duration = Duration::from_millis(500);

/// Something the supervision loop must react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitEvent {
    /// A signal init received that belongs to the agent
    Forward(ForwardedSignal),
    /// `SIGCHLD`: some descendant changed state
    ChildStateChanged,
}

/// Everything `wpt-init` needs to run
#[derive(Debug, Clone)]
pub struct InitSettings {
    pub command: LaunchCommand,
    pub signals: ForwardedSignals,
    /// Become a child subreaper when not running as PID 1
    pub subreaper: bool,
}

impl InitSettings {
    pub fn new(command: LaunchCommand) -> Self {
        Self {
            command,
            signals: ForwardedSignals::default(),
            subreaper: true,
        }
    }
}

/// Install one listener task per forwarded signal plus `SIGCHLD`.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_signal_listeners(
    signals: &ForwardedSignals,
) -> Result<mpsc::UnboundedReceiver<InitEvent>, LaunchError> {
    let (tx, rx) = mpsc::unbounded_channel();

    for forwarded in signals.iter() {
        let mut stream =
            signal(forwarded.kind()).map_err(|source| LaunchError::SignalRegistration {
                signal: forwarded.name(),
                source,
            })?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(InitEvent::Forward(forwarded)).is_err() {
                    break;
                }
            }
        });
    }

    let mut children =
        signal(SignalKind::child()).map_err(|source| LaunchError::SignalRegistration {
            signal: "CHLD",
            source,
        })?;
    tokio::spawn(async move {
        while children.recv().await.is_some() {
            if tx.send(InitEvent::ChildStateChanged).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

/// Run until the main child terminates, then return how it ended.
///
/// Without an event channel (or once it closes) reaping falls back to the
/// periodic tick alone.
pub async fn supervise(
    child: &SupervisedChild,
    mut events: Option<mpsc::UnboundedReceiver<InitEvent>>,
) -> Result<ChildExit, LaunchError> {
    let mut tick = tokio::time::interval(REAP_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if let Some(exit) = reap_zombies(child.pid)? {
            return Ok(exit);
        }

        let (event, closed) = next_event(events.as_mut(), &mut tick).await;
        if closed {
            debug!("Signal channel closed, reaping on tick only");
            events = None;
        }

        match event {
            Some(InitEvent::Forward(forwarded)) => {
                if let Err(err) = child.forward(forwarded) {
                    warn!("Failed to forward {forwarded} to the agent: {err}");
                }
            }
            Some(InitEvent::ChildStateChanged) | None => {}
        }
    }
}

async fn next_event(
    events: Option<&mut mpsc::UnboundedReceiver<InitEvent>>,
    tick: &mut Interval,
) -> (Option<InitEvent>, bool) {
    match events {
        Some(rx) => tokio::select! {
            event = rx.recv() => match event {
                Some(event) => (Some(event), false),
                None => (None, true),
            },
            _ = tick.tick() => (None, false),
        },
        None => {
            tick.tick().await;
            (None, false)
        }
    }
}

/// Ask the kernel to reparent orphaned descendants to this process.
///
/// Only needed when init is not PID 1 (e.g. `docker run --init` already
/// occupies it). Returns `false` where unsupported.
pub fn enable_subreaper() -> io::Result<bool> {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: PR_SET_CHILD_SUBREAPER takes a plain integer argument
        let rc = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1, 0, 0, 0) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(true)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Ok(false)
    }
}

/// Launch the agent under supervision and return the container exit status.
///
/// A launch error is returned before any child exists; the caller maps it
/// to [`LaunchError::exit_code`].
pub async fn run_init(settings: InitSettings) -> Result<i32, LaunchError> {
    settings.command.preflight()?;

    let events = spawn_signal_listeners(&settings.signals)?;

    if settings.subreaper && std::process::id() != 1 {
        match enable_subreaper() {
            Ok(true) => debug!("Registered as child subreaper"),
            Ok(false) => debug!("Child subreaper not supported on this platform"),
            Err(err) => warn!("Could not become child subreaper: {err}"),
        }
    }

    let child = spawn_child(&settings.command)?;
    info!(
        "Started agent (pid {}) via {}",
        child.pid,
        settings.command.script.display()
    );

    let exit = supervise(&child, Some(events)).await?;
    match exit {
        ChildExit::Exited(code) => info!("Agent exited with status {code}"),
        ChildExit::Signaled(sig) => info!("Agent killed by signal {sig}"),
    }
    Ok(exit.exit_code())
}

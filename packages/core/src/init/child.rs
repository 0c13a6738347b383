//! Launching and reaping the supervised agent process

use super::error::LaunchError;
use super::signals::ForwardedSignal;
use crate::config::Config;
use std::ffi::OsStr;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

/// The fixed `shell entrypoint-script` invocation run under init
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub shell: PathBuf,
    pub script: PathBuf,
    /// Extra arguments passed to the script, normally empty
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(shell: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            script: script.into(),
            args: Vec::new(),
        }
    }

    /// Command baked into the image for this config
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.shell, config.entrypoint_script_path())
    }

    /// Build from the arguments following `--`.
    ///
    /// An empty argv falls back to the default image command.
    pub fn from_argv(argv: &[String]) -> Result<Self, LaunchError> {
        match argv {
            [] => Ok(Self::from_config(&Config::default())),
            [shell] => Err(LaunchError::IncompleteCommand(shell.clone())),
            [shell, script, args @ ..] => Ok(Self {
                shell: PathBuf::from(shell),
                script: PathBuf::from(script),
                args: args.to_vec(),
            }),
        }
    }

    /// Check the shell and script before anything is spawned
    pub fn preflight(&self) -> Result<PathBuf, LaunchError> {
        let shell = resolve_program(&self.shell).ok_or_else(|| LaunchError::Missing {
            what: "Shell",
            path: self.shell.clone(),
        })?;
        check_executable("Shell", &shell)?;
        check_executable("Entrypoint script", &self.script)?;
        Ok(shell)
    }

    fn display(&self) -> String {
        let mut parts = vec![
            self.shell.display().to_string(),
            self.script.display().to_string(),
        ];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn check_executable(what: &'static str, path: &Path) -> Result<(), LaunchError> {
    let metadata = std::fs::metadata(path).map_err(|_| LaunchError::Missing {
        what,
        path: path.to_path_buf(),
    })?;
    if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
        return Err(LaunchError::NotExecutable {
            what,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Resolve a bare program name through `PATH`; paths are returned as given
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return Some(program.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// How the main child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Exited(i32),
    Signaled(i32),
}

impl ChildExit {
    /// Decode a `waitpid` status; `None` for stop/continue notifications
    pub fn from_wait_status(status: libc::c_int) -> Option<Self> {
        if libc::WIFEXITED(status) {
            Some(ChildExit::Exited(libc::WEXITSTATUS(status)))
        } else if libc::WIFSIGNALED(status) {
            Some(ChildExit::Signaled(libc::WTERMSIG(status)))
        } else {
            None
        }
    }

    /// Container exit status: the child's code, or 128 + signal number
    pub fn exit_code(self) -> i32 {
        match self {
            ChildExit::Exited(code) => code,
            ChildExit::Signaled(signal) => 128 + signal,
        }
    }
}

/// The running agent, leader of its own process group
#[derive(Debug, Clone, Copy)]
pub struct SupervisedChild {
    pub pid: libc::pid_t,
    pub pgid: libc::pid_t,
}

impl SupervisedChild {
    /// Send `signal` to the child's whole process group.
    ///
    /// A group that has already exited is not an error.
    pub fn forward(&self, signal: ForwardedSignal) -> io::Result<()> {
        debug!("Forwarding {signal} to process group {}", self.pgid);
        // SAFETY: kill has no memory-safety preconditions
        let rc = unsafe { libc::kill(-self.pgid, signal.as_raw()) };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
            trace!("Process group {} already gone", self.pgid);
        }
        Ok(())
    }
}

/// Preflight then spawn the command in a new process group.
///
/// The std `Child` handle is dropped; the child is collected by
/// [`reap_zombies`] like every other terminated descendant.
pub fn spawn_child(command: &LaunchCommand) -> Result<SupervisedChild, LaunchError> {
    let shell = command.preflight()?;
    debug!("Spawning {}", command.display());

    let mut cmd = Command::new(&shell);
    cmd.arg(&command.script)
        .args(command.args.iter().map(OsStr::new));

    // SAFETY: only async-signal-safe libc calls run between fork and exec
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            // Hand the terminal to the new group so interactive runs still read stdin
            if libc::isatty(libc::STDIN_FILENO) == 1 {
                let previous = libc::signal(libc::SIGTTOU, libc::SIG_IGN);
                libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpgrp());
                libc::signal(libc::SIGTTOU, previous);
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: shell.clone(),
        source,
    })?;
    let pid = child.id() as libc::pid_t;
    Ok(SupervisedChild { pid, pgid: pid })
}

/// Collect every terminated child without blocking.
///
/// Returns the main child's exit if it was among them. Orphans adopted by
/// init are reaped and discarded.
pub fn reap_zombies(main_pid: libc::pid_t) -> Result<Option<ChildExit>, LaunchError> {
    let mut main_exit = None;
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: status is a valid out-pointer for the duration of the call
        let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
        match pid {
            0 => break,
            -1 => {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::ECHILD) => break,
                    Some(libc::EINTR) => continue,
                    _ => return Err(LaunchError::Wait(err)),
                }
            }
            pid if pid == main_pid => {
                main_exit = ChildExit::from_wait_status(status);
                debug!("Agent process {pid} terminated: {main_exit:?}");
            }
            pid => trace!("Reaped orphan {pid}"),
        }
    }
    Ok(main_exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str, mode: u32) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn wait_for_exit(child: &SupervisedChild) -> ChildExit {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(exit) = reap_zombies(child.pid).unwrap() {
                return exit;
            }
            assert!(Instant::now() < deadline, "child did not exit");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn argv_with_shell_and_script() {
        let argv: Vec<String> = ["/bin/bash", "/wptagent/entrypoint.sh", "--fast"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cmd = LaunchCommand::from_argv(&argv).unwrap();
        assert_eq!(cmd.shell, PathBuf::from("/bin/bash"));
        assert_eq!(cmd.script, PathBuf::from("/wptagent/entrypoint.sh"));
        assert_eq!(cmd.args, vec!["--fast".to_string()]);
    }

    #[test]
    fn empty_argv_uses_image_default() {
        let cmd = LaunchCommand::from_argv(&[]).unwrap();
        assert_eq!(cmd.shell, PathBuf::from("/bin/bash"));
        assert_eq!(
            cmd.script,
            PathBuf::from("/wptagent/docker/linux-headless/entrypoint.sh")
        );
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn shell_alone_is_incomplete() {
        let err = LaunchCommand::from_argv(&["/bin/bash".to_string()]).unwrap_err();
        assert!(matches!(err, LaunchError::IncompleteCommand(_)));
    }

    #[test]
    fn preflight_rejects_missing_script() {
        let dir = TempDir::new().unwrap();
        let cmd = LaunchCommand::new("/bin/sh", dir.path().join("entrypoint.sh"));
        let err = cmd.preflight().unwrap_err();
        assert_eq!(err.exit_code(), 127);
        assert!(err.to_string().contains("Entrypoint script not found"));
    }

    #[test]
    fn preflight_rejects_non_executable_script() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "entrypoint.sh", "exit 0", 0o644);
        let err = LaunchCommand::new("/bin/sh", script).preflight().unwrap_err();
        assert_eq!(err.exit_code(), 126);
    }

    #[test]
    fn preflight_rejects_missing_shell() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "entrypoint.sh", "exit 0", 0o755);
        let err = LaunchCommand::new(dir.path().join("no-such-shell"), script)
            .preflight()
            .unwrap_err();
        assert!(matches!(err, LaunchError::Missing { what: "Shell", .. }));
    }

    #[test]
    fn preflight_resolves_bare_shell_through_path() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "entrypoint.sh", "exit 0", 0o755);
        let shell = LaunchCommand::new("sh", script).preflight().unwrap();
        assert!(shell.is_absolute());
    }

    #[test]
    fn wait_status_decoding() {
        assert_eq!(ChildExit::from_wait_status(3 << 8), Some(ChildExit::Exited(3)));
        assert_eq!(
            ChildExit::from_wait_status(libc::SIGTERM),
            Some(ChildExit::Signaled(libc::SIGTERM))
        );
        assert_eq!(ChildExit::Exited(0).exit_code(), 0);
        assert_eq!(ChildExit::Signaled(libc::SIGTERM).exit_code(), 143);
    }

    #[test]
    #[serial]
    fn spawned_child_leads_its_own_group() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "entrypoint.sh", "exit 5", 0o755);
        let child = spawn_child(&LaunchCommand::new("/bin/sh", script)).unwrap();
        assert_eq!(child.pgid, child.pid);
        assert_ne!(child.pgid, unsafe { libc::getpgrp() });
        assert_eq!(wait_for_exit(&child), ChildExit::Exited(5));
    }

    #[test]
    #[serial]
    fn missing_script_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let cmd = LaunchCommand::new("/bin/sh", dir.path().join("missing.sh"));
        assert!(spawn_child(&cmd).is_err());
        assert_eq!(reap_zombies(-1).unwrap(), None);
    }

    #[test]
    #[serial]
    fn forward_reaches_the_child() {
        let dir = TempDir::new().unwrap();
        let ready = dir.path().join("ready");
        let script = write_script(
            &dir,
            "entrypoint.sh",
            &format!(
                "trap 'exit 42' TERM\ntouch {}\nwhile true; do sleep 0.05; done",
                ready.display()
            ),
            0o755,
        );
        let child = spawn_child(&LaunchCommand::new("/bin/sh", script)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !ready.exists() {
            assert!(Instant::now() < deadline, "script never became ready");
            std::thread::sleep(Duration::from_millis(20));
        }

        child.forward(ForwardedSignal::Term).unwrap();
        assert_eq!(wait_for_exit(&child), ChildExit::Exited(42));
    }

    #[test]
    #[serial]
    fn forward_to_exited_group_is_ok() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "entrypoint.sh", "exit 0", 0o755);
        let child = spawn_child(&LaunchCommand::new("/bin/sh", script)).unwrap();
        wait_for_exit(&child);
        assert!(child.forward(ForwardedSignal::Term).is_ok());
    }
}

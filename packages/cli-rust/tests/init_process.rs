//! End-to-end checks of the wpt-init binary

use assert_cmd::cargo;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn script(dir: &Path, body: &str, mode: u32) -> PathBuf {
    let path = dir.join("entrypoint.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    path
}

fn wpt_init() -> Command {
    Command::new(cargo::cargo_bin!("wpt-init"))
}

#[test]
fn help_shows_usage() {
    wpt_init()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--signal"));
}

#[test]
fn exit_status_is_propagated() {
    let dir = TempDir::new().unwrap();
    let entrypoint = script(dir.path(), "echo agent-ran\nexit 9", 0o755);
    wpt_init()
        .arg("--")
        .arg("/bin/sh")
        .arg(&entrypoint)
        .assert()
        .code(9)
        .stdout(predicate::str::contains("agent-ran"));
}

#[test]
fn missing_entrypoint_exits_non_zero_without_running() {
    let dir = TempDir::new().unwrap();
    wpt_init()
        .arg("--")
        .arg("/bin/sh")
        .arg(dir.path().join("entrypoint.sh"))
        .assert()
        .code(127)
        .stderr(predicate::str::contains("Entrypoint script not found"));
}

#[test]
fn non_executable_entrypoint_exits_126() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("ran");
    let entrypoint = script(
        dir.path(),
        &format!("touch {}", marker.display()),
        0o644,
    );
    wpt_init()
        .arg("--")
        .arg("/bin/sh")
        .arg(&entrypoint)
        .assert()
        .code(126);
    assert!(!marker.exists(), "agent must not be spawned");
}

#[test]
fn unknown_signal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let entrypoint = script(dir.path(), "exit 0", 0o755);
    wpt_init()
        .args(["--signal", "KILL", "--", "/bin/sh"])
        .arg(&entrypoint)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown signal 'KILL'"));
}

#[test]
fn sigterm_reaches_the_agent() {
    let dir = TempDir::new().unwrap();
    let ready = dir.path().join("ready");
    let got_term = dir.path().join("got-term");
    let entrypoint = script(
        dir.path(),
        &format!(
            "trap 'touch {}; exit 42' TERM\ntouch {}\nwhile true; do sleep 0.05; done",
            got_term.display(),
            ready.display()
        ),
        0o755,
    );

    let mut child = wpt_init()
        .arg("--")
        .arg("/bin/sh")
        .arg(&entrypoint)
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !ready.exists() {
        assert!(Instant::now() < deadline, "agent never started");
        std::thread::sleep(Duration::from_millis(20));
    }

    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    assert_eq!(rc, 0);

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(Instant::now() < deadline, "init did not exit after SIGTERM");
        std::thread::sleep(Duration::from_millis(20));
    };

    assert!(got_term.exists(), "agent did not receive SIGTERM");
    assert_eq!(status.code(), Some(42));
}

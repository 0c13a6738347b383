//! `wpt-init` entry point
//!
//! Parses `wpt-init [--signal NAME]... [--no-signals] [--no-subreaper] -- <shell> <script>`,
//! runs the supervisor on a single-threaded runtime and turns the outcome
//! into the process exit status.

use clap::Parser;
use console::style;
use tracing::error;
use wptagent_image_core::init::{
    ForwardedSignals, InitSettings, LaunchCommand, LaunchError, run_init as supervise_agent,
};

/// Minimal PID-1 init for the wptagent container
#[derive(Parser, Debug)]
#[command(name = "wpt-init")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run the wptagent entrypoint as a supervised child of PID 1", long_about = None)]
struct InitCli {
    /// Signal to forward to the agent (repeatable; default: HUP INT QUIT TERM USR1 USR2 WINCH)
    #[arg(long = "signal", value_name = "NAME")]
    signals: Vec<String>,

    /// Forward no signals to the agent
    #[arg(long, conflicts_with = "signals")]
    no_signals: bool,

    /// Do not register as child subreaper when running below PID 1
    #[arg(long)]
    no_subreaper: bool,

    /// Increase verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Shell and entrypoint script to run
    #[arg(last = true, value_name = "SHELL SCRIPT")]
    command: Vec<String>,
}

impl InitCli {
    fn settings(&self) -> Result<InitSettings, LaunchError> {
        let signals = if self.no_signals {
            ForwardedSignals::parse::<&str>(&[])?
        } else if self.signals.is_empty() {
            ForwardedSignals::default()
        } else {
            ForwardedSignals::parse(&self.signals)?
        };
        Ok(InitSettings {
            command: LaunchCommand::from_argv(&self.command)?,
            signals,
            subreaper: !self.no_subreaper,
        })
    }
}

/// Run `wpt-init` and return the exit status for the container
pub fn run_init() -> i32 {
    let cli = InitCli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(crate::log_filter(cli.verbose, false))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => return report(&e),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {e}");
            return 1;
        }
    };

    match runtime.block_on(supervise_agent(settings)) {
        Ok(code) => code,
        Err(e) => report(&e),
    }
}

fn report(e: &LaunchError) -> i32 {
    eprintln!("{} {e}", style("wpt-init:").red().bold());
    e.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn command_follows_double_dash() {
        let cli = InitCli::try_parse_from([
            "wpt-init",
            "--",
            "/bin/bash",
            "/wptagent/docker/linux-headless/entrypoint.sh",
        ])
        .unwrap();
        let settings = cli.settings().unwrap();
        assert_eq!(settings.command.shell, PathBuf::from("/bin/bash"));
        assert!(settings.subreaper);
        assert_eq!(settings.signals, ForwardedSignals::default());
    }

    #[test]
    fn custom_signal_set() {
        let cli = InitCli::try_parse_from([
            "wpt-init",
            "--signal",
            "SIGTERM",
            "--signal",
            "usr1",
            "--no-subreaper",
            "--",
            "/bin/sh",
            "/entrypoint.sh",
        ])
        .unwrap();
        let settings = cli.settings().unwrap();
        assert_eq!(settings.signals, ForwardedSignals::parse(&["TERM", "USR1"]).unwrap());
        assert!(!settings.subreaper);
    }

    #[test]
    fn no_signals_forwards_nothing() {
        let cli = InitCli::try_parse_from(["wpt-init", "--no-signals", "--", "/bin/sh", "/e.sh"])
            .unwrap();
        assert!(cli.settings().unwrap().signals.is_empty());

        assert!(
            InitCli::try_parse_from([
                "wpt-init",
                "--no-signals",
                "--signal",
                "TERM",
                "--",
                "/bin/sh",
                "/e.sh"
            ])
            .is_err()
        );
    }

    #[test]
    fn plan_signal_flags_round_trip() {
        let wanted = ForwardedSignals::parse(&["TERM", "USR2"]).unwrap();
        let mut argv = vec!["wpt-init".to_string()];
        argv.extend(wanted.to_init_args());
        argv.extend(["--", "/bin/sh", "/e.sh"].map(String::from));
        let cli = InitCli::try_parse_from(argv).unwrap();
        assert_eq!(cli.settings().unwrap().signals, wanted);
    }

    #[test]
    fn unknown_signal_is_a_usage_error() {
        let cli =
            InitCli::try_parse_from(["wpt-init", "--signal", "KILL", "--", "/bin/sh", "/e.sh"])
                .unwrap();
        assert_eq!(cli.settings().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn command_without_double_dash_is_rejected() {
        assert!(InitCli::try_parse_from(["wpt-init", "/bin/sh", "/e.sh"]).is_err());
    }
}

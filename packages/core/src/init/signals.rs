//! Signals the init process relays to the agent's process group

use super::error::LaunchError;
use std::fmt;
use tokio::signal::unix::SignalKind;

/// A catchable signal that PID 1 passes on to the child process group.
///
/// `KILL` and `STOP` cannot be caught and `CHLD` drives reaping, so none of
/// them appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardedSignal {
    Hup,
    Int,
    Quit,
    Term,
    Usr1,
    Usr2,
    Winch,
    Alrm,
    Cont,
}

const ALL: [ForwardedSignal; 9] = [
    ForwardedSignal::Hup,
    ForwardedSignal::Int,
    ForwardedSignal::Quit,
    ForwardedSignal::Term,
    ForwardedSignal::Usr1,
    ForwardedSignal::Usr2,
    ForwardedSignal::Winch,
    ForwardedSignal::Alrm,
    ForwardedSignal::Cont,
];

impl ForwardedSignal {
    /// Parse `TERM`, `SIGTERM` or `sigterm`
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        ALL.into_iter().find(|signal| signal.name() == bare)
    }

    /// Name without the `SIG` prefix
    pub fn name(self) -> &'static str {
        match self {
            ForwardedSignal::Hup => "HUP",
            ForwardedSignal::Int => "INT",
            ForwardedSignal::Quit => "QUIT",
            ForwardedSignal::Term => "TERM",
            ForwardedSignal::Usr1 => "USR1",
            ForwardedSignal::Usr2 => "USR2",
            ForwardedSignal::Winch => "WINCH",
            ForwardedSignal::Alrm => "ALRM",
            ForwardedSignal::Cont => "CONT",
        }
    }

    pub fn as_raw(self) -> libc::c_int {
        match self {
            ForwardedSignal::Hup => libc::SIGHUP,
            ForwardedSignal::Int => libc::SIGINT,
            ForwardedSignal::Quit => libc::SIGQUIT,
            ForwardedSignal::Term => libc::SIGTERM,
            ForwardedSignal::Usr1 => libc::SIGUSR1,
            ForwardedSignal::Usr2 => libc::SIGUSR2,
            ForwardedSignal::Winch => libc::SIGWINCH,
            ForwardedSignal::Alrm => libc::SIGALRM,
            ForwardedSignal::Cont => libc::SIGCONT,
        }
    }

    pub(crate) fn kind(self) -> SignalKind {
        SignalKind::from_raw(self.as_raw())
    }
}

impl fmt::Display for ForwardedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG{}", self.name())
    }
}

/// The set of signals relayed to the child, in registration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedSignals(Vec<ForwardedSignal>);

impl ForwardedSignals {
    /// Termination and reload signals an orchestrator or operator may send
    pub const DEFAULT: [ForwardedSignal; 7] = [
        ForwardedSignal::Hup,
        ForwardedSignal::Int,
        ForwardedSignal::Quit,
        ForwardedSignal::Term,
        ForwardedSignal::Usr1,
        ForwardedSignal::Usr2,
        ForwardedSignal::Winch,
    ];

    /// Parse a list of names; an empty list is allowed and forwards nothing
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, LaunchError> {
        let mut signals = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let signal = ForwardedSignal::from_name(name)
                .ok_or_else(|| LaunchError::UnknownSignal(name.to_string()))?;
            if !signals.contains(&signal) {
                signals.push(signal);
            }
        }
        Ok(Self(signals))
    }

    pub fn iter(&self) -> impl Iterator<Item = ForwardedSignal> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, signal: ForwardedSignal) -> bool {
        self.0.contains(&signal)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same members as [`Self::DEFAULT`], in any order
    pub fn is_default(&self) -> bool {
        self.0.len() == Self::DEFAULT.len() && Self::DEFAULT.iter().all(|s| self.0.contains(s))
    }

    /// `wpt-init` flags selecting exactly this set
    pub fn to_init_args(&self) -> Vec<String> {
        if self.is_default() {
            return Vec::new();
        }
        if self.is_empty() {
            return vec!["--no-signals".to_string()];
        }
        self.iter()
            .flat_map(|signal| ["--signal".to_string(), signal.name().to_string()])
            .collect()
    }
}

impl Default for ForwardedSignals {
    fn default() -> Self {
        Self(Self::DEFAULT.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_with_or_without_prefix() {
        assert_eq!(ForwardedSignal::from_name("TERM"), Some(ForwardedSignal::Term));
        assert_eq!(ForwardedSignal::from_name("SIGTERM"), Some(ForwardedSignal::Term));
        assert_eq!(ForwardedSignal::from_name("sigusr1"), Some(ForwardedSignal::Usr1));
        assert_eq!(ForwardedSignal::from_name(" winch "), Some(ForwardedSignal::Winch));
    }

    #[test]
    fn uncatchable_and_internal_signals_are_rejected() {
        assert_eq!(ForwardedSignal::from_name("KILL"), None);
        assert_eq!(ForwardedSignal::from_name("SIGSTOP"), None);
        assert_eq!(ForwardedSignal::from_name("CHLD"), None);
        assert_eq!(ForwardedSignal::from_name(""), None);
    }

    #[test]
    fn default_set_matches_config_default() {
        let from_config =
            ForwardedSignals::parse(&crate::config::schema::default_forward_signals()).unwrap();
        assert_eq!(from_config, ForwardedSignals::default());
        assert!(from_config.contains(ForwardedSignal::Term));
        assert!(!from_config.contains(ForwardedSignal::Cont));
    }

    #[test]
    fn parse_deduplicates_and_keeps_order() {
        let signals = ForwardedSignals::parse(&["INT", "SIGTERM", "int"]).unwrap();
        let collected: Vec<_> = signals.iter().collect();
        assert_eq!(collected, vec![ForwardedSignal::Int, ForwardedSignal::Term]);
    }

    #[test]
    fn parse_reports_unknown_name() {
        let err = ForwardedSignals::parse(&["TERM", "BOGUS"]).unwrap_err();
        assert!(matches!(err, LaunchError::UnknownSignal(ref name) if name == "BOGUS"));
    }

    #[test]
    fn init_args_only_name_a_non_default_set() {
        let reordered = ForwardedSignals::parse(&[
            "WINCH", "USR2", "USR1", "TERM", "QUIT", "INT", "HUP",
        ])
        .unwrap();
        assert!(reordered.is_default());
        assert!(reordered.to_init_args().is_empty());

        let narrowed = ForwardedSignals::parse(&["TERM", "usr1"]).unwrap();
        assert_eq!(
            narrowed.to_init_args(),
            vec!["--signal", "TERM", "--signal", "USR1"]
        );

        let none = ForwardedSignals::parse::<&str>(&[]).unwrap();
        assert_eq!(none.to_init_args(), vec!["--no-signals"]);
    }

    #[test]
    fn display_uses_sig_prefix() {
        assert_eq!(ForwardedSignal::Quit.to_string(), "SIGQUIT");
        assert_eq!(ForwardedSignal::Term.as_raw(), libc::SIGTERM);
    }
}

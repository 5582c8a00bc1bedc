use std::fmt;

/// Coarse classification shared by every error in the crate.
///
/// Retry decisions and per-prompt reporting only look at the kind, never at
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server answered with a non-2xx status, or the request never completed.
    Transport,
    /// The server answered 2xx but the body broke the API contract
    /// (missing operation name, missing videos, missing base64 data, ...).
    Protocol,
    /// The operation did not finish before the polling deadline.
    Timeout,
    /// Reading prompts or writing videos on the local filesystem failed.
    Storage,
    /// No bearer token or project could be obtained.
    Credentials,
    /// The client itself could not be set up (bad location, model, or TLS backend).
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Storage => "storage",
            ErrorKind::Credentials => "credentials",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failure taxonomy for the harness.
///
/// Each kind carries its own recovery policy: configuration failures fall back
/// to defaults, output I/O failures abort collection for the session (never the
/// host), a missing actor skips the affected sample or tick, and an
/// unavailable capability probe falls back to the analytic estimate.
#[derive(Debug)]
pub enum HarnessError {
    /// Configuration file could not be read or parsed.
    Config {
        /// Path of the document that failed to load.
        path: PathBuf,
        /// Parser or filesystem detail, already formatted.
        detail: String,
    },

    /// Output directory or CSV file could not be created or written.
    Io {
        /// Operation that failed, e.g. "create output directory".
        context: &'static str,
        /// Path involved in the failed operation.
        path: PathBuf,
        source: io::Error,
    },

    /// The controllable actor is momentarily absent (loading screen, respawn).
    ActorUnavailable,

    /// A host introspection hook is not available on this host build.
    CapabilityProbe {
        /// Name of the missing capability, e.g. "loaded region count".
        what: &'static str,
    },
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { path, detail } => {
                write!(f, "failed to load configuration {}: {detail}", path.display())
            }
            Self::Io { context, path, source } => {
                write!(f, "failed to {context} {}: {source}", path.display())
            }
            Self::ActorUnavailable => write!(f, "actor handle is unavailable"),
            Self::CapabilityProbe { what } => {
                write!(f, "host capability '{what}' is unavailable")
            }
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

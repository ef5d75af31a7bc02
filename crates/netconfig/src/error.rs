//! Error types for a reconciliation pass.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::addr::MacAddr;
use crate::netlink;

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The step of a pass an error surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadConfig,
    LoadLeases,
    Links,
    Routes,
    Resolver,
    ReadCounters,
    BuildRuleset,
    ApplyRuleset,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadConfig => "load configuration",
            Self::LoadLeases => "load leases",
            Self::Links => "reconcile links",
            Self::Routes => "reconcile routes",
            Self::Resolver => "write resolver config",
            Self::ReadCounters => "read counters",
            Self::BuildRuleset => "build ruleset",
            Self::ApplyRuleset => "apply ruleset",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document is not valid JSON or lacks a required field.
    #[error("{}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A document parsed but carries an unusable value.
    #[error("{}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    /// No kernel link matches a configured interface.
    #[error("no link for interface {name} (hardware address {hardware_addr})")]
    LinkNotFound { name: String, hardware_addr: MacAddr },

    /// Source and destination port ranges of a forwarding differ in size.
    #[error("port range {port} cannot be mapped to {dest_port}")]
    RangeMismatch { port: String, dest_port: String },

    /// Netlink communication failed.
    #[error(transparent)]
    Transport(#[from] netlink::Error),

    /// The packet filter rejected or did not answer a request.
    #[error("nftables: {message}")]
    Ruleset { message: String },

    /// File I/O failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An error annotated with the stage it aborted.
    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn ruleset(message: impl Into<String>) -> Self {
        Self::Ruleset {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap this error with the stage it occurred in.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error aborted, if annotated.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error, looking through stage annotation.
    pub fn root(&self) -> &Error {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

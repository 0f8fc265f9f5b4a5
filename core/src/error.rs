use std::time::Duration;

use thiserror::Error;
use vte_prover::{ErrorKind, ProverError};

#[derive(Debug, Error)]
pub enum VteError {
    #[error(transparent)]
    Prover(#[from] ProverError),

    #[error("{operation} exceeded its {}s deadline", .deadline.as_secs())]
    Timeout {
        operation: &'static str,
        deadline: Duration,
    },

    #[error("round {round} has not been released yet")]
    NotYetReleased { round: u64 },

    #[error("network mismatch: {0}")]
    Network(String),

    #[error("ciphertext format '{got}' is not supported, expected '{expected}'")]
    FormatMismatch { expected: String, got: String },

    #[error("{field} does not match the published value")]
    BindingMismatch { field: &'static str },

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid input: {0}")]
    Witness(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{operation} task failed: {reason}")]
    Task {
        operation: &'static str,
        reason: String,
    },
}

impl VteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VteError::Prover(e) => e.kind(),
            VteError::Timeout { .. } => ErrorKind::Timeout,
            VteError::NotYetReleased { .. }
            | VteError::Network(_)
            | VteError::FormatMismatch { .. } => ErrorKind::Network,
            VteError::BindingMismatch { .. } => ErrorKind::BindingMismatch,
            VteError::Malformed { .. } | VteError::Missing(_) => ErrorKind::ProofFormat,
            VteError::Witness(_) => ErrorKind::Witness,
            VteError::Config(_) => ErrorKind::Config,
            VteError::Task { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn malformed(what: &'static str, reason: impl std::fmt::Display) -> Self {
        VteError::Malformed {
            what,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VteError>;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::CircuitKind;

/// Coarse classification shared by every caller-facing error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed circuit, fatal at build time
    Compilation,
    /// Key generation, deserialization or embedded-key failure
    Setup,
    /// Malformed input, rejected before proving
    Witness,
    /// Witness does not satisfy the circuit
    ConstraintViolation,
    /// Bad proof, key, hex or point bytes
    ProofFormat,
    /// A recomputed value differs from the published one
    BindingMismatch,
    /// Deadline exceeded, retryable
    Timeout,
    /// Verifier and package disagree on the circuit version
    CircuitIdMismatch,
    /// Chain, round or format mismatch, or not yet released
    Network,
    /// Invalid configuration
    Config,
    /// A blocking worker panicked or was cancelled
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Compilation => "compilation",
            ErrorKind::Setup => "setup",
            ErrorKind::Witness => "witness",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::ProofFormat => "proof_format",
            ErrorKind::BindingMismatch => "binding_mismatch",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CircuitIdMismatch => "circuit_id_mismatch",
            ErrorKind::Network => "network",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("circuit synthesis failed for {kind}: {reason}")]
    Compilation { kind: CircuitKind, reason: String },

    #[error("key setup failed for {kind}: {reason}")]
    Setup { kind: CircuitKind, reason: String },

    #[error("invalid witness: {0}")]
    Witness(String),

    #[error("{kind} constraints unsatisfied at '{constraint}'")]
    ConstraintViolation { kind: CircuitKind, constraint: String },

    #[error("malformed {what}: {reason}")]
    ProofFormat { what: &'static str, reason: String },

    #[error("{field} does not match the published value")]
    BindingMismatch { field: &'static str },

    #[error("circuit mismatch: expected {expected}, got {got}")]
    CircuitIdMismatch { expected: String, got: String },
}

impl ProverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProverError::Compilation { .. } => ErrorKind::Compilation,
            ProverError::Setup { .. } => ErrorKind::Setup,
            ProverError::Witness(_) => ErrorKind::Witness,
            ProverError::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            ProverError::ProofFormat { .. } => ErrorKind::ProofFormat,
            ProverError::BindingMismatch { .. } => ErrorKind::BindingMismatch,
            ProverError::CircuitIdMismatch { .. } => ErrorKind::CircuitIdMismatch,
        }
    }

    pub(crate) fn format(what: &'static str, reason: impl std::fmt::Display) -> Self {
        ProverError::ProofFormat {
            what,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProverError>;

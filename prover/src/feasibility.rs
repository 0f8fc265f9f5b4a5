//! Proving-time estimate for a circuit, and the strategy it implies.
//!
//! The decryption circuit carries a full BLS12-377 pairing and several
//! SHA-256 blocks. Whether it can be proven inside a deadline depends on the
//! machine, so the estimate is `constraints * ns_per_constraint` compared
//! against a budget. Both numbers come from configuration.

use std::time::Duration;

use ark_ff::PrimeField;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, SynthesisMode};
use serde::{Deserialize, Serialize};

use crate::error::{ProverError, Result};
use crate::keys::CircuitKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitShape {
    pub kind: CircuitKind,
    pub constraints: usize,
    pub witness_variables: usize,
    pub instance_variables: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvingStrategy {
    /// Prove inside the deadline
    InCircuit,
    /// Skip the proof; rely on the post-expiry commitment check
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityReport {
    pub shape: CircuitShape,
    pub estimated: Duration,
    pub budget: Duration,
    pub strategy: ProvingStrategy,
}

/// Synthesize in setup mode and count
pub fn measure<F, C>(kind: CircuitKind, circuit: C) -> Result<CircuitShape>
where
    F: PrimeField,
    C: ConstraintSynthesizer<F>,
{
    let cs = ConstraintSystem::<F>::new_ref();
    cs.set_mode(SynthesisMode::Setup);
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| ProverError::Compilation {
            kind,
            reason: e.to_string(),
        })?;
    cs.finalize();
    let shape = CircuitShape {
        kind,
        constraints: cs.num_constraints(),
        witness_variables: cs.num_witness_variables(),
        instance_variables: cs.num_instance_variables(),
    };
    tracing::debug!(
        circuit = %kind,
        constraints = shape.constraints,
        witnesses = shape.witness_variables,
        "measured circuit"
    );
    Ok(shape)
}

pub fn assess(shape: CircuitShape, ns_per_constraint: u64, budget: Duration) -> FeasibilityReport {
    let nanos = (shape.constraints as u128).saturating_mul(ns_per_constraint as u128);
    let estimated = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
    let strategy = if estimated <= budget {
        ProvingStrategy::InCircuit
    } else {
        ProvingStrategy::Deferred
    };
    FeasibilityReport {
        shape,
        estimated,
        budget,
        strategy,
    }
}

impl std::fmt::Display for FeasibilityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} constraints, {} witnesses, est. {:.1}s of {}s budget -> {:?}",
            self.shape.kind,
            self.shape.constraints,
            self.shape.witness_variables,
            self.estimated.as_secs_f64(),
            self.budget.as_secs(),
            self.strategy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::CommitmentCircuit;

    fn shape(constraints: usize) -> CircuitShape {
        CircuitShape {
            kind: CircuitKind::Decryption,
            constraints,
            witness_variables: 0,
            instance_variables: 18,
        }
    }

    #[test]
    fn measures_commitment_circuit() {
        let shape = measure(CircuitKind::Commitment, CommitmentCircuit::dummy()).unwrap();
        assert_eq!(shape.instance_variables, 4);
        assert!(shape.constraints > 0);
    }

    #[test]
    fn within_budget_proves_in_circuit() {
        let report = assess(shape(1_000), 1_000, Duration::from_secs(1));
        assert_eq!(report.strategy, ProvingStrategy::InCircuit);
        assert_eq!(report.estimated, Duration::from_millis(1));
    }

    #[test]
    fn over_budget_defers() {
        let report = assess(shape(40_000_000), 30_000, Duration::from_secs(600));
        assert_eq!(report.strategy, ProvingStrategy::Deferred);
    }

    #[test]
    fn estimate_saturates() {
        let report = assess(shape(usize::MAX), u64::MAX, Duration::from_secs(1));
        assert_eq!(report.estimated, Duration::from_nanos(u64::MAX));
        assert_eq!(report.strategy, ProvingStrategy::Deferred);
    }
}

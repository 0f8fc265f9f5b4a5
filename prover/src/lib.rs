//! Circuits, codecs and Groth16 key management for verifiable timelock
//! encryption.
//!
//! Three circuits bind one 32-byte secret `r2`:
//!
//! | Circuit | Curve | Statement |
//! |---|---|---|
//! | [`CommitmentCircuit`] | BN254 | `C = Poseidon(DST, r2, ctx)` |
//! | [`DiscreteLogCircuit`] | BN254 | the above and `R2 = r2 * G` on secp256k1 |
//! | [`DecryptionCircuit`] | BW6-761 | an IBE ciphertext over BLS12-377 decrypts to `r2` |

pub mod circuit;
pub mod codec;
pub mod commitment;
pub mod constants;
pub mod decryption;
pub mod discrete_log;
pub mod error;
pub mod feasibility;
pub mod ibe;
pub mod keys;

// Re-export key types for external usage
pub use circuit::poseidon::poseidon_config;
pub use commitment::{CommitmentCircuit, commitment_public_inputs, compute_commitment};
pub use decryption::{DecryptionCircuit, decryption_public_inputs};
pub use discrete_log::{DiscreteLogCircuit, discrete_log_public_inputs, point_from_secret};
pub use error::{ErrorKind, ProverError};
pub use feasibility::{FeasibilityReport, ProvingStrategy};
pub use ibe::{IbeCiphertext, IbeOpening};
pub use keys::{CircuitKind, CircuitSlot, KeyStore};

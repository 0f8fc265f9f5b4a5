//! Verifiable timelock packages.
//!
//! A sender seals a 32-byte secret `r2` to a future round of a timelock
//! network and publishes, next to the ciphertext, a Poseidon commitment to
//! `r2`, the secp256k1 point `R2 = r2 * G` and proofs tying them together and
//! to a context hash. Anyone can check the package now; anyone can open it
//! once the round is released.
//!
//! - [`PackageBuilder`] seals, binds and proves
//! - [`PackageVerifier`] checks a package step by step
//! - [`decrypt_package`] opens a released package and re-checks the bindings
//! - [`TimelockService`] is the seam to the network; [`LocalBeacon`] runs one in process

pub mod builder;
pub mod capsule;
pub mod context;
pub mod decrypt;
pub mod error;
pub mod package;
pub mod schnorr;
pub mod task;
pub mod timelock;
pub mod verifier;

pub use builder::{BuildRequest, BuilderOptions, DlogScheme, PackageBuilder};
pub use capsule::{Capsule, CapsuleCodec, IbeCapsuleCodec};
pub use context::{ciphertext_digest, compute_context_hash};
pub use decrypt::decrypt_package;
pub use error::{Result, VteError};
pub use package::{DecryptionStatus, VtePackage};
pub use timelock::{LocalBeacon, NetworkInfo, SealedPayload, TimelockService};
pub use verifier::{PackageVerifier, Rejection, Verified, VerifyStep};
pub use vte_prover::{ErrorKind, KeyStore};

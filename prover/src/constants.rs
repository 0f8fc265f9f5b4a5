/// Domain separation tag absorbed ahead of every commitment.
/// Exactly 16 ASCII bytes, so zero-padding to 32 leaves the low limb empty.
pub const COMMITMENT_DST: &[u8; 16] = b"VTE_TLOCK_v0.2.1";

/// Poseidon parameters over BN254 Fr
pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 56;
pub const POSEIDON_ALPHA: u64 = 5;
pub const POSEIDON_RATE: usize = 2;
pub const POSEIDON_CAPACITY: usize = 1;

/// Circuit identifiers. Bump the version whenever constraints change.
pub const COMMITMENT_CIRCUIT_ID: &str = "vte/commitment/bn254/v1";
pub const DISCRETE_LOG_CIRCUIT_ID: &str = "vte/discrete-log/secp256k1-bn254/v1";
pub const DECRYPTION_CIRCUIT_ID: &str = "vte/decryption/bls12-377-bw6-761/v1";

/// Hash-to-G2 domain for round identities
pub const ROUND_IDENTITY_DOMAIN: &[u8] = b"VTE-TLOCK-BLS12377-G2-ROUND";

pub const IBE_H2_TAG: &[u8] = b"IBE-H2";
pub const IBE_H3_TAG: &[u8] = b"IBE-H3";
pub const IBE_H4_TAG: &[u8] = b"IBE-H4";

/// Rejection-sampling attempts for the IBE scalar. The decryption circuit
/// unrolls every attempt, so this also fixes its shape.
pub const H3_MAX_ATTEMPTS: u8 = 8;

/// IBE messages and nonces are single 32-byte blocks
pub const IBE_BLOCK_LEN: usize = 32;

/// Compressed BLS12-377 G1 point
pub const G1_COMPRESSED_LEN: usize = 48;

/// Fixed-base window width for secp256k1 scalar multiplication
pub const SECP_WINDOW_BITS: usize = 4;

//! Reusable gadgets shared by the circuits.

pub mod bits;
pub mod poseidon;
pub mod secp;

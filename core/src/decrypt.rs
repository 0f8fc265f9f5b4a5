use std::sync::Arc;
use std::time::Duration;

use vte_prover::{codec, compute_commitment, point_from_secret};

use crate::error::{Result, VteError};
use crate::package::VtePackage;
use crate::task::run_blocking;
use crate::timelock::TimelockService;

/// Open a package after its round is released and check the recovered secret
/// against the published commitment and point.
///
/// The returned bytes are the secret itself; the caller owns them.
pub async fn decrypt_package(
    timelock: Arc<dyn TimelockService>,
    package: &VtePackage,
    deadline: Duration,
) -> Result<[u8; 32]> {
    let chain = package.tlock.chain_identity;
    let round = package.tlock.round;
    let ciphertext = package.tlock.ciphertext_bytes.clone();

    let payload = run_blocking("timelock decrypt", deadline, move || {
        timelock.decrypt(&chain, round, &ciphertext)
    })
    .await?;

    let secret: [u8; 32] = payload.as_slice().try_into().map_err(|_| {
        VteError::malformed("payload", format!("expected 32 bytes, got {}", payload.len()))
    })?;

    let commitment = compute_commitment(&secret, &package.context.ctx_hash);
    if codec::bn254_to_bytes(&commitment) != package.public.commitment {
        return Err(VteError::BindingMismatch { field: "commitment" });
    }

    let point = codec::secp_compress(&point_from_secret(&secret)?)?;
    if point.as_slice() != package.public.point_value.as_slice() {
        return Err(VteError::BindingMismatch {
            field: "point_value",
        });
    }

    tracing::info!(round, "decrypted package and matched published commitment");
    Ok(secret)
}

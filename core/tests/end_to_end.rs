//! Build, verify and open packages against an in-process beacon.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use once_cell::sync::Lazy;
use vte_config::{DecryptionProofMode, VteConfig};
use vte_core::{
    BuildRequest, BuilderOptions, DecryptionStatus, ErrorKind, KeyStore, LocalBeacon,
    PackageBuilder, PackageVerifier, TimelockService, VerifyStep, VtePackage, VteError,
    decrypt_package,
};
use vte_prover::CircuitKind;

const GENESIS: u64 = 1_000;
const PERIOD: u64 = 3;
const ROUND: u64 = 5;

static KEYS: Lazy<Arc<KeyStore>> = Lazy::new(|| {
    let keys = KeyStore::with_seed(7);
    keys.setup(CircuitKind::Commitment).unwrap();
    keys.embed_local(CircuitKind::Commitment).unwrap();
    Arc::new(keys)
});

struct Harness {
    clock: Arc<AtomicU64>,
    beacon: Arc<LocalBeacon>,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(AtomicU64::new(GENESIS));
        let now = clock.clone();
        let beacon = LocalBeacon::from_seed(b"end to end", GENESIS, PERIOD)
            .unwrap()
            .with_clock(move || now.load(Ordering::SeqCst));
        Self {
            clock,
            beacon: Arc::new(beacon),
        }
    }

    fn builder(&self) -> PackageBuilder {
        let options = BuilderOptions {
            decryption_proof: DecryptionProofMode::Off,
            ..BuilderOptions::default()
        };
        PackageBuilder::new(self.beacon.clone(), KEYS.clone(), options)
    }

    fn verifier(&self) -> PackageVerifier {
        PackageVerifier::new(KEYS.clone(), self.beacon.network())
    }

    async fn package(&self) -> VtePackage {
        self.builder()
            .build(
                BuildRequest::new(secret(), ROUND)
                    .with_session("session-1")
                    .with_aux(b"aux".to_vec()),
            )
            .await
            .unwrap()
    }

    fn release(&self) {
        self.clock.store(GENESIS + (ROUND - 1) * PERIOD, Ordering::SeqCst);
    }
}

fn secret() -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, b) in out.iter_mut().enumerate() {
        *b = 1 + i as u8;
    }
    out
}

fn rejected_at(verifier: &PackageVerifier, package: &VtePackage) -> (VerifyStep, ErrorKind) {
    let rejection = verifier.verify(package).unwrap_err();
    (rejection.step, rejection.kind())
}

// ============================================================================
// Verify
// ============================================================================

#[tokio::test]
async fn built_package_verifies() {
    let harness = Harness::new();
    let package = harness.package().await;

    assert!(package.proofs_attached());
    assert_eq!(package.tlock.round, ROUND);
    assert_eq!(package.context.aux_hex.as_deref(), Some("617578"));

    let verifier = harness
        .verifier()
        .expect_round(ROUND)
        .expect_session("session-1");
    let verified = verifier.verify(&package).unwrap();
    assert_eq!(verified.decryption_status(), DecryptionStatus::Absent);
    assert!(!verified.decryption_checked());
}

#[tokio::test]
async fn json_round_trip_still_verifies() {
    let harness = Harness::new();
    let package = harness.package().await;

    let parsed = VtePackage::from_json(&package.to_json().unwrap()).unwrap();
    assert_eq!(parsed, package);
    assert!(harness.verifier().verify(&parsed).is_ok());
}

#[tokio::test]
async fn tampered_context_hash_is_a_binding_mismatch() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    package.context.ctx_hash[0] ^= 1;

    let (step, kind) = rejected_at(&harness.verifier(), &package);
    assert_eq!(step, VerifyStep::ContextHash);
    assert_eq!(kind, ErrorKind::BindingMismatch);
}

#[tokio::test]
async fn reordered_context_fields_are_rejected() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    package.context.fields.swap(1, 4);

    let (step, kind) = rejected_at(&harness.verifier(), &package);
    assert_eq!(step, VerifyStep::ContextHash);
    assert_eq!(kind, ErrorKind::BindingMismatch);
}

#[tokio::test]
async fn foreign_chain_is_rejected() {
    let harness = Harness::new();
    let package = harness.package().await;

    let other = LocalBeacon::from_seed(b"other network", GENESIS, PERIOD).unwrap();
    let verifier = PackageVerifier::new(KEYS.clone(), other.network());
    let (step, kind) = rejected_at(&verifier, &package);
    assert_eq!(step, VerifyStep::Network);
    assert_eq!(kind, ErrorKind::Network);
}

#[tokio::test]
async fn expected_round_and_session_are_enforced() {
    let harness = Harness::new();
    let package = harness.package().await;

    let (step, _) = rejected_at(&harness.verifier().expect_round(ROUND + 1), &package);
    assert_eq!(step, VerifyStep::Round);

    let (step, kind) = rejected_at(&harness.verifier().expect_session("session-2"), &package);
    assert_eq!(step, VerifyStep::ContextHash);
    assert_eq!(kind, ErrorKind::BindingMismatch);
}

#[tokio::test]
async fn unknown_version_and_format_are_rejected() {
    let harness = Harness::new();
    let package = harness.package().await;

    let mut old = package.clone();
    old.version = "vte-tlock/0.2".into();
    assert_eq!(rejected_at(&harness.verifier(), &old).0, VerifyStep::Version);

    let mut foreign = package;
    foreign.tlock.ciphertext_format_id = "age_v1".into();
    let (step, kind) = rejected_at(&harness.verifier(), &foreign);
    assert_eq!(step, VerifyStep::Format);
    assert_eq!(kind, ErrorKind::Network);
}

#[tokio::test]
async fn tampered_ciphertext_fails_digest() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    // Inside the mask block, so the capsule still parses
    package.tlock.ciphertext_bytes[1 + 48] ^= 0x80;

    let (step, kind) = rejected_at(&harness.verifier(), &package);
    assert_eq!(step, VerifyStep::CiphertextDigest);
    assert_eq!(kind, ErrorKind::BindingMismatch);
}

#[tokio::test]
async fn missing_commitment_proof_is_never_defaulted() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    package.proofs.commitment = None;

    let rejection = harness.verifier().verify(&package).unwrap_err();
    assert_eq!(rejection.step, VerifyStep::CommitmentProof);
    assert!(matches!(rejection.error, VteError::Missing(_)));
}

#[tokio::test]
async fn swapped_commitment_is_a_binding_mismatch() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    package.public.commitment[31] ^= 1;

    let (step, kind) = rejected_at(&harness.verifier(), &package);
    assert_eq!(step, VerifyStep::CommitmentProof);
    assert_eq!(kind, ErrorKind::BindingMismatch);
}

#[tokio::test]
async fn forged_point_fails_discrete_log_binding() {
    let harness = Harness::new();
    let mut package = harness.package().await;

    let mut other = secret();
    other[0] = 0x42;
    let forged = harness
        .builder()
        .build(BuildRequest::new(other, ROUND))
        .await
        .unwrap();
    package.public.point_value = forged.public.point_value;

    let (step, kind) = rejected_at(&harness.verifier(), &package);
    assert_eq!(step, VerifyStep::DiscreteLogBinding);
    assert_eq!(kind, ErrorKind::BindingMismatch);
}

#[tokio::test]
async fn missing_discrete_log_binding_is_rejected() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    package.proofs.discrete_log = None;

    let (step, kind) = rejected_at(&harness.verifier(), &package);
    assert_eq!(step, VerifyStep::DiscreteLogBinding);
    assert_eq!(kind, ErrorKind::ProofFormat);
}

#[tokio::test]
async fn claimed_decryption_proof_must_verify() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    package.proofs.decryption = vte_core::package::DecryptionProof::proved(
        vte_prover::constants::DECRYPTION_CIRCUIT_ID,
        &[0u8; 32],
        &[1, 2, 3],
    );

    // No decryption key is embedded in this store
    let (step, _) = rejected_at(&harness.verifier(), &package);
    assert_eq!(step, VerifyStep::DecryptionProof);
}

#[test]
fn configured_chain_must_match_network() {
    let harness = Harness::new();
    let mut config = VteConfig::default();
    config.network.chain_identity = Some(hex::encode([9u8; 32]));

    let err = PackageVerifier::from_config(KEYS.clone(), harness.beacon.network(), &config)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);

    config.network.chain_identity = Some(hex::encode(harness.beacon.network().chain_identity));
    assert!(
        PackageVerifier::from_config(KEYS.clone(), harness.beacon.network(), &config).is_ok()
    );
}

// ============================================================================
// Decrypt
// ============================================================================

#[tokio::test]
async fn decrypts_only_after_release() {
    let harness = Harness::new();
    let package = harness.package().await;
    let timelock: Arc<dyn TimelockService> = harness.beacon.clone();

    let err = decrypt_package(timelock.clone(), &package, Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, VteError::NotYetReleased { round: ROUND }));

    harness.release();
    let opened = decrypt_package(timelock, &package, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(opened, secret());
}

#[tokio::test]
async fn decrypt_rechecks_published_commitment() {
    let harness = Harness::new();
    let mut package = harness.package().await;
    package.public.commitment[31] ^= 1;
    harness.release();

    let err = decrypt_package(harness.beacon.clone(), &package, Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, VteError::BindingMismatch { field: "commitment" }));
}

// ============================================================================
// Heavy paths
// ============================================================================

#[tokio::test]
#[ignore = "runs the secp256k1 discrete-log circuit setup"]
async fn groth16_discrete_log_binding_verifies() {
    let harness = Harness::new();
    let keys = Arc::new(KeyStore::with_seed(8));
    keys.setup(CircuitKind::Commitment).unwrap();
    keys.embed_local(CircuitKind::Commitment).unwrap();
    keys.setup(CircuitKind::DiscreteLog).unwrap();
    keys.embed_local(CircuitKind::DiscreteLog).unwrap();

    let options = BuilderOptions {
        decryption_proof: DecryptionProofMode::Off,
        discrete_log_scheme: vte_core::DlogScheme::Groth16DlogV1,
        ..BuilderOptions::default()
    };
    let package = PackageBuilder::new(harness.beacon.clone(), keys.clone(), options)
        .build(BuildRequest::new(secret(), ROUND))
        .await
        .unwrap();

    let verifier = PackageVerifier::new(keys, harness.beacon.network());
    assert!(verifier.verify(&package).is_ok());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "runs the BW6-761 decryption circuit setup and proof"]
async fn proved_decryption_is_checked() {
    let harness = Harness::new();
    let keys = Arc::new(KeyStore::with_seed(9));
    keys.setup(CircuitKind::Commitment).unwrap();
    keys.embed_local(CircuitKind::Commitment).unwrap();
    keys.setup(CircuitKind::Decryption).unwrap();
    keys.embed_local(CircuitKind::Decryption).unwrap();

    let options = BuilderOptions {
        decryption_proof: DecryptionProofMode::Required,
        decryption_timeout: Duration::from_secs(3_600),
        ..BuilderOptions::default()
    };
    let package = PackageBuilder::new(harness.beacon.clone(), keys.clone(), options)
        .build(BuildRequest::new(secret(), ROUND))
        .await
        .unwrap();
    assert_eq!(package.proofs.decryption.status, DecryptionStatus::Proved);

    let verifier = PackageVerifier::new(keys, harness.beacon.network());
    let verified = verifier.verify(&package).unwrap();
    assert!(verified.decryption_checked());
}

//! Timelock Service
//!
//! The network that releases round signatures is an external collaborator.
//! The core only talks to it through [`TimelockService`], a synchronous
//! `Send + Sync` trait; async callers run it on the blocking pool under a
//! deadline (see [`crate::task`]).
//!
//! [`LocalBeacon`] implements the trait in-process over the same IBE scheme
//! the decryption circuit proves. It holds the network secret, so it is for
//! tests and for embedders that operate their own beacon.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ark_bls12_377::{Fr, G1Affine, G1Projective};
use ark_ec::{CurveGroup, PrimeGroup};
use ark_ff::PrimeField;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vte_prover::{IbeOpening, codec, ibe};

use crate::capsule::{IBE_CAPSULE_FORMAT_ID, IbeCapsuleCodec};
use crate::error::{Result, VteError};

pub const LOCAL_BEACON_SCHEME: &str = "vte-ibe-bls12377-unchained";

// ============================================================================
// Network Info
// ============================================================================

/// Public parameters of a timelock network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(with = "hex::serde")]
    pub chain_identity: [u8; 32],
    /// Compressed BLS12-377 G1 network key
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    /// Unix time of round 1
    pub genesis_time: u64,
    pub period_secs: u64,
    pub scheme: String,
    pub ciphertext_format_id: String,
}

impl NetworkInfo {
    pub fn network_key(&self) -> Result<G1Affine> {
        Ok(codec::g1_from_bytes(&self.public_key)?)
    }

    /// Round whose release time is the last one at or before `unix_secs`
    pub fn time_to_round(&self, unix_secs: u64) -> u64 {
        if unix_secs <= self.genesis_time || self.period_secs == 0 {
            return 1;
        }
        (unix_secs - self.genesis_time) / self.period_secs + 1
    }

    /// Unix time at which `round` is released
    pub fn round_to_time(&self, round: u64) -> u64 {
        let elapsed = round.saturating_sub(1).saturating_mul(self.period_secs);
        self.genesis_time.saturating_add(elapsed)
    }

    /// First round released at or after `now + duration`
    pub fn duration_to_round(&self, now_unix: u64, duration: Duration) -> u64 {
        let target = now_unix.saturating_add(duration.as_secs());
        let round = self.time_to_round(target);
        if self.round_to_time(round) < target {
            round + 1
        } else {
            round
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ============================================================================
// Service Trait
// ============================================================================

/// Ciphertext plus, when the service exposes it, the encryptor's randomness
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub opening: Option<IbeOpening>,
}

pub trait TimelockService: Send + Sync {
    fn network(&self) -> NetworkInfo;

    fn encrypt(&self, chain: &[u8; 32], round: u64, payload: &[u8]) -> Result<SealedPayload>;

    /// Fails with `NotYetReleased` before the round's release time
    fn decrypt(&self, chain: &[u8; 32], round: u64, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

// ============================================================================
// Local Beacon
// ============================================================================

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub struct LocalBeacon {
    secret: Fr,
    info: NetworkInfo,
    clock: Clock,
}

impl LocalBeacon {
    pub fn new(secret: Fr, genesis_time: u64, period_secs: u64) -> Result<Self> {
        if period_secs == 0 {
            return Err(VteError::Config("beacon period must be positive".into()));
        }
        let public = (G1Projective::generator() * secret).into_affine();
        let public_key = codec::g1_to_bytes(&public)?;
        let chain_identity = Sha256::new()
            .chain_update(b"VTE_LOCAL_BEACON")
            .chain_update(&public_key)
            .chain_update(genesis_time.to_be_bytes())
            .chain_update(period_secs.to_be_bytes())
            .finalize()
            .into();
        Ok(Self {
            secret,
            info: NetworkInfo {
                chain_identity,
                public_key,
                genesis_time,
                period_secs,
                scheme: LOCAL_BEACON_SCHEME.to_string(),
                ciphertext_format_id: IBE_CAPSULE_FORMAT_ID.to_string(),
            },
            clock: Arc::new(unix_now),
        })
    }

    /// Beacon whose secret is derived from a seed; reproducible networks for tests
    pub fn from_seed(seed: &[u8], genesis_time: u64, period_secs: u64) -> Result<Self> {
        let secret = Fr::from_be_bytes_mod_order(&Sha256::digest(seed));
        Self::new(secret, genesis_time, period_secs)
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn is_released(&self, round: u64) -> bool {
        round >= 1 && (self.clock)() >= self.info.round_to_time(round)
    }

    pub fn latest_round(&self) -> u64 {
        self.info.time_to_round((self.clock)())
    }

    /// `s * H(round)`, only once the round is released
    pub fn round_signature(&self, round: u64) -> Result<ark_bls12_377::G2Affine> {
        if !self.is_released(round) {
            return Err(VteError::NotYetReleased { round });
        }
        Ok(ibe::sign_round(&self.secret, round)?)
    }

    fn check_chain(&self, chain: &[u8; 32]) -> Result<()> {
        if chain != &self.info.chain_identity {
            return Err(VteError::Network(format!(
                "unknown chain {}, beacon serves {}",
                hex::encode(chain),
                hex::encode(self.info.chain_identity)
            )));
        }
        Ok(())
    }
}

impl TimelockService for LocalBeacon {
    fn network(&self) -> NetworkInfo {
        self.info.clone()
    }

    fn encrypt(&self, chain: &[u8; 32], round: u64, payload: &[u8]) -> Result<SealedPayload> {
        self.check_chain(chain)?;
        if round == 0 {
            return Err(VteError::Network("round 0 is never released".into()));
        }
        let message: &[u8; 32] = payload.try_into().map_err(|_| {
            VteError::Witness(format!("payload must be 32 bytes, got {}", payload.len()))
        })?;
        let (ciphertext, opening) =
            ibe::encrypt(&self.info.network_key()?, round, message, &mut OsRng)?;
        tracing::debug!(round, "sealed payload with local beacon");
        Ok(SealedPayload {
            ciphertext: IbeCapsuleCodec::encode(&ciphertext)?,
            opening: Some(opening),
        })
    }

    fn decrypt(&self, chain: &[u8; 32], round: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.check_chain(chain)?;
        let signature = self.round_signature(round)?;
        let ciphertext = IbeCapsuleCodec::decode(ciphertext)?;
        Ok(ibe::decrypt(&ciphertext, &signature)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use vte_prover::ErrorKind;

    const GENESIS: u64 = 1_000;

    fn beacon_at(now: Arc<AtomicU64>) -> LocalBeacon {
        LocalBeacon::from_seed(b"test beacon", GENESIS, 3)
            .unwrap()
            .with_clock(move || now.load(Ordering::SeqCst))
    }

    #[test]
    fn round_time_arithmetic() {
        let info = beacon_at(Arc::new(AtomicU64::new(0))).network();
        assert_eq!(info.time_to_round(0), 1);
        assert_eq!(info.time_to_round(GENESIS), 1);
        assert_eq!(info.time_to_round(GENESIS + 2), 1);
        assert_eq!(info.time_to_round(GENESIS + 3), 2);
        assert_eq!(info.round_to_time(1), GENESIS);
        assert_eq!(info.round_to_time(5), GENESIS + 12);
        assert_eq!(info.duration_to_round(GENESIS, Duration::from_secs(4)), 3);
        assert_eq!(info.duration_to_round(GENESIS, Duration::from_secs(6)), 3);
    }

    #[test]
    fn releases_on_schedule() {
        let now = Arc::new(AtomicU64::new(GENESIS + 5));
        let beacon = beacon_at(now.clone());
        let chain = beacon.network().chain_identity;

        let sealed = beacon.encrypt(&chain, 4, &[7u8; 32]).unwrap();
        assert!(sealed.opening.is_some());

        let err = beacon.decrypt(&chain, 4, &sealed.ciphertext).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(matches!(err, VteError::NotYetReleased { round: 4 }));

        now.store(GENESIS + 9, Ordering::SeqCst);
        assert_eq!(beacon.latest_round(), 4);
        assert_eq!(beacon.decrypt(&chain, 4, &sealed.ciphertext).unwrap(), vec![7u8; 32]);
    }

    #[test]
    fn rejects_foreign_chain_and_bad_payload() {
        let beacon = beacon_at(Arc::new(AtomicU64::new(GENESIS)));
        let chain = beacon.network().chain_identity;

        let err = beacon.encrypt(&[0u8; 32], 2, &[1u8; 32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);

        let err = beacon.encrypt(&chain, 2, &[1u8; 31]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Witness);

        assert!(beacon.encrypt(&chain, 0, &[1u8; 32]).is_err());
    }

    #[test]
    fn seeded_beacons_share_identity() {
        let a = LocalBeacon::from_seed(b"x", GENESIS, 3).unwrap().network();
        let b = LocalBeacon::from_seed(b"x", GENESIS, 3).unwrap().network();
        let c = LocalBeacon::from_seed(b"y", GENESIS, 3).unwrap().network();
        assert_eq!(a, b);
        assert_ne!(a.chain_identity, c.chain_identity);
        assert!(a.network_key().is_ok());
    }
}

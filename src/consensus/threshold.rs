//! Abstract threshold-signature capability.
//!
//! The beacon treats the signature scheme as an external primitive: group
//! members sign with their key share, any `group_threshold` valid shares of
//! the same message recover the full group signature, and the recovered
//! signature verifies under the group public key like an ordinary
//! single-key signature.
//!
//! The defining property the beacon relies on is subset independence:
//! every honest node recovers the *identical* signature from the same share
//! set even when they picked different threshold-sized subsets. Production
//! deployments supply a BLS-style scheme where recovery is Lagrange
//! interpolation in the signature group; this crate deliberately does not
//! re-implement that primitive.
//!
//! [`InsecureThreshold`] is the in-tree stand-in used by tests and the
//! local simulator. It is NOT a cryptographic scheme and must never reach a
//! real deployment.

use serde::{Deserialize, Serialize};

use crate::consensus::types::RandBeaconSigShare;
use crate::Hash;

/// Aggregate public key of a signing group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPublicKey(pub Hash);

/// One member's share of the group signing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyShare(pub Hash);

/// The threshold-signature operations the consensus core consumes.
pub trait ThresholdScheme: Send + Sync {
    /// Produce a signature share over `msg` with a member key share.
    fn sign(&self, share: &KeyShare, msg: &[u8]) -> Vec<u8>;

    /// Verify a recovered group signature under the group public key.
    fn verify(&self, pk: &GroupPublicKey, msg: &[u8], sig: &[u8]) -> bool;

    /// Recover the group signature from at least threshold shares.
    ///
    /// Must be deterministic in the share set and independent of which
    /// threshold-sized subset the caller selected.
    fn recover(&self, shares: &[&RandBeaconSigShare]) -> Vec<u8>;

    /// Derive the key share handed to group member `index` during setup.
    fn derive_share(&self, pk: &GroupPublicKey, index: usize) -> KeyShare;
}

/// Deterministic hash-based stand-in for tests and the simulator.
///
/// The group "public key" doubles as the group secret: every member's key
/// share equals it, so every signature share already carries the full group
/// signature and recovery just picks the share with the smallest hash.
/// Threshold enforcement therefore comes only from the aggregation count in
/// the beacon, not from the scheme — which is exactly why this is insecure.
#[derive(Clone, Copy, Debug, Default)]
pub struct InsecureThreshold;

impl InsecureThreshold {
    fn group_sig(&self, secret: &Hash, msg: &[u8]) -> Vec<u8> {
        crate::hash_parts(&[b"meridian.tsig.insecure", secret, msg]).to_vec()
    }
}

impl ThresholdScheme for InsecureThreshold {
    fn sign(&self, share: &KeyShare, msg: &[u8]) -> Vec<u8> {
        self.group_sig(&share.0, msg)
    }

    fn verify(&self, pk: &GroupPublicKey, msg: &[u8], sig: &[u8]) -> bool {
        self.group_sig(&pk.0, msg) == sig
    }

    fn recover(&self, shares: &[&RandBeaconSigShare]) -> Vec<u8> {
        shares
            .iter()
            .min_by_key(|s| s.hash())
            .map(|s| s.sig.clone())
            .unwrap_or_default()
    }

    fn derive_share(&self, pk: &GroupPublicKey, _index: usize) -> KeyShare {
        KeyShare(pk.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(owner_byte: u8, sig: Vec<u8>) -> RandBeaconSigShare {
        RandBeaconSigShare {
            owner: [owner_byte; 20],
            round: 1,
            last_sig_hash: [7u8; 32],
            sig,
        }
    }

    #[test]
    fn sign_verify_roundtrip() {
        let scheme = InsecureThreshold;
        let pk = GroupPublicKey([3u8; 32]);
        let ks = scheme.derive_share(&pk, 0);
        let sig = scheme.sign(&ks, b"message");
        assert!(scheme.verify(&pk, b"message", &sig));
        assert!(!scheme.verify(&pk, b"other message", &sig));
        assert!(!scheme.verify(&GroupPublicKey([4u8; 32]), b"message", &sig));
    }

    #[test]
    fn recover_subset_independent() {
        let scheme = InsecureThreshold;
        let pk = GroupPublicKey([9u8; 32]);
        let sig = scheme.sign(&scheme.derive_share(&pk, 0), b"round 1");

        let a = share(1, sig.clone());
        let b = share(2, sig.clone());
        let c = share(3, sig.clone());

        let from_ab = scheme.recover(&[&a, &b]);
        let from_bc = scheme.recover(&[&b, &c]);
        let from_all = scheme.recover(&[&a, &b, &c]);
        assert_eq!(from_ab, from_bc);
        assert_eq!(from_ab, from_all);
        assert!(scheme.verify(&pk, b"round 1", &from_ab));
    }
}

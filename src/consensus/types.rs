//! Consensus artifact types and their canonical encodings.
//!
//! Every artifact that crosses the wire has a content hash used for gossip
//! deduplication and inventory announcements. Hashes are domain-separated
//! BLAKE3 over the length-prefixed field encoding, so two artifacts of
//! different kinds can never collide on identity.
//!
//! `RandBeaconSig::sign_bytes` is the one encoding nodes must agree on
//! bit-for-bit: it is the message the beacon committee threshold-signs,
//! with the `sig` field elided.

use serde::{Deserialize, Serialize};

use crate::{Addr, Hash};

/// One participant's partial contribution to the round's threshold
/// signature.
///
/// `last_sig_hash` binds the share to the previous round's signature,
/// preventing cross-round replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandBeaconSigShare {
    pub owner: Addr,
    pub round: u64,
    pub last_sig_hash: Hash,
    pub sig: Vec<u8>,
}

impl RandBeaconSigShare {
    pub fn hash(&self) -> Hash {
        crate::hash_parts(&[
            b"meridian.beacon.share",
            &self.owner,
            &self.round.to_le_bytes(),
            &self.last_sig_hash,
            &self.sig,
        ])
    }
}

/// The recovered group signature for one round — the round's random value
/// is the hash of `sig`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandBeaconSig {
    pub round: u64,
    pub last_rand_val: Hash,
    pub sig: Vec<u8>,
}

impl RandBeaconSig {
    /// Canonical signing input: the encoding with `sig` elided.
    /// Must be bit-identical across all nodes.
    pub fn sign_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(22 + 8 + 32);
        buf.extend_from_slice(b"meridian.beacon.sig.v1");
        buf.extend_from_slice(&self.round.to_le_bytes());
        buf.extend_from_slice(&self.last_rand_val);
        buf
    }

    /// The unforgeable random value this round produced; next-round shares
    /// must carry it as their `last_sig_hash`, and the committee streams
    /// re-derive from it.
    pub fn rand_val(&self) -> Hash {
        crate::hash_parts(&[b"meridian.beacon.randval", &self.sig])
    }

    pub fn hash(&self) -> Hash {
        crate::hash_parts(&[
            b"meridian.beacon.sig",
            &self.round.to_le_bytes(),
            &self.last_rand_val,
            &self.sig,
        ])
    }
}

/// A notarized block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub owner: Addr,
    pub round: u64,
    /// Parent block hash.
    pub prev_block: Hash,
    /// Hash of the block proposal this block finalizes.
    pub proposal: Hash,
    pub state_root: Hash,
    /// Group signature produced by the notarization committee.
    pub notarization: Vec<u8>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        crate::hash_parts(&[
            b"meridian.block",
            &self.owner,
            &self.round.to_le_bytes(),
            &self.prev_block,
            &self.proposal,
            &self.state_root,
            &self.notarization,
        ])
    }
}

/// A block proposal, ranked by the proposer's committee rank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockProposal {
    pub owner: Addr,
    pub round: u64,
    pub prev_block: Hash,
    /// Serialized transactions; opaque to the consensus core.
    pub payload: Vec<u8>,
    pub sig: Vec<u8>,
}

impl BlockProposal {
    pub fn hash(&self) -> Hash {
        crate::hash_parts(&[
            b"meridian.block_proposal",
            &self.owner,
            &self.round.to_le_bytes(),
            &self.prev_block,
            &self.payload,
            &self.sig,
        ])
    }
}

/// One notarization-committee member's share of a block notarization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtShare {
    pub owner: Addr,
    pub round: u64,
    /// Hash of the block proposal being notarized.
    pub bp: Hash,
    pub state_root: Hash,
    pub sig_share: Vec<u8>,
}

impl NtShare {
    pub fn hash(&self) -> Hash {
        crate::hash_parts(&[
            b"meridian.nt_share",
            &self.owner,
            &self.round.to_le_bytes(),
            &self.bp,
            &self.state_root,
            &self.sig_share,
        ])
    }
}

/// System transaction. Out of scope for the consensus core; carried only so
/// the peer interface is complete. The gossip layer rejects them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysTxn(pub Vec<u8>);

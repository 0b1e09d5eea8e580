//! Artifact validation interface.
//!
//! A stateless verifier the networking layer consults before handing any
//! inbound artifact to the core. Cryptographic signature checks, owner
//! membership checks, and per-owner share uniqueness all live behind this
//! trait — the beacon assumes every share it receives already passed them.

use crate::consensus::types::{Block, BlockProposal, NtShare, RandBeaconSig, RandBeaconSigShare};

pub trait ArtifactValidator: Send + Sync {
    /// Returns the id of the group whose key share signed `share`, or
    /// `None` if the share is invalid.
    fn validate_rand_beacon_sig_share(&self, share: &RandBeaconSigShare) -> Option<usize>;

    fn validate_rand_beacon_sig(&self, sig: &RandBeaconSig) -> bool;

    /// Returns the proposer weight, or `None` if the block is invalid.
    fn validate_block(&self, block: &Block) -> Option<f64>;

    fn validate_block_proposal(&self, bp: &BlockProposal) -> Option<f64>;

    /// Returns the id of the notarizing group, or `None` if invalid.
    fn validate_nt_share(&self, share: &NtShare) -> Option<usize>;
}

//! Per-round threshold-signature aggregation and committee rotation.
//!
//! The random beacon, block proposal, and block notarization advance to the
//! next round in lockstep. The beacon owns:
//! - the append-only signature history (`round() == history.len()`, round 1
//!   follows the genesis stand-in entry),
//! - the in-flight share set for the current round, wiped atomically on
//!   round advance,
//! - three independently-seeded streams and their committee histories, one
//!   entry per elapsed round plus the current selection.
//!
//! Aggregation and advancement are two separate operations on purpose:
//! recovering the signature (`recv_share` hitting the threshold) does not
//! move the round. Advancement is caller-driven via `recv_sig`, so that
//! distributed agreement on the signature is confirmed before local
//! committee rotation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ConsensusConfig;
use crate::consensus::group::Group;
use crate::consensus::rand::Rand;
use crate::consensus::threshold::ThresholdScheme;
use crate::consensus::types::{RandBeaconSig, RandBeaconSigShare};
use crate::{Addr, Hash};

/// Stand-in signature occupying `history[0]`; the round-1 committees and
/// the binding hash for round-1 shares derive from it.
pub const GENESIS_BEACON_SIG: &[u8] = b"meridian random beacon 0th signature";

/// Beacon errors. All are recoverable rejections of a single artifact.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BeaconError {
    #[error("unexpected share round: {got}, expected: {expected}")]
    ShareRoundMismatch { got: u64, expected: u64 },
    #[error("unexpected signature round: {got}, expected: {expected}")]
    SigRoundMismatch { got: u64, expected: u64 },
    #[error("share does not bind to the previous round's signature")]
    LastSigHashMismatch,
    #[error("addr not in the current block proposal committee")]
    NotInCommittee,
}

struct BeaconState {
    rb_rand: Rand,
    bp_rand: Rand,
    nt_rand: Rand,
    rb_cmte_history: Vec<usize>,
    bp_cmte_history: Vec<usize>,
    nt_cmte_history: Vec<usize>,
    cur_round_shares: HashMap<Hash, RandBeaconSigShare>,
    sig_history: Vec<RandBeaconSig>,
}

impl BeaconState {
    fn round(&self) -> u64 {
        self.sig_history.len() as u64
    }

    /// Advance all three streams with the round's random value and record
    /// each stream's next committee selection.
    fn rotate_committees(&mut self, rand_val: &Hash, group_count: usize) {
        self.rb_rand = self.rb_rand.derive(rand_val);
        self.rb_cmte_history.push(self.rb_rand.modulo(group_count));
        self.bp_rand = self.bp_rand.derive(rand_val);
        self.bp_cmte_history.push(self.bp_rand.modulo(group_count));
        self.nt_rand = self.nt_rand.derive(rand_val);
        self.nt_cmte_history.push(self.nt_rand.modulo(group_count));
    }
}

/// Per-round threshold-signature aggregator and committee-history keeper.
///
/// All state sits behind one mutex; every public operation is a
/// linearization point. Recovery, verification, and construction of the
/// returned signature happen inside the critical section — callers must
/// not re-enter the beacon from there.
pub struct RandomBeacon {
    cfg: ConsensusConfig,
    groups: Vec<Arc<Group>>,
    scheme: Arc<dyn ThresholdScheme>,
    inner: Mutex<BeaconState>,
}

impl RandomBeacon {
    /// Create a beacon from the shared seed and the genesis group registry.
    ///
    /// The three streams derive from the seed under distinct domain strings
    /// and immediately record their round-1 committee selections.
    pub fn new(
        seed: Rand,
        groups: Vec<Arc<Group>>,
        scheme: Arc<dyn ThresholdScheme>,
        cfg: ConsensusConfig,
    ) -> Self {
        assert!(!groups.is_empty(), "group registry must not be empty");
        let rb_rand = seed.derive(b"random beacon committee rand seed");
        let bp_rand = seed.derive(b"block proposer committee rand seed");
        let nt_rand = seed.derive(b"notarization committee rand seed");
        let state = BeaconState {
            rb_cmte_history: vec![rb_rand.modulo(groups.len())],
            bp_cmte_history: vec![bp_rand.modulo(groups.len())],
            nt_cmte_history: vec![nt_rand.modulo(groups.len())],
            rb_rand,
            bp_rand,
            nt_rand,
            cur_round_shares: HashMap::new(),
            sig_history: vec![RandBeaconSig {
                round: 0,
                last_rand_val: Hash::default(),
                sig: GENESIS_BEACON_SIG.to_vec(),
            }],
        };
        RandomBeacon {
            cfg,
            groups,
            scheme,
            inner: Mutex::new(state),
        }
    }

    /// The random beacon signature share of the current round, by hash.
    pub fn get_share(&self, h: &Hash) -> Option<RandBeaconSigShare> {
        self.inner.lock().cur_round_shares.get(h).cloned()
    }

    /// The round of the random beacon.
    ///
    /// Always greater than or equal to the chain's round:
    /// - greater while the node is synchronizing (beacon history syncs
    ///   before blocks),
    /// - equal once synchronized.
    pub fn round(&self) -> u64 {
        self.inner.lock().round()
    }

    /// Read-only snapshot of the signature history.
    pub fn history(&self) -> Vec<RandBeaconSig> {
        self.inner.lock().sig_history.clone()
    }

    /// The currently active (random beacon, block proposal, notarization)
    /// committees, as indices into the group registry.
    pub fn committees(&self) -> (usize, usize, usize) {
        let st = self.inner.lock();
        (
            *st.rb_cmte_history.last().expect("history never empty"),
            *st.bp_cmte_history.last().expect("history never empty"),
            *st.nt_cmte_history.last().expect("history never empty"),
        )
    }

    /// Deterministic rank of `addr` within the current block proposal
    /// committee. Distinct members always receive distinct ranks; see
    /// [`Rand::perm`] for why prefix queries agree.
    pub fn rank(&self, addr: &Addr) -> Result<usize, BeaconError> {
        let st = self.inner.lock();
        let bp = *st.bp_cmte_history.last().expect("history never empty");
        let group = &self.groups[bp];
        let idx = group
            .member_index(addr)
            .ok_or(BeaconError::NotInCommittee)?;
        let perm = st.bp_rand.perm(idx + 1, group.members.len());
        Ok(perm[idx])
    }

    /// Receive one share of the random beacon signature.
    ///
    /// The share must belong to the current round and bind to the previous
    /// round's signature. Once the in-flight set reaches the group
    /// threshold, the group signature is recovered deterministically,
    /// verified under `groups[group_id]`'s public key, and returned; the
    /// beacon stays in the current round until [`recv_sig`] accepts it.
    ///
    /// Shares arriving after the threshold re-trigger recovery and return
    /// the same signature again; recovery is deterministic, so the repeat
    /// is wasted work but not a divergence.
    ///
    /// # Panics
    ///
    /// Panics if the recovered signature fails group verification. That
    /// means a broken threshold scheme, a wrong group key, or a validator
    /// that let an invalid share through — protocol state is corrupt and
    /// the process must not continue.
    ///
    /// [`recv_sig`]: RandomBeacon::recv_sig
    pub fn recv_share(
        &self,
        share: RandBeaconSigShare,
        group_id: usize,
    ) -> Result<Option<RandBeaconSig>, BeaconError> {
        let mut st = self.inner.lock();
        let round = st.round();
        if share.round != round {
            return Err(BeaconError::ShareRoundMismatch {
                got: share.round,
                expected: round,
            });
        }

        let prev = &st.sig_history[(share.round - 1) as usize];
        if share.last_sig_hash != prev.rand_val() {
            return Err(BeaconError::LastSigHashMismatch);
        }

        let (round, last_sig_hash) = (share.round, share.last_sig_hash);
        st.cur_round_shares.insert(share.hash(), share);

        if st.cur_round_shares.len() >= self.cfg.group_threshold {
            let sig = self.recover(&st, round, last_sig_hash, group_id);
            return Ok(Some(sig));
        }
        Ok(None)
    }

    /// Recover and verify the group signature from the in-flight set.
    ///
    /// Subset selection is deterministic (threshold lowest share hashes);
    /// the scheme guarantees any threshold-sized subset recovers the
    /// identical signature.
    fn recover(
        &self,
        st: &BeaconState,
        round: u64,
        last_sig_hash: Hash,
        group_id: usize,
    ) -> RandBeaconSig {
        let mut hashes: Vec<&Hash> = st.cur_round_shares.keys().collect();
        hashes.sort();
        let subset: Vec<&RandBeaconSigShare> = hashes
            .iter()
            .take(self.cfg.group_threshold)
            .map(|h| &st.cur_round_shares[*h])
            .collect();

        let mut rbs = RandBeaconSig {
            round,
            last_rand_val: last_sig_hash,
            sig: Vec::new(),
        };
        let recovered = self.scheme.recover(&subset);
        if !self
            .scheme
            .verify(&self.groups[group_id].pk, &rbs.sign_bytes(), &recovered)
        {
            panic!("protocol invariant violated: recovered random beacon signature failed group verification");
        }
        rbs.sig = recovered;
        rbs
    }

    /// Accept the round's recovered signature and advance to the next round.
    ///
    /// Appends to the signature history, rotates all three committees from
    /// the signature's random value, and wipes the in-flight share set —
    /// atomically with respect to every other beacon operation.
    pub fn recv_sig(&self, sig: RandBeaconSig) -> Result<(), BeaconError> {
        let mut st = self.inner.lock();
        let round = st.round();
        if sig.round != round {
            return Err(BeaconError::SigRoundMismatch {
                got: sig.round,
                expected: round,
            });
        }

        st.rotate_committees(&sig.rand_val(), self.groups.len());
        st.cur_round_shares.clear();
        st.sig_history.push(sig);
        tracing::info!(round = st.round(), "random beacon advanced");
        Ok(())
    }
}

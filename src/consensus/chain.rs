//! Interface to the outer chain store.
//!
//! The consensus core does not own block storage. The networking layer
//! hands validated artifacts to whatever implements this trait and queries
//! it for gossip deduplication and round gating. Implementations keep their
//! own error types behind `anyhow`.
//!
//! The chain's notion of the current round may lag the beacon's while the
//! node synchronizes (the beacon history syncs first, then blocks); the
//! gossip layer gates round-scoped inventory on the chain round.

use anyhow::Result;

use crate::consensus::types::{Block, BlockProposal, NtShare};
use crate::Hash;

pub trait Chain: Send + Sync {
    /// The round the chain is currently handling.
    fn round(&self) -> u64;

    fn block(&self, hash: &Hash) -> Option<Block>;

    fn block_proposal(&self, hash: &Hash) -> Option<BlockProposal>;

    fn nt_share(&self, hash: &Hash) -> Option<NtShare>;

    /// Whether the chain still wants notarization shares for proposals
    /// extending `prev_block`.
    fn need_notarize(&self, prev_block: &Hash) -> bool;

    /// The finalized chain from genesis, in round order.
    fn finalized(&self) -> Vec<Block>;

    fn add_block(&self, block: Block, weight: f64) -> Result<()>;

    fn add_block_proposal(&self, bp: BlockProposal, weight: f64) -> Result<()>;

    /// Record a notarization share. Returns the completed block once enough
    /// shares from `group_id` have accumulated.
    fn add_nt_share(&self, share: NtShare, group_id: usize) -> Result<Option<Block>>;
}

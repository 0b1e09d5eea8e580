//! Receive/gossip state machine.
//!
//! Mediates every inbound artifact: validate, hand to the beacon or the
//! chain, then announce the item to peers — or log and drop. Inventory
//! announcements are answered with `get_data` fetches gated on the local
//! round, which is what keeps gossip round-scoped and self-limiting:
//! a node never fetches what it already holds and never fetches
//! round-scoped artifacts from rounds it is not handling.
//!
//! Locking: the peer table sits behind one mutex that is never held across
//! a network call. Outbound fan-out runs on spawned tasks that do not
//! reacquire the lock; per-artifact failures never propagate past the
//! receive path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::consensus::beacon::{BeaconError, RandomBeacon};
use crate::consensus::chain::Chain;
use crate::consensus::types::{Block, BlockProposal, NtShare, RandBeaconSig, RandBeaconSigShare, SysTxn};
use crate::consensus::validator::ArtifactValidator;
use crate::network::{ItemId, ItemKind, Network, Peer};
use crate::Hash;

/// Errors surfaced by [`Gossip::start`]. Everything else on the receive
/// path is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    #[error("transport error: {0}")]
    Transport(anyhow::Error),
    #[error("synced beacon signature rejected: {0}")]
    Beacon(#[from] BeaconError),
    #[error("invalid block received while syncing")]
    InvalidSyncBlock,
    #[error("chain rejected synced block: {0}")]
    Chain(anyhow::Error),
}

struct PeerTable {
    /// Connected peers by address.
    peers: HashMap<String, Arc<dyn Peer>>,
    /// Addresses learned from peers, connected or not.
    peer_addrs: HashSet<String>,
}

/// The component that enables the node to talk to its peers.
pub struct Gossip {
    net: Arc<dyn Network>,
    addr: String,
    validator: Arc<dyn ArtifactValidator>,
    chain: Arc<dyn Chain>,
    beacon: Arc<RandomBeacon>,
    broadcast_permits: Arc<Semaphore>,
    table: Mutex<PeerTable>,
}

impl Gossip {
    pub fn new(
        net: Arc<dyn Network>,
        validator: Arc<dyn ArtifactValidator>,
        addr: String,
        chain: Arc<dyn Chain>,
        beacon: Arc<RandomBeacon>,
    ) -> Self {
        Gossip {
            net,
            addr,
            validator,
            chain,
            beacon,
            broadcast_permits: Arc::new(Semaphore::new(crate::constants::BROADCAST_CONCURRENCY)),
            table: Mutex::new(PeerTable {
                peers: HashMap::new(),
                peer_addrs: HashSet::new(),
            }),
        }
    }

    /// Start the networking component: listen, bootstrap from the seed
    /// peer, and catch up on beacon history and finalized blocks.
    pub async fn start(self: Arc<Self>, seed_addr: &str) -> Result<(), GossipError> {
        let receiver: Arc<dyn Peer> = Arc::new(Receiver::new(self.addr.clone(), Arc::clone(&self)));
        self.net
            .start(&self.addr, receiver)
            .await
            .map_err(GossipError::Transport)?;

        let seed = self
            .net
            .connect(seed_addr)
            .await
            .map_err(GossipError::Transport)?;
        let addrs = seed.peers().await.map_err(GossipError::Transport)?;

        let known: Vec<String> = {
            let mut table = self.table.lock();
            table.peers.insert(seed_addr.to_string(), Arc::clone(&seed));
            table.peer_addrs.extend(addrs);
            table.peer_addrs.iter().cloned().collect()
        };

        for addr in known {
            if let Err(err) = self.find_or_connect(&addr).await {
                tracing::warn!(peer = %addr, %err, "failed to connect to peer");
            }
        }

        self.sync_from(&seed).await
    }

    /// Catch up from a peer: beacon signatures first, finalized blocks
    /// second. Any rejection aborts the bootstrap.
    async fn sync_from(&self, peer: &Arc<dyn Peer>) -> Result<(), GossipError> {
        let start = self.beacon.history().len() as u64;
        let (sigs, blocks) = peer.sync(start).await.map_err(GossipError::Transport)?;

        for sig in sigs {
            self.beacon.recv_sig(sig)?;
        }

        for block in blocks {
            let weight = self
                .validator
                .validate_block(&block)
                .ok_or(GossipError::InvalidSyncBlock)?;
            self.chain
                .add_block(block, weight)
                .map_err(GossipError::Chain)?;
        }
        tracing::info!(round = self.beacon.round(), "bootstrap sync complete");
        Ok(())
    }

    /// Broadcast an item id to all connected peers.
    ///
    /// Best-effort: one task per peer, bounded by the broadcast semaphore;
    /// delivery errors are dropped.
    pub fn broadcast_item(&self, item: ItemId) {
        let peers: Vec<Arc<dyn Peer>> = self.table.lock().peers.values().cloned().collect();
        for peer in peers {
            let sender = self.addr.clone();
            let permits = Arc::clone(&self.broadcast_permits);
            tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                if let Err(err) = peer.inventory(&sender, vec![item]).await {
                    tracing::debug!(peer = peer.addr(), %err, "inventory delivery failed");
                }
            });
        }
    }

    pub fn recv_txn(&self, _txn: Vec<u8>) {
        tracing::warn!("transaction gossip is not handled by the consensus core");
    }

    pub fn recv_sys_txn(&self, _txn: SysTxn) {
        tracing::warn!("system transaction gossip is not handled by the consensus core");
    }

    pub async fn recv_rand_beacon_sig(&self, sig: RandBeaconSig) {
        if !self.validator.validate_rand_beacon_sig(&sig) {
            tracing::warn!(round = sig.round, "random beacon signature failed validation");
            return;
        }

        let item = ItemId {
            kind: ItemKind::RandBeacon,
            round: sig.round,
            ref_hash: Hash::default(),
            hash: sig.hash(),
        };
        match self.beacon.recv_sig(sig) {
            Ok(()) => self.broadcast_item(item),
            Err(err) => tracing::warn!(%err, "random beacon signature rejected"),
        }
    }

    pub async fn recv_rand_beacon_sig_share(&self, share: RandBeaconSigShare) {
        let Some(group_id) = self.validator.validate_rand_beacon_sig_share(&share) else {
            tracing::warn!(
                owner = %hex::encode(share.owner),
                round = share.round,
                "random beacon share failed validation"
            );
            return;
        };

        let item = ItemId {
            kind: ItemKind::RandBeaconShare,
            round: share.round,
            ref_hash: Hash::default(),
            hash: share.hash(),
        };
        match self.beacon.recv_share(share, group_id) {
            Ok(Some(sig)) => {
                // The recovered signature goes through the same path as one
                // received from the network.
                self.recv_rand_beacon_sig(sig).await;
            }
            Ok(None) => self.broadcast_item(item),
            Err(err) => tracing::warn!(%err, "random beacon share rejected"),
        }
    }

    pub async fn recv_block(&self, block: Block) {
        let Some(weight) = self.validator.validate_block(&block) else {
            tracing::warn!(round = block.round, "block failed validation");
            return;
        };

        let item = ItemId {
            kind: ItemKind::Block,
            round: block.round,
            ref_hash: block.prev_block,
            hash: block.hash(),
        };
        match self.chain.add_block(block, weight) {
            Ok(()) => self.broadcast_item(item),
            Err(err) => tracing::warn!(%err, "chain rejected block"),
        }
    }

    pub async fn recv_block_proposal(&self, bp: BlockProposal) {
        let Some(weight) = self.validator.validate_block_proposal(&bp) else {
            tracing::warn!(round = bp.round, "block proposal failed validation");
            return;
        };

        let item = ItemId {
            kind: ItemKind::BlockProposal,
            round: bp.round,
            ref_hash: bp.prev_block,
            hash: bp.hash(),
        };
        match self.chain.add_block_proposal(bp, weight) {
            Ok(()) => self.broadcast_item(item),
            Err(err) => tracing::warn!(%err, "chain rejected block proposal"),
        }
    }

    pub async fn recv_nt_share(&self, share: NtShare) {
        let Some(group_id) = self.validator.validate_nt_share(&share) else {
            tracing::warn!(round = share.round, "notarization share failed validation");
            return;
        };

        let item = ItemId {
            kind: ItemKind::NtShare,
            round: share.round,
            ref_hash: share.bp,
            hash: share.hash(),
        };
        match self.chain.add_nt_share(share, group_id) {
            Ok(Some(block)) => {
                // Enough shares: the completed block goes through the same
                // path as one received from the network.
                self.recv_block(block).await;
            }
            Ok(None) => self.broadcast_item(item),
            Err(err) => tracing::warn!(%err, "chain rejected notarization share"),
        }
    }

    /// Handle an inventory announcement: fetch what we miss and still want.
    pub async fn recv_inventory(&self, sender: &str, items: Vec<ItemId>) {
        let peer = match self.find_or_connect(sender).await {
            Ok(peer) => peer,
            Err(err) => {
                tracing::warn!(peer = sender, %err, "cannot reach inventory sender");
                return;
            }
        };

        let round = self.chain.round();
        for id in items {
            match id.kind {
                ItemKind::Txn | ItemKind::SysTxn => {
                    tracing::warn!(kind = ?id.kind, "rejecting inventory for unsupported item kind");
                }
                // Blocks are fetched regardless of round; everything else
                // is scoped to the round the chain is handling.
                ItemKind::Block => {
                    if self.chain.block(&id.hash).is_none() {
                        self.request(&peer, id).await;
                    }
                }
                ItemKind::BlockProposal => {
                    if id.round != round {
                        tracing::debug!(item_round = id.round, round, "skipping block proposal from another round");
                        continue;
                    }
                    if self.chain.block_proposal(&id.hash).is_some() {
                        continue;
                    }
                    self.request(&peer, id).await;
                }
                ItemKind::NtShare => {
                    if id.round != round {
                        tracing::debug!(item_round = id.round, round, "skipping notarization share from another round");
                        continue;
                    }
                    if self.chain.nt_share(&id.hash).is_some() {
                        continue;
                    }
                    if !self.chain.need_notarize(&id.ref_hash) {
                        continue;
                    }
                    self.request(&peer, id).await;
                }
                ItemKind::RandBeaconShare => {
                    if id.round != round {
                        tracing::debug!(item_round = id.round, round, "skipping beacon share from another round");
                        continue;
                    }
                    if self.beacon.get_share(&id.hash).is_some() {
                        continue;
                    }
                    self.request(&peer, id).await;
                }
                ItemKind::RandBeacon => {
                    if id.round != round {
                        tracing::debug!(item_round = id.round, round, "skipping beacon signature from another round");
                        continue;
                    }
                    self.request(&peer, id).await;
                }
            }
        }
    }

    async fn request(&self, peer: &Arc<dyn Peer>, id: ItemId) {
        if let Err(err) = peer.get_data(&self.addr, vec![id]).await {
            tracing::debug!(peer = peer.addr(), %err, "get-data request failed");
        }
    }

    /// Serve a get-data request: send each item we hold, skip the rest.
    pub async fn serve_data(&self, requester: &str, items: Vec<ItemId>) {
        let peer = match self.find_or_connect(requester).await {
            Ok(peer) => peer,
            Err(err) => {
                tracing::warn!(peer = requester, %err, "cannot reach get-data requester");
                return;
            }
        };

        for id in items {
            let sent = match id.kind {
                ItemKind::Txn | ItemKind::SysTxn => {
                    tracing::warn!(kind = ?id.kind, "rejecting get-data for unsupported item kind");
                    Ok(())
                }
                ItemKind::Block => match self.chain.block(&id.hash) {
                    Some(block) => peer.block(block).await,
                    None => Ok(()),
                },
                ItemKind::BlockProposal => match self.chain.block_proposal(&id.hash) {
                    Some(bp) => peer.block_proposal(bp).await,
                    None => Ok(()),
                },
                ItemKind::NtShare => match self.chain.nt_share(&id.hash) {
                    Some(share) => peer.notarization_share(share).await,
                    None => Ok(()),
                },
                ItemKind::RandBeaconShare => match self.beacon.get_share(&id.hash) {
                    Some(share) => peer.rand_beacon_sig_share(share).await,
                    None => Ok(()),
                },
                ItemKind::RandBeacon => {
                    let history = self.beacon.history();
                    if (id.round as usize) < history.len() {
                        peer.rand_beacon_sig(history[id.round as usize].clone()).await
                    } else {
                        tracing::warn!(
                            peer = requester,
                            round = id.round,
                            have = history.len(),
                            "beacon signature requested beyond known history"
                        );
                        Ok(())
                    }
                }
            };
            if let Err(err) = sent {
                tracing::debug!(peer = requester, %err, "get-data delivery failed");
            }
        }
    }

    /// Random beacon signatures and finalized blocks beyond `start`.
    /// Either list may be empty if `start` is at or past the known tail.
    pub fn get_sync_data(&self, start: u64) -> (Vec<RandBeaconSig>, Vec<Block>) {
        let start = start as usize;
        let history = self.beacon.history();
        if history.len() <= start {
            return (Vec::new(), Vec::new());
        }

        let blocks = self.chain.finalized();
        let blocks = if blocks.len() <= start {
            Vec::new()
        } else {
            blocks[start..].to_vec()
        };

        (history[start..].to_vec(), blocks)
    }

    /// Addresses of all known peers, connected or not.
    pub fn peer_list(&self) -> Vec<String> {
        self.table.lock().peer_addrs.iter().cloned().collect()
    }

    /// Merge advertised addresses into the known-address set.
    pub fn update_peers(&self, addrs: Vec<String>) {
        let mut table = self.table.lock();
        for addr in addrs {
            if addr != self.addr {
                table.peer_addrs.insert(addr);
            }
        }
    }

    /// Look up a connected peer or dial it. The table lock is released
    /// around the dial; a concurrent connect keeps the first entry.
    async fn find_or_connect(&self, addr: &str) -> Result<Arc<dyn Peer>> {
        if let Some(peer) = self.table.lock().peers.get(addr) {
            return Ok(Arc::clone(peer));
        }

        let peer = self.net.connect(addr).await?;
        let mut table = self.table.lock();
        let entry = table
            .peers
            .entry(addr.to_string())
            .or_insert_with(|| Arc::clone(&peer));
        Ok(Arc::clone(entry))
    }
}

/// Forwards inbound peer calls to the gossip component.
///
/// This is what the transport serves for the local node: a [`Peer`] whose
/// methods close over the component behind an `Arc` — no cyclic ownership.
pub struct Receiver {
    addr: String,
    gossip: Arc<Gossip>,
}

impl Receiver {
    pub fn new(addr: String, gossip: Arc<Gossip>) -> Self {
        Receiver { addr, gossip }
    }
}

#[async_trait]
impl Peer for Receiver {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn txn(&self, txn: Vec<u8>) -> Result<()> {
        self.gossip.recv_txn(txn);
        Ok(())
    }

    async fn sys_txn(&self, txn: SysTxn) -> Result<()> {
        self.gossip.recv_sys_txn(txn);
        Ok(())
    }

    async fn rand_beacon_sig_share(&self, share: RandBeaconSigShare) -> Result<()> {
        self.gossip.recv_rand_beacon_sig_share(share).await;
        Ok(())
    }

    async fn rand_beacon_sig(&self, sig: RandBeaconSig) -> Result<()> {
        self.gossip.recv_rand_beacon_sig(sig).await;
        Ok(())
    }

    async fn block(&self, block: Block) -> Result<()> {
        self.gossip.recv_block(block).await;
        Ok(())
    }

    async fn block_proposal(&self, bp: BlockProposal) -> Result<()> {
        self.gossip.recv_block_proposal(bp).await;
        Ok(())
    }

    async fn notarization_share(&self, share: NtShare) -> Result<()> {
        self.gossip.recv_nt_share(share).await;
        Ok(())
    }

    async fn inventory(&self, sender: &str, items: Vec<ItemId>) -> Result<()> {
        self.gossip.recv_inventory(sender, items).await;
        Ok(())
    }

    async fn get_data(&self, requester: &str, items: Vec<ItemId>) -> Result<()> {
        self.gossip.serve_data(requester, items).await;
        Ok(())
    }

    async fn peers(&self) -> Result<Vec<String>> {
        Ok(self.gossip.peer_list())
    }

    async fn update_peers(&self, addrs: Vec<String>) -> Result<()> {
        self.gossip.update_peers(addrs);
        Ok(())
    }

    async fn ping(&self, cancel: CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            anyhow::bail!("ping cancelled");
        }
        Ok(())
    }

    async fn sync(&self, start: u64) -> Result<(Vec<RandBeaconSig>, Vec<Block>)> {
        Ok(self.gossip.get_sync_data(start))
    }
}

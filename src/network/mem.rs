//! In-process loopback transport.
//!
//! Peers register in a shared table keyed by address; `connect` hands back
//! a proxy that round-trips every one-way delivery through the wire codec
//! before dispatching into the remote receiver, so tests and the simulator
//! exercise the same encoding path a stream transport would. Codec-less
//! request/response calls (`peers`, `ping`, `sync`) go straight through.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::consensus::types::{Block, BlockProposal, NtShare, RandBeaconSig, RandBeaconSigShare, SysTxn};
use crate::network::{decode_message, dispatch, encode_message, ItemId, Message, Network, Peer};

/// A process-local network hub. Clone-cheap: all clones share one table.
#[derive(Clone, Default)]
pub struct MemNetwork {
    hub: Arc<Mutex<HashMap<String, Arc<dyn Peer>>>>,
}

impl MemNetwork {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Network for MemNetwork {
    async fn start(&self, addr: &str, myself: Arc<dyn Peer>) -> Result<()> {
        let mut hub = self.hub.lock();
        if hub.contains_key(addr) {
            return Err(anyhow!("address {addr} already in use"));
        }
        hub.insert(addr.to_string(), myself);
        Ok(())
    }

    async fn connect(&self, addr: &str) -> Result<Arc<dyn Peer>> {
        let remote = self
            .hub
            .lock()
            .get(addr)
            .cloned()
            .with_context(|| format!("no peer listening on {addr}"))?;
        Ok(Arc::new(MemPeer {
            addr: addr.to_string(),
            remote,
        }))
    }
}

/// Proxy for a peer registered in the hub.
struct MemPeer {
    addr: String,
    remote: Arc<dyn Peer>,
}

impl MemPeer {
    /// Deliver a one-way message through encode → decode → dispatch,
    /// catching codec regressions that direct calls would hide.
    async fn deliver(&self, msg: Message) -> Result<()> {
        let bytes = encode_message(&msg)?;
        let decoded = decode_message(&bytes).context("loopback decode failed")?;
        dispatch(self.remote.as_ref(), decoded).await
    }
}

#[async_trait]
impl Peer for MemPeer {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn txn(&self, txn: Vec<u8>) -> Result<()> {
        self.deliver(Message::Txn(txn)).await
    }

    async fn sys_txn(&self, txn: SysTxn) -> Result<()> {
        self.deliver(Message::SysTxn(txn)).await
    }

    async fn rand_beacon_sig_share(&self, share: RandBeaconSigShare) -> Result<()> {
        self.deliver(Message::RandBeaconSigShare(share)).await
    }

    async fn rand_beacon_sig(&self, sig: RandBeaconSig) -> Result<()> {
        self.deliver(Message::RandBeaconSig(sig)).await
    }

    async fn block(&self, block: Block) -> Result<()> {
        self.deliver(Message::Block(Box::new(block))).await
    }

    async fn block_proposal(&self, bp: BlockProposal) -> Result<()> {
        self.deliver(Message::BlockProposal(Box::new(bp))).await
    }

    async fn notarization_share(&self, share: NtShare) -> Result<()> {
        self.deliver(Message::NtShare(share)).await
    }

    async fn inventory(&self, sender: &str, items: Vec<ItemId>) -> Result<()> {
        self.deliver(Message::Inventory {
            sender: sender.to_string(),
            items,
        })
        .await
    }

    async fn get_data(&self, requester: &str, items: Vec<ItemId>) -> Result<()> {
        self.deliver(Message::GetData {
            requester: requester.to_string(),
            items,
        })
        .await
    }

    async fn peers(&self) -> Result<Vec<String>> {
        self.remote.peers().await
    }

    async fn update_peers(&self, addrs: Vec<String>) -> Result<()> {
        self.deliver(Message::UpdatePeers(addrs)).await
    }

    async fn ping(&self, cancel: CancellationToken) -> Result<()> {
        self.remote.ping(cancel).await
    }

    async fn sync(&self, start: u64) -> Result<(Vec<RandBeaconSig>, Vec<Block>)> {
        self.remote.sync(start).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Peer that records one-way deliveries.
    #[derive(Default)]
    struct RecordingPeer {
        txns: Mutex<Vec<Vec<u8>>>,
        inventories: Mutex<Vec<(String, Vec<ItemId>)>>,
    }

    #[async_trait]
    impl Peer for RecordingPeer {
        fn addr(&self) -> &str {
            "recording"
        }
        async fn txn(&self, txn: Vec<u8>) -> Result<()> {
            self.txns.lock().push(txn);
            Ok(())
        }
        async fn sys_txn(&self, _txn: SysTxn) -> Result<()> {
            Ok(())
        }
        async fn rand_beacon_sig_share(&self, _share: RandBeaconSigShare) -> Result<()> {
            Ok(())
        }
        async fn rand_beacon_sig(&self, _sig: RandBeaconSig) -> Result<()> {
            Ok(())
        }
        async fn block(&self, _block: Block) -> Result<()> {
            Ok(())
        }
        async fn block_proposal(&self, _bp: BlockProposal) -> Result<()> {
            Ok(())
        }
        async fn notarization_share(&self, _share: NtShare) -> Result<()> {
            Ok(())
        }
        async fn inventory(&self, sender: &str, items: Vec<ItemId>) -> Result<()> {
            self.inventories.lock().push((sender.to_string(), items));
            Ok(())
        }
        async fn get_data(&self, _requester: &str, _items: Vec<ItemId>) -> Result<()> {
            Ok(())
        }
        async fn peers(&self) -> Result<Vec<String>> {
            Ok(vec!["a:1".into()])
        }
        async fn update_peers(&self, _addrs: Vec<String>) -> Result<()> {
            Ok(())
        }
        async fn ping(&self, _cancel: CancellationToken) -> Result<()> {
            Ok(())
        }
        async fn sync(&self, _start: u64) -> Result<(Vec<RandBeaconSig>, Vec<Block>)> {
            Ok((vec![], vec![]))
        }
    }

    #[tokio::test]
    async fn delivery_round_trips_through_codec() {
        let net = MemNetwork::new();
        let remote = Arc::new(RecordingPeer::default());
        net.start("node-a", remote.clone()).await.unwrap();

        let proxy = net.connect("node-a").await.unwrap();
        proxy.txn(vec![1, 2, 3]).await.unwrap();
        proxy
            .inventory(
                "node-b",
                vec![ItemId {
                    kind: crate::network::ItemKind::Block,
                    round: 1,
                    ref_hash: [0u8; 32],
                    hash: [9u8; 32],
                }],
            )
            .await
            .unwrap();

        assert_eq!(remote.txns.lock().as_slice(), &[vec![1, 2, 3]]);
        let inventories = remote.inventories.lock();
        assert_eq!(inventories.len(), 1);
        assert_eq!(inventories[0].0, "node-b");
    }

    #[tokio::test]
    async fn connect_unknown_addr_fails() {
        let net = MemNetwork::new();
        assert!(net.connect("nowhere").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_listen_rejected() {
        let net = MemNetwork::new();
        let peer = Arc::new(RecordingPeer::default());
        net.start("dup", peer.clone()).await.unwrap();
        assert!(net.start("dup", peer).await.is_err());
    }
}

//! Peer interface and wire protocol for gossip between nodes.
//!
//! The transport itself is pluggable: anything implementing [`Network`] can
//! carry the protocol (the crate ships an in-process loopback transport in
//! [`mem`]; a production deployment supplies TCP). The consensus side of
//! the connection is always a [`Peer`] — either a proxy for a remote node
//! or a [`gossip::Receiver`] serving inbound calls.
//!
//! One-way deliveries share a single wire representation, [`Message`],
//! encoded with size-limited bincode behind a length prefix. Decoding never
//! allocates more than [`crate::constants::MAX_NETWORK_MESSAGE_BYTES`], so
//! a crafted length prefix cannot be used for allocation DoS.

pub mod gossip;
pub mod mem;

use anyhow::Result;
use async_trait::async_trait;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::consensus::types::{Block, BlockProposal, NtShare, RandBeaconSig, RandBeaconSigShare, SysTxn};
use crate::Hash;

/// The different kinds of gossiped items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Txn,
    SysTxn,
    Block,
    BlockProposal,
    NtShare,
    RandBeaconShare,
    RandBeacon,
}

/// Identification of an item a node owns, announced via inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId {
    pub kind: ItemKind,
    /// Round the item belongs to. Round-scoped kinds are only fetched when
    /// this matches the local chain round.
    pub round: u64,
    /// Parent-block hash where applicable, zero otherwise.
    pub ref_hash: Hash,
    /// Content hash of the item itself.
    pub hash: Hash,
}

/// A peer node in the Meridian network.
///
/// Methods mirror the wire protocol one-to-one. Artifact deliveries are
/// one-way (the receiver validates and gossips onward); `peers`, `ping`,
/// and `sync` are request/response.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Address this peer is reachable at.
    fn addr(&self) -> &str;

    async fn txn(&self, txn: Vec<u8>) -> Result<()>;

    async fn sys_txn(&self, txn: SysTxn) -> Result<()>;

    async fn rand_beacon_sig_share(&self, share: RandBeaconSigShare) -> Result<()>;

    async fn rand_beacon_sig(&self, sig: RandBeaconSig) -> Result<()>;

    async fn block(&self, block: Block) -> Result<()>;

    async fn block_proposal(&self, bp: BlockProposal) -> Result<()>;

    async fn notarization_share(&self, share: NtShare) -> Result<()>;

    /// Announce items `sender` owns.
    async fn inventory(&self, sender: &str, items: Vec<ItemId>) -> Result<()>;

    /// Ask this peer to send the listed items to `requester`.
    async fn get_data(&self, requester: &str, items: Vec<ItemId>) -> Result<()>;

    /// Addresses of peers this peer knows.
    async fn peers(&self) -> Result<Vec<String>>;

    async fn update_peers(&self, addrs: Vec<String>) -> Result<()>;

    /// Liveness probe. The transport must honor the cancellation token.
    async fn ping(&self, cancel: CancellationToken) -> Result<()>;

    /// Random beacon signatures and finalized blocks strictly beyond
    /// `start`, for bootstrap.
    async fn sync(&self, start: u64) -> Result<(Vec<RandBeaconSig>, Vec<Block>)>;
}

/// Transport used to reach peers.
#[async_trait]
pub trait Network: Send + Sync {
    /// Start listening on `addr`, serving inbound calls through `myself`.
    async fn start(&self, addr: &str, myself: Arc<dyn Peer>) -> Result<()>;

    /// Connect to the peer listening on `addr`.
    async fn connect(&self, addr: &str) -> Result<Arc<dyn Peer>>;
}

/// Wire representation of peer deliveries.
///
/// `SyncRequest`/`SyncResponse` exist for stream transports that frame
/// request/response over the same codec; they are never dispatched through
/// [`dispatch`] because a response needs a return path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message {
    Txn(Vec<u8>),
    SysTxn(SysTxn),
    RandBeaconSigShare(RandBeaconSigShare),
    RandBeaconSig(RandBeaconSig),
    Block(Box<Block>),
    BlockProposal(Box<BlockProposal>),
    NtShare(NtShare),
    Inventory { sender: String, items: Vec<ItemId> },
    GetData { requester: String, items: Vec<ItemId> },
    UpdatePeers(Vec<String>),
    SyncRequest { start: u64 },
    SyncResponse { sigs: Vec<RandBeaconSig>, blocks: Vec<Block> },
}

/// Codec errors.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CodecError {
    #[error("message serialization failed: {0}")]
    SerializationFailed(String),
    #[error(
        "message exceeds maximum size ({} bytes)",
        crate::constants::MAX_NETWORK_MESSAGE_BYTES
    )]
    MessageTooLarge,
}

/// Bytes reserved at the front of every frame for the little-endian u32
/// payload length.
const FRAME_HEADER: usize = 4;

/// Bincode settings shared by both codec directions. The byte limit caps
/// what the deserializer will allocate, so a hostile length field buried in
/// a payload cannot be used for allocation DoS.
fn wire_options() -> impl bincode::Options {
    bincode::DefaultOptions::new().with_limit(crate::constants::MAX_NETWORK_MESSAGE_BYTES as u64)
}

/// Serialize a message into a length-prefixed frame.
///
/// The payload is written directly after a reserved header, then the header
/// is backfilled with the resulting length. Oversized messages fail before
/// they ever reach a socket.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, CodecError> {
    let mut frame = vec![0u8; FRAME_HEADER];
    wire_options()
        .serialize_into(&mut frame, msg)
        .map_err(|e| CodecError::SerializationFailed(e.to_string()))?;
    let payload_len = frame.len() - FRAME_HEADER;
    if payload_len > crate::constants::MAX_NETWORK_MESSAGE_BYTES {
        return Err(CodecError::MessageTooLarge);
    }
    frame[..FRAME_HEADER].copy_from_slice(&(payload_len as u32).to_le_bytes());
    Ok(frame)
}

/// Deserialize one frame. `None` on any malformed input: short header,
/// declared length over the size limit, or a truncated payload.
pub fn decode_message(data: &[u8]) -> Option<Message> {
    let (header, rest) = data.split_first_chunk::<FRAME_HEADER>()?;
    let declared = u32::from_le_bytes(*header) as usize;
    if declared > crate::constants::MAX_NETWORK_MESSAGE_BYTES || rest.len() < declared {
        return None;
    }
    wire_options().deserialize(&rest[..declared]).ok()
}

/// Feed a decoded one-way message into a peer handler.
pub async fn dispatch(peer: &dyn Peer, msg: Message) -> Result<()> {
    match msg {
        Message::Txn(txn) => peer.txn(txn).await,
        Message::SysTxn(txn) => peer.sys_txn(txn).await,
        Message::RandBeaconSigShare(share) => peer.rand_beacon_sig_share(share).await,
        Message::RandBeaconSig(sig) => peer.rand_beacon_sig(sig).await,
        Message::Block(block) => peer.block(*block).await,
        Message::BlockProposal(bp) => peer.block_proposal(*bp).await,
        Message::NtShare(share) => peer.notarization_share(share).await,
        Message::Inventory { sender, items } => peer.inventory(&sender, items).await,
        Message::GetData { requester, items } => peer.get_data(&requester, items).await,
        Message::UpdatePeers(addrs) => peer.update_peers(addrs).await,
        Message::SyncRequest { .. } | Message::SyncResponse { .. } => {
            anyhow::bail!("request/response message cannot be dispatched one-way")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrip() {
        let share = RandBeaconSigShare {
            owner: [1u8; 20],
            round: 3,
            last_sig_hash: [2u8; 32],
            sig: vec![4, 5, 6],
        };
        let bytes = encode_message(&Message::RandBeaconSigShare(share.clone())).unwrap();
        match decode_message(&bytes) {
            Some(Message::RandBeaconSigShare(decoded)) => assert_eq!(decoded, share),
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn inventory_roundtrip() {
        let item = ItemId {
            kind: ItemKind::RandBeaconShare,
            round: 9,
            ref_hash: [0u8; 32],
            hash: [7u8; 32],
        };
        let msg = Message::Inventory {
            sender: "127.0.0.1:11001".into(),
            items: vec![item],
        };
        let bytes = encode_message(&msg).unwrap();
        match decode_message(&bytes) {
            Some(Message::Inventory { sender, items }) => {
                assert_eq!(sender, "127.0.0.1:11001");
                assert_eq!(items, vec![item]);
            }
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn sync_response_roundtrip() {
        let msg = Message::SyncResponse {
            sigs: vec![RandBeaconSig {
                round: 1,
                last_rand_val: [1u8; 32],
                sig: vec![2],
            }],
            blocks: vec![],
        };
        let bytes = encode_message(&msg).unwrap();
        match decode_message(&bytes) {
            Some(Message::SyncResponse { sigs, blocks }) => {
                assert_eq!(sigs.len(), 1);
                assert!(blocks.is_empty());
            }
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut data = Vec::new();
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&[0u8; 10]);
        assert!(decode_message(&data).is_none());
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let bytes = encode_message(&Message::Txn(vec![1, 2, 3])).unwrap();
        assert!(decode_message(&bytes[..bytes.len() - 1]).is_none());
    }
}

//! # Meridian
//!
//! The consensus core of a round-based Byzantine-fault-tolerant decentralized
//! exchange:
//! - **Threshold random beacon** — each round the network recovers one
//!   unforgeable group signature from member shares; its hash is the round's
//!   random value and reseeds the next round
//! - **Committee rotation** — three independently-seeded deterministic streams
//!   select the random-beacon, block-proposer, and notarization committees,
//!   advancing in lockstep with the beacon
//! - **Deterministic ranking** — proposer priority within a committee is a
//!   permutation index derived from the block-proposer stream
//! - **Round-scoped gossip** — an inventory/get-data state machine that
//!   validates, deduplicates, fetches, and forwards consensus artifacts while
//!   enforcing round monotonicity
//!
//! The outer chain store, the artifact validator, and the threshold-signature
//! primitive are external collaborators, consumed through traits
//! ([`consensus::chain::Chain`], [`consensus::validator::ArtifactValidator`],
//! [`consensus::threshold::ThresholdScheme`]).

pub mod config;
pub mod consensus;
pub mod network;

/// Protocol constants
pub mod constants {
    /// Maximum network message size (16 MiB)
    pub const MAX_NETWORK_MESSAGE_BYTES: usize = 16 * 1024 * 1024;
    /// Default number of members per signing group
    pub const DEFAULT_GROUP_SIZE: usize = 3;
    /// Default number of shares required to recover a group signature
    pub const DEFAULT_GROUP_THRESHOLD: usize = 2;
    /// Default nominal round duration in milliseconds
    pub const DEFAULT_BLOCK_TIME_MS: u64 = 1_000;
    /// Maximum concurrent inventory deliveries during a broadcast fan-out
    pub const BROADCAST_CONCURRENCY: usize = 32;
    /// Default P2P listen port
    pub const DEFAULT_P2P_PORT: u16 = 11001;
}

/// 32-byte hash used throughout the protocol
pub type Hash = [u8; 32];

/// 20-byte account address, derivable from a public key
pub type Addr = [u8; 20];

/// BLAKE3 over a framed sequence of byte fields.
///
/// The single hashing primitive of the protocol. Every caller passes its
/// domain tag as the leading field; the hasher input starts with the field
/// count and frames each field with a u32 little-endian length, so neither
/// adjacent fields nor call sites of different arity can ever produce the
/// same input stream. All consensus identities and signing inputs go
/// through this function.
pub fn hash_parts(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(parts.len() as u32).to_le_bytes());
    for part in parts {
        hasher.update(&(part.len() as u32).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

//! # Round-Based Consensus: Threshold Random Beacon + Committee Rotation
//!
//! The protocol advances in rounds. In each round the network collectively
//! produces one unforgeable random value, and that value deterministically
//! reseeds the selection of the three committees that drive the next round.
//!
//! ## How a round works
//!
//! ```text
//! Round R:
//!   1. Members of the round-R random-beacon committee each sign the
//!      canonical encoding of the round-R beacon record with their key share
//!   2. Shares gossip through the network; every node aggregates them
//!   3. At the group threshold T, any node recovers the group signature —
//!      the same signature regardless of which T shares it picked
//!   4. The recovered signature is verified under the group public key,
//!      then gossiped as the round-R beacon signature
//!   5. Accepting the signature advances the beacon to round R+1: each of
//!      the three streams (random-beacon / block-proposer / notarization)
//!      re-derives itself from the signature hash and selects the group
//!      index for its committee
//! ```
//!
//! ## Why three streams?
//!
//! The random-beacon, block-proposer, and notarization committees rotate in
//! lockstep but must be independently sampled — a group should not learn
//! anything about its other-role assignments from its beacon assignment.
//! Each stream is derived from the shared seed under a distinct domain
//! string and thereafter evolves only by mixing in beacon outputs, so all
//! three committee histories are pure functions of the signature history
//! and the initial seed. Every node replays them identically.
//!
//! ## Proposer ranking
//!
//! Within the block-proposer committee, priority is a deterministic
//! permutation of member indices driven by the block-proposer stream
//! (a Fisher-Yates prefix, see [`rand::Rand::perm`]). Distinct members
//! always receive distinct ranks; ties are impossible by construction.
//!
//! ## External collaborators
//!
//! The chain store ([`chain::Chain`]), the artifact validator
//! ([`validator::ArtifactValidator`]), and the threshold-signature
//! primitive ([`threshold::ThresholdScheme`]) are consumed through traits;
//! this module owns only the beacon state machine and the deterministic
//! selection machinery.

pub mod beacon;
pub mod chain;
pub mod group;
pub mod rand;
pub mod threshold;
pub mod types;
pub mod validator;

//! Signing groups.
//!
//! A group is a fixed set of participants sharing a joint public key and
//! threshold signing capability. The group registry — an ordered list of
//! groups agreed at genesis — is what committee selection indexes into:
//! a committee for a round is simply a group index drawn from one of the
//! beacon's streams.

use serde::{Deserialize, Serialize};

use crate::consensus::threshold::GroupPublicKey;
use crate::Addr;

/// A threshold-signing group. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    /// Ordered member list; member index is protocol-significant (it feeds
    /// ranking and key-share derivation).
    pub members: Vec<Addr>,
    /// Aggregate public key the recovered group signature verifies under.
    pub pk: GroupPublicKey,
}

impl Group {
    pub fn new(members: Vec<Addr>, pk: GroupPublicKey) -> Self {
        Group { members, pk }
    }

    /// Position of `addr` in the ordered member list.
    pub fn member_index(&self, addr: &Addr) -> Option<usize> {
        self.members.iter().position(|m| m == addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_index_lookup() {
        let members: Vec<Addr> = (0..3u8).map(|i| [i; 20]).collect();
        let group = Group::new(members, GroupPublicKey([0u8; 32]));
        assert_eq!(group.member_index(&[1u8; 20]), Some(1));
        assert_eq!(group.member_index(&[9u8; 20]), None);
    }
}

//! Hybrid logical clock timestamps.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::id::ExecutorId;

/// A hybrid logical clock timestamp: host physical time paired with the
/// writing node's identity.
///
/// Ordering is lexicographic on `(time, node)` — the field order below is
/// load-bearing for the derived `Ord`. Two writes from different nodes can
/// never compare equal: on equal physical times the higher node wins, so
/// every LWW decision is total and deterministic.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Hlc {
    /// Physical time as reported by the host, in its native resolution.
    pub time: u64,
    /// 16-byte prefix of the writing executor's identity.
    pub node: [u8; 16],
}

impl Hlc {
    /// Serialized width: 8-byte little-endian time plus the 16-byte node.
    pub const LENGTH: usize = 24;

    #[must_use]
    pub const fn new(time: u64, node: [u8; 16]) -> Self {
        Self { time, node }
    }

    /// Stamps `time` with the node prefix of `executor`.
    #[must_use]
    pub fn of(time: u64, executor: &ExecutorId) -> Self {
        Self {
            time,
            node: executor.node_prefix(),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut bytes = [0; Self::LENGTH];
        bytes[..8].copy_from_slice(&self.time.to_le_bytes());
        bytes[8..].copy_from_slice(&self.node);
        bytes
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8; Self::LENGTH]) -> Self {
        let mut time = [0; 8];
        time.copy_from_slice(&bytes[..8]);
        let mut node = [0; 16];
        node.copy_from_slice(&bytes[8..]);
        Self {
            time: u64::from_le_bytes(time),
            node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_time_wins() {
        let a = Hlc::new(100, [0xaa; 16]);
        let b = Hlc::new(90, [0xbb; 16]);
        assert!(a > b, "physical time dominates the node component");
    }

    #[test]
    fn node_breaks_ties() {
        let a = Hlc::new(100, [0x01; 16]);
        let b = Hlc::new(100, [0x02; 16]);
        assert!(b > a, "higher node wins on equal times");
        assert_ne!(a, b, "distinct nodes can never compare equal");
    }

    #[test]
    fn byte_round_trip() {
        let hlc = Hlc::new(0x0102_0304_0506_0708, [7; 16]);
        assert_eq!(Hlc::from_bytes(&hlc.to_bytes()), hlc, "round trip");
    }

    #[test]
    fn of_uses_executor_prefix() {
        let mut bytes = [0; 32];
        bytes[0] = 0xff;
        bytes[31] = 0xee;
        let executor = ExecutorId::new(bytes);
        let hlc = Hlc::of(42, &executor);
        assert_eq!(hlc.time, 42, "time carried through");
        assert_eq!(hlc.node[0], 0xff, "prefix starts at byte zero");
        assert_eq!(hlc.node[15], 0, "tail of the executor id is dropped");
    }
}

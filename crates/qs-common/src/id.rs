//! Node and snapshot identity types.
//!
//! A node keeps the same [`StableId`] for its whole conceptual lifetime, so the
//! "same" object can be matched across two distinct in-memory instances (the
//! live graph and a snapshot of it). The identifier is derived from durable
//! placement attributes: the area the node was spawned in plus a per-area
//! sequence number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag naming a node's concrete type (e.g. `"Spring"`, `"Sprite"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(pub String);

impl TypeTag {
    pub fn new(name: impl Into<String>) -> Self {
        TypeTag(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(name: &str) -> Self {
        TypeTag(name.to_string())
    }
}

/// Stable identity of a top-level node.
///
/// Format: `<area>:<seq>`. Two nodes with equal `StableId` represent the same
/// conceptual object, regardless of which graph instance holds them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StableId {
    /// Area (room) the node belongs to.
    pub area: String,
    /// Sequence number assigned by the area when the node was placed.
    pub seq: u32,
}

impl StableId {
    pub fn new(area: impl Into<String>, seq: u32) -> Self {
        StableId {
            area: area.into(),
            seq,
        }
    }

    /// Parse an `<area>:<seq>` string.
    pub fn parse(s: &str) -> Option<Self> {
        let (area, seq) = s.rsplit_once(':')?;
        if area.is_empty() {
            return None;
        }
        let seq = seq.parse::<u32>().ok()?;
        Some(StableId::new(area, seq))
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.area, self.seq)
    }
}

/// Snapshot ID for correlating capture/install log lines.
///
/// Format: `snap-<date>-<time>-<random>`
/// Example: `snap-20260115-143022-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    /// Generate a new snapshot ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        SnapshotId(format!("snap-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }

    /// Parse an existing snapshot ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with("snap-") && s.len() > 20 {
            Some(SnapshotId(s.to_string()))
        } else {
            None
        }
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_id_format() {
        let sid = SnapshotId::new();
        assert!(sid.0.starts_with("snap-"));
        assert!(sid.0.len() > 20);
        assert!(SnapshotId::parse(&sid.0).is_some());
    }

    #[test]
    fn test_stable_id_display_and_parse() {
        let id = StableId::new("a-01", 42);
        assert_eq!(id.to_string(), "a-01:42");
        assert_eq!(StableId::parse("a-01:42"), Some(id));
    }

    #[test]
    fn test_stable_id_parse_rejects_garbage() {
        assert_eq!(StableId::parse("no-sequence"), None);
        assert_eq!(StableId::parse(":3"), None);
        assert_eq!(StableId::parse("room:x"), None);
    }

    #[test]
    fn test_stable_id_area_may_contain_colon() {
        let id = StableId::parse("lvl:b:7").unwrap();
        assert_eq!(id.area, "lvl:b");
        assert_eq!(id.seq, 7);
    }
}

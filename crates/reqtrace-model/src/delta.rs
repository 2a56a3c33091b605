//! Entity deltas
//!
//! Provides [`EntityDelta`], the three-way partition of two version snapshots
//! of one entity kind, and [`ProjectDelta`], which pairs the artifact and
//! trace partitions.
//!
//! Entities present in both snapshots with equal fingerprints are unchanged
//! and not reported.
//!
//! On the wire each partition is a list; revisions carry their own key, so
//! the maps are rebuilt on load and trace keys never have to be map keys.

use crate::entity::{ArtifactKind, EntityKind, Revision, TraceKind};
use crate::version::VersionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt;

/// Snapshot of one entity kind at one version, keyed by business key
pub type Snapshot<K> = BTreeMap<<K as EntityKind>::Key, Revision<K>>;

/// Before/after pair of a modified entity
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Modification<K: EntityKind> {
    pub before: Revision<K>,
    pub after: Revision<K>,
}

impl<K: EntityKind> Clone for Modification<K> {
    fn clone(&self) -> Self {
        Self {
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<K: EntityKind> PartialEq for Modification<K> {
    fn eq(&self, other: &Self) -> bool {
        self.before == other.before && self.after == other.after
    }
}

impl<K: EntityKind> fmt::Debug for Modification<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modification")
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

/// Added / modified / removed partition for one entity kind
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EntityDelta<K: EntityKind> {
    #[serde(with = "by_key")]
    pub added: BTreeMap<K::Key, Revision<K>>,
    #[serde(with = "by_key")]
    pub modified: BTreeMap<K::Key, Modification<K>>,
    #[serde(with = "by_key")]
    pub removed: BTreeMap<K::Key, Revision<K>>,
}

/// Partition entry that knows its own business key
trait Keyed {
    type Key: Clone + Ord + Display;

    fn key(&self) -> &Self::Key;
}

impl<K: EntityKind> Keyed for Revision<K> {
    type Key = K::Key;

    fn key(&self) -> &K::Key {
        &self.key
    }
}

impl<K: EntityKind> Keyed for Modification<K> {
    type Key = K::Key;

    fn key(&self) -> &K::Key {
        &self.after.key
    }
}

/// Serialize a keyed map as the sequence of its values
mod by_key {
    use super::Keyed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub(super) fn serialize<S, V>(
        map: &BTreeMap<V::Key, V>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Keyed + Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub(super) fn deserialize<'de, D, V>(
        deserializer: D,
    ) -> Result<BTreeMap<V::Key, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Keyed + Deserialize<'de>,
    {
        let mut map = BTreeMap::new();
        for entry in Vec::<V>::deserialize(deserializer)? {
            let key = entry.key().clone();
            if map.contains_key(&key) {
                return Err(D::Error::custom(format!("duplicate entry for {key}")));
            }
            map.insert(key, entry);
        }
        Ok(map)
    }
}

impl<K: EntityKind> EntityDelta<K> {
    /// Empty delta
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            added: BTreeMap::new(),
            modified: BTreeMap::new(),
            removed: BTreeMap::new(),
        }
    }

    /// Partition two snapshots
    ///
    /// # Performance
    /// O(n log n) in the combined snapshot size
    #[must_use]
    pub fn between(baseline: &Snapshot<K>, target: &Snapshot<K>) -> Self {
        let mut delta = Self::empty();

        for (key, after) in target {
            match baseline.get(key) {
                None => {
                    delta.added.insert(key.clone(), after.clone());
                }
                Some(before) if !before.is_equivalent(after) => {
                    delta.modified.insert(
                        key.clone(),
                        Modification {
                            before: before.clone(),
                            after: after.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }

        for (key, before) in baseline {
            if !target.contains_key(key) {
                delta.removed.insert(key.clone(), before.clone());
            }
        }

        delta
    }

    /// Check whether nothing changed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Per-partition counts
    #[inline]
    #[must_use]
    pub fn summary(&self) -> DeltaSummary {
        DeltaSummary {
            added: self.added.len(),
            modified: self.modified.len(),
            removed: self.removed.len(),
        }
    }
}

impl<K: EntityKind> Default for EntityDelta<K> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: EntityKind> Clone for EntityDelta<K> {
    fn clone(&self) -> Self {
        Self {
            added: self.added.clone(),
            modified: self.modified.clone(),
            removed: self.removed.clone(),
        }
    }
}

impl<K: EntityKind> PartialEq for EntityDelta<K> {
    fn eq(&self, other: &Self) -> bool {
        self.added == other.added
            && self.modified == other.modified
            && self.removed == other.removed
    }
}

impl<K: EntityKind> fmt::Debug for EntityDelta<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDelta")
            .field("kind", &K::TAG)
            .field("added", &self.added.keys().collect::<Vec<_>>())
            .field("modified", &self.modified.keys().collect::<Vec<_>>())
            .field("removed", &self.removed.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Partition sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

impl fmt::Display for DeltaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{} ~{} -{}", self.added, self.modified, self.removed)
    }
}

/// Delta between two versions of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDelta {
    pub baseline: VersionId,
    pub target: VersionId,
    pub artifacts: EntityDelta<ArtifactKind>,
    pub traces: EntityDelta<TraceKind>,
}

impl ProjectDelta {
    /// Check whether neither kind changed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.traces.is_empty()
    }
}

impl fmt::Display for ProjectDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: artifacts {}, traces {}",
            self.baseline,
            self.target,
            self.artifacts.summary(),
            self.traces.summary()
        )
    }
}

//! Annotation values
//!
//! Per LINEAGE.md §2. Annotations form provenance terms: `Composite`
//! multiplies contributors (join), `Set` adds them (aggregation), and
//! `Synthetic` is a compacted handle standing in for either.

use serde::{Deserialize, Serialize};

use crate::identity::{SourceId, SourceTid, Tid};

/// Synthetic tuple identifier: a dense index into one side table.
pub type SyntheticTid = u64;

/// Identifier of one compacting operator instance within one execution
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OpId(pub u32);

impl OpId {
    /// Index into the per-execution side table list
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The lineage annotation carried alongside one tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Annotation {
    /// One base row of one registered access
    Scalar(SourceTid),
    /// Compacted handle into the side table of `op`
    Synthetic { op: OpId, tid: SyntheticTid },
    /// One slot per join side; the provenance product
    Composite(Vec<Annotation>),
    /// Ordered contributors of one group; the provenance sum.
    /// Duplicates are preserved: two paths are two edges.
    Set(Vec<Annotation>),
    /// Dropped join side, unavailable identity, or no rule
    Absent,
}

impl Annotation {
    /// A scalar tag for one row of one access
    pub fn scalar(source: SourceId, tid: Tid) -> Self {
        Annotation::Scalar(SourceTid::new(source, tid))
    }

    /// A compacted handle
    pub fn synthetic(op: OpId, tid: SyntheticTid) -> Self {
        Annotation::Synthetic { op, tid }
    }

    /// A two-slot product for an inner join
    pub fn composite(left: Annotation, right: Annotation) -> Self {
        Annotation::Composite(vec![left, right])
    }

    /// An ordered sum of group contributors
    pub fn set(contributors: Vec<Annotation>) -> Self {
        Annotation::Set(contributors)
    }

    /// True if the annotation is already one cell wide
    ///
    /// Scalar-shaped annotations flow through downstream operators
    /// without compaction (LINEAGE.md §4).
    pub fn is_scalar_shaped(&self) -> bool {
        matches!(
            self,
            Annotation::Scalar(_) | Annotation::Synthetic { .. } | Annotation::Absent
        )
    }

    /// True if no base row can ever be bound through this annotation
    pub fn is_absent(&self) -> bool {
        matches!(self, Annotation::Absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        assert!(Annotation::scalar(SourceId(0), 3).is_scalar_shaped());
        assert!(Annotation::synthetic(OpId(1), 9).is_scalar_shaped());
        assert!(Annotation::Absent.is_scalar_shaped());

        let composite = Annotation::composite(
            Annotation::scalar(SourceId(0), 1),
            Annotation::scalar(SourceId(1), 2),
        );
        assert!(!composite.is_scalar_shaped());

        let set = Annotation::set(vec![Annotation::scalar(SourceId(0), 1)]);
        assert!(!set.is_scalar_shaped());
    }

    #[test]
    fn test_equality_is_structural() {
        let a = Annotation::composite(
            Annotation::scalar(SourceId(0), 1),
            Annotation::scalar(SourceId(1), 2),
        );
        let b = Annotation::composite(
            Annotation::scalar(SourceId(0), 1),
            Annotation::scalar(SourceId(1), 2),
        );
        let c = Annotation::composite(
            Annotation::scalar(SourceId(1), 2),
            Annotation::scalar(SourceId(0), 1),
        );

        // Slot order matters: (l, r) and (r, l) are different terms
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_preserves_duplicates() {
        let one = Annotation::scalar(SourceId(0), 1);
        let set = Annotation::set(vec![one.clone(), one.clone()]);
        match set {
            Annotation::Set(elems) => assert_eq!(elems.len(), 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_absent() {
        assert!(Annotation::Absent.is_absent());
        assert!(!Annotation::scalar(SourceId(0), 0).is_absent());
    }
}

//! Per-operator side tables
//!
//! Per LINEAGE.md §4: a side table maps synthetic tids back to the
//! complex annotations they replaced. Entries are append-only and
//! interning dedups by annotation content.

use std::collections::HashMap;

use crate::annotation::{Annotation, OpId, SyntheticTid};

/// The side table of one compacting operator instance
///
/// Synthetic tids are the dense entry indexes, so resolution is a
/// vector lookup.
#[derive(Debug)]
pub struct SideTable {
    op: OpId,
    entries: Vec<Annotation>,
    interned: HashMap<Annotation, SyntheticTid>,
}

impl SideTable {
    /// Create an empty side table for one operator instance
    pub fn new(op: OpId) -> Self {
        Self {
            op,
            entries: Vec::new(),
            interned: HashMap::new(),
        }
    }

    /// The owning operator instance
    pub fn op(&self) -> OpId {
        self.op
    }

    /// Intern an annotation, returning its synthetic tid
    ///
    /// The same annotation content always gets the same tid.
    pub fn intern(&mut self, annotation: Annotation) -> SyntheticTid {
        if let Some(&tid) = self.interned.get(&annotation) {
            return tid;
        }
        let tid = self.entries.len() as SyntheticTid;
        self.entries.push(annotation.clone());
        self.interned.insert(annotation, tid);
        tid
    }

    /// Resolve a synthetic tid back to its annotation
    pub fn resolve(&self, tid: SyntheticTid) -> Option<&Annotation> {
        self.entries.get(tid as usize)
    }

    /// Number of distinct interned annotations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was interned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

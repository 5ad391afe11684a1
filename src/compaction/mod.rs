//! Lineage compaction
//!
//! Per LINEAGE.md §4: after any operator whose output annotation is
//! not scalar-shaped, the annotation is interned into that operator's
//! side table and replaced by a synthetic handle. This bounds the
//! annotation width carried between operators to one cell regardless
//! of plan depth.
//!
//! The `Compactor` owns every side table of one execution. Producer
//! threads share it behind an `Arc`; appends are lock-protected and
//! a reader never observes a partially written mapping.

mod side_table;

pub use side_table::SideTable;

use std::sync::Mutex;

use crate::annotation::{Annotation, OpId, SyntheticTid};

/// All side tables of one execution
#[derive(Debug, Default)]
pub struct Compactor {
    tables: Mutex<Vec<SideTable>>,
}

impl Compactor {
    /// Create a compactor with no operator instances
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next operator instance and its empty side table
    ///
    /// Ids are dense and allocation order follows plan evaluation, so
    /// a synthetic handle can only reference an earlier-allocated op.
    pub fn new_op(&self) -> OpId {
        let mut tables = self.tables.lock().unwrap();
        let op = OpId(tables.len() as u32);
        tables.push(SideTable::new(op));
        op
    }

    /// Compact an annotation emitted by `op`
    ///
    /// Scalar-shaped annotations pass through untouched; anything
    /// wider is interned and replaced by a synthetic handle.
    pub fn compact(&self, op: OpId, annotation: Annotation) -> Annotation {
        if annotation.is_scalar_shaped() {
            return annotation;
        }
        let mut tables = self.tables.lock().unwrap();
        let table = &mut tables[op.index()];
        let tid = table.intern(annotation);
        Annotation::synthetic(op, tid)
    }

    /// Resolve a synthetic handle to a clone of its annotation
    pub fn resolve(&self, op: OpId, tid: SyntheticTid) -> Option<Annotation> {
        let tables = self.tables.lock().unwrap();
        tables
            .get(op.index())
            .and_then(|table| table.resolve(tid))
            .cloned()
    }

    /// Number of operator instances allocated
    pub fn op_count(&self) -> usize {
        self.tables.lock().unwrap().len()
    }

    /// Total distinct annotations interned across all side tables
    pub fn interned_total(&self) -> u64 {
        let tables = self.tables.lock().unwrap();
        tables.iter().map(|t| t.len() as u64).sum()
    }
}

//! Annotation propagation engine
//!
//! Per LINEAGE.md §2-§3: one annotation per in-flight tuple, created
//! at scan and transformed by a per-operator-class rule as tuples flow
//! up the plan.

mod rules;
mod types;

pub use rules::{propagate_group, propagate_join, OperatorClass};
pub use types::{Annotation, OpId, SyntheticTid};

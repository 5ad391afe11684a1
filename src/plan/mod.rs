//! Query plan vocabulary
//!
//! Per LINEAGE.md §3, capture understands a closed set of operator
//! kinds: scan, filter, project, join, aggregate, distinct, union,
//! and opaque (anything else). The plan model here is that closed
//! vocabulary; the host engine's own plan maps onto it.

mod aggregate;
mod node;
mod predicate;

pub use aggregate::{Accumulator, AggregateOp, AggregateSpec};
pub use node::{JoinKind, JoinOn, PlanNode};
pub use predicate::{FilterOp, Predicate, PredicateFilter};

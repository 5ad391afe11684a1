//! lineagedb - fine-grained data lineage capture and what-if evaluation
//!
//! Tags source rows at scan time, propagates annotations through the
//! operators of a query, and condenses the result into a per-query
//! lineage block (LINEAGE.md). Captured blocks feed the what-if engine,
//! which replays removal scenarios without re-executing the query
//! (WHATIF.md).

pub mod annotation;
pub mod block;
pub mod compaction;
pub mod exec;
pub mod identity;
pub mod observability;
pub mod plan;
pub mod session;
pub mod whatif;

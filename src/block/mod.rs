//! Lineage blocks
//!
//! The durable artifact of capture: per-query blocks of source columns
//! and lineage edges, built after execution finishes (LINEAGE.md §5),
//! retained per session, and exportable as JSON lines.

pub mod block;
pub mod builder;
pub mod errors;
pub mod export;
pub mod registry;

pub use block::{BlockColumn, BlockMeta, LineageBlock, LineageEdge};
pub use builder::BlockBuilder;
pub use errors::{BlockError, BlockErrorCode, BlockResult};
pub use export::{export_jsonl, export_to_path};
pub use registry::BlockRegistry;

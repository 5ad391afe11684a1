//! Reference executor
//!
//! A small catalog-backed plan evaluator. It exists to host the
//! capture callbacks at realistic operator seams; it is not a query
//! engine in its own right (LINEAGE.md §1).

pub mod catalog;
pub mod errors;
pub mod evaluator;
pub mod row;

pub use catalog::{Catalog, Table};
pub use errors::{ExecError, ExecErrorCode, ExecResult};
pub use evaluator::Evaluator;
pub use row::{merge_rows, row_from_object, Row};

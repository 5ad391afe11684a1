//! What-if evaluation
//!
//! Answers "what would this query have returned without those source
//! rows" from a captured block and the live catalog, without
//! re-executing the query (WHATIF.md §1). Scenario matrices assign
//! masks or codes to source tids; the engine folds them over block
//! edges in a single pass per request (WHATIF.md §2, W2).

pub mod engine;
pub mod errors;
pub mod matrix;
pub mod report;

pub use engine::WhatIfEngine;
pub use errors::{WhatIfError, WhatIfResult};
pub use matrix::{
    BitmaskMatrix, ComposedMatrix, Measure, ScenarioEffect, SparseMatrix,
    MAX_BITMASK_SCENARIOS, MAX_SPARSE_SCENARIOS,
};
pub use report::{BitmaskReport, ComposedReport, SparseReport};

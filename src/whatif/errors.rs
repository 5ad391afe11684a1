//! What-if request errors
//!
//! Evaluation is all-or-nothing: a request either produces a full
//! report or is rejected with one of these, leaving the block and the
//! catalog untouched (WHATIF.md §5, W3).

use thiserror::Error;

use crate::block::BlockError;

#[derive(Debug, Error)]
pub enum WhatIfError {
    /// A matrix does not cover the block, or the block does not fit
    /// the request shape
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A matrix or measure names a relation the block or catalog does
    /// not have
    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    /// The scenario domain exceeds what the mode supports
    #[error("too many scenarios: {requested} (limit {limit})")]
    TooManyScenarios { requested: u64, limit: u64 },

    /// The measure or matrix kind is not valid for the requested mode
    #[error("mode unsupported: {0}")]
    ModeUnsupported(String),

    /// A matrix is internally inconsistent
    #[error("malformed matrix: {0}")]
    MalformedMatrix(String),

    /// The measure column resolves to nothing in the block
    #[error("missing measure: {0}")]
    MissingMeasure(String),

    /// The underlying block is stale or unreadable
    #[error(transparent)]
    Block(#[from] BlockError),
}

impl WhatIfError {
    /// Returns the stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            WhatIfError::ShapeMismatch(_) => "LIN_SHAPE_MISMATCH",
            WhatIfError::UnknownRelation(_) => "LIN_WHATIF_UNKNOWN_RELATION",
            WhatIfError::TooManyScenarios { .. } => "LIN_WHATIF_TOO_MANY_SCENARIOS",
            WhatIfError::ModeUnsupported(_) => "LIN_WHATIF_MODE_UNSUPPORTED",
            WhatIfError::MalformedMatrix(_) => "LIN_WHATIF_MALFORMED_MATRIX",
            WhatIfError::MissingMeasure(_) => "LIN_WHATIF_MISSING_MEASURE",
            WhatIfError::Block(err) => err.code().code(),
        }
    }
}

pub type WhatIfResult<T> = Result<T, WhatIfError>;

//! What-if request inputs
//!
//! A request names one measure and one removal matrix per source
//! relation. Matrices are keyed by base-table tid against the version
//! the block captured; relations without a matrix are unconstrained
//! (WHATIF.md §1).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::identity::Tid;
use crate::plan::AggregateOp;

use super::errors::{WhatIfError, WhatIfResult};

/// Scenario limit for the bitmask mode; one bit per scenario
pub const MAX_BITMASK_SCENARIOS: usize = 64;

/// Scenario limit for the sparse and composed modes
pub const MAX_SPARSE_SCENARIOS: u64 = 65_536;

/// The aggregate a what-if request re-evaluates
///
/// The measure column must resolve to exactly one access of
/// `relation` in the block. `Count` ignores the column and counts
/// surviving contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measure {
    pub relation: String,
    pub column: String,
    pub op: AggregateOp,
}

impl Measure {
    pub fn new(
        op: AggregateOp,
        relation: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            column: column.into(),
            op,
        }
    }

    pub fn sum(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(AggregateOp::Sum, relation, column)
    }

    pub fn count(relation: impl Into<String>) -> Self {
        Self::new(AggregateOp::Count, relation, "")
    }

    pub fn avg(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(AggregateOp::Avg, relation, column)
    }

    pub fn min(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(AggregateOp::Min, relation, column)
    }

    pub fn max(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(AggregateOp::Max, relation, column)
    }
}

/// What a set scenario bit does to a targeted row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ScenarioEffect {
    /// The row survives the scenario; an unset bit removes it
    Retain,
    /// The row's measure is multiplied by the factor; an unset bit
    /// leaves it unchanged. Counts are unaffected.
    Scale(f64),
}

/// Per-row scenario bitmasks over one relation
///
/// Bit i of a row's mask is its fate in scenario i. A covered row with
/// mask zero is removed from (or untargeted in) every scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitmaskMatrix {
    scenario_count: usize,
    masks: BTreeMap<Tid, u64>,
}

impl BitmaskMatrix {
    pub fn new(scenario_count: usize) -> WhatIfResult<Self> {
        if scenario_count == 0 {
            return Err(WhatIfError::MalformedMatrix(
                "bitmask matrix needs at least one scenario".to_string(),
            ));
        }
        if scenario_count > MAX_BITMASK_SCENARIOS {
            return Err(WhatIfError::TooManyScenarios {
                requested: scenario_count as u64,
                limit: MAX_BITMASK_SCENARIOS as u64,
            });
        }
        Ok(Self {
            scenario_count,
            masks: BTreeMap::new(),
        })
    }

    /// Set one row's mask; bits past the scenario count must be clear
    pub fn set_mask(&mut self, tid: Tid, mask: u64) -> WhatIfResult<()> {
        if self.scenario_count < 64 && (mask >> self.scenario_count) != 0 {
            return Err(WhatIfError::MalformedMatrix(format!(
                "mask for tid {} has bits past scenario {}",
                tid,
                self.scenario_count - 1
            )));
        }
        self.masks.insert(tid, mask);
        Ok(())
    }

    pub fn mask(&self, tid: Tid) -> Option<u64> {
        self.masks.get(&tid).copied()
    }

    pub fn scenario_count(&self) -> usize {
        self.scenario_count
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

/// Per-row codes over one relation for subtraction-based evaluation
///
/// Each covered row carries one code in `0..code_count`; scenario c
/// removes every row with that code. Ordered matrices additionally
/// support threshold scenarios over the code order (WHATIF.md §2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SparseMatrix {
    code_count: u32,
    ordered: bool,
    codes: BTreeMap<Tid, u32>,
}

impl SparseMatrix {
    /// Matrix over an unordered code domain (categories)
    pub fn unordered(code_count: u32) -> WhatIfResult<Self> {
        Self::build(code_count, false)
    }

    /// Matrix over an ordered code domain (ranks)
    pub fn ordered(code_count: u32) -> WhatIfResult<Self> {
        Self::build(code_count, true)
    }

    fn build(code_count: u32, ordered: bool) -> WhatIfResult<Self> {
        if code_count == 0 {
            return Err(WhatIfError::MalformedMatrix(
                "sparse matrix needs at least one code".to_string(),
            ));
        }
        if u64::from(code_count) > MAX_SPARSE_SCENARIOS {
            return Err(WhatIfError::TooManyScenarios {
                requested: u64::from(code_count),
                limit: MAX_SPARSE_SCENARIOS,
            });
        }
        Ok(Self {
            code_count,
            ordered,
            codes: BTreeMap::new(),
        })
    }

    pub fn set_code(&mut self, tid: Tid, code: u32) -> WhatIfResult<()> {
        if code >= self.code_count {
            return Err(WhatIfError::MalformedMatrix(format!(
                "code {} for tid {} outside domain 0..{}",
                code, tid, self.code_count
            )));
        }
        self.codes.insert(tid, code);
        Ok(())
    }

    pub fn code(&self, tid: Tid) -> Option<u32> {
        self.codes.get(&tid).copied()
    }

    pub fn code_count(&self) -> u32 {
        self.code_count
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Per-row (partition, rank) pairs over one relation
///
/// Scenario (p, r) removes every row in partition p with rank at most
/// r. Ranks are ordered within each partition; partitions are
/// independent (WHATIF.md §2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedMatrix {
    partition_count: u32,
    rank_count: u32,
    entries: BTreeMap<Tid, (u32, u32)>,
}

impl ComposedMatrix {
    pub fn new(partition_count: u32, rank_count: u32) -> WhatIfResult<Self> {
        if partition_count == 0 || rank_count == 0 {
            return Err(WhatIfError::MalformedMatrix(
                "composed matrix needs at least one partition and one rank".to_string(),
            ));
        }
        let requested = u64::from(partition_count) * u64::from(rank_count);
        if requested > MAX_SPARSE_SCENARIOS {
            return Err(WhatIfError::TooManyScenarios {
                requested,
                limit: MAX_SPARSE_SCENARIOS,
            });
        }
        Ok(Self {
            partition_count,
            rank_count,
            entries: BTreeMap::new(),
        })
    }

    pub fn set_entry(&mut self, tid: Tid, partition: u32, rank: u32) -> WhatIfResult<()> {
        if partition >= self.partition_count {
            return Err(WhatIfError::MalformedMatrix(format!(
                "partition {} for tid {} outside domain 0..{}",
                partition, tid, self.partition_count
            )));
        }
        if rank >= self.rank_count {
            return Err(WhatIfError::MalformedMatrix(format!(
                "rank {} for tid {} outside domain 0..{}",
                rank, tid, self.rank_count
            )));
        }
        self.entries.insert(tid, (partition, rank));
        Ok(())
    }

    pub fn entry(&self, tid: Tid) -> Option<(u32, u32)> {
        self.entries.get(&tid).copied()
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn rank_count(&self) -> u32 {
        self.rank_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

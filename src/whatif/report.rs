//! What-if evaluation reports
//!
//! Reports key scenario values by output tid, positional against the
//! captured result: output tid i is row i of the query the block was
//! built for. A null value marks a group that would not exist under
//! the scenario (every contribution removed).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::identity::Tid;

/// Result of a bitmask evaluation: one value per output per scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitmaskReport {
    pub scenario_count: usize,
    pub per_output: BTreeMap<Tid, Vec<Value>>,
}

impl BitmaskReport {
    /// Value of one output row under one scenario
    pub fn value(&self, output_tid: Tid, scenario: usize) -> Option<&Value> {
        self.per_output.get(&output_tid)?.get(scenario)
    }
}

/// Result of a sparse evaluation: baseline plus one value per code
///
/// For an equality request, entry c is the measure with code c
/// removed. For a range request, entry c is the measure with every
/// code at most c removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparseReport {
    pub code_count: u32,
    pub baseline: BTreeMap<Tid, Value>,
    pub per_output: BTreeMap<Tid, Vec<Value>>,
}

impl SparseReport {
    pub fn baseline_value(&self, output_tid: Tid) -> Option<&Value> {
        self.baseline.get(&output_tid)
    }

    pub fn value(&self, output_tid: Tid, code: u32) -> Option<&Value> {
        self.per_output.get(&output_tid)?.get(code as usize)
    }
}

/// Result of a composed evaluation
///
/// Entry (p, r) is the measure with every row in partition p of rank
/// at most r removed; other partitions are untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedReport {
    pub partition_count: u32,
    pub rank_count: u32,
    pub baseline: BTreeMap<Tid, Value>,
    pub per_output: BTreeMap<Tid, BTreeMap<u32, Vec<Value>>>,
}

impl ComposedReport {
    pub fn baseline_value(&self, output_tid: Tid) -> Option<&Value> {
        self.baseline.get(&output_tid)
    }

    pub fn value(&self, output_tid: Tid, partition: u32, rank: u32) -> Option<&Value> {
        self.per_output
            .get(&output_tid)?
            .get(&partition)?
            .get(rank as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bitmask_report_lookup() {
        let mut per_output = BTreeMap::new();
        per_output.insert(0u64, vec![json!(140), json!(40)]);
        let report = BitmaskReport {
            scenario_count: 2,
            per_output,
        };

        assert_eq!(report.value(0, 0), Some(&json!(140)));
        assert_eq!(report.value(0, 1), Some(&json!(40)));
        assert_eq!(report.value(0, 2), None);
        assert_eq!(report.value(1, 0), None);
    }

    #[test]
    fn test_sparse_report_lookup() {
        let mut baseline = BTreeMap::new();
        baseline.insert(0u64, json!(140));
        let mut per_output = BTreeMap::new();
        per_output.insert(0u64, vec![json!(100), json!(40), json!(140)]);
        let report = SparseReport {
            code_count: 3,
            baseline,
            per_output,
        };

        assert_eq!(report.baseline_value(0), Some(&json!(140)));
        assert_eq!(report.value(0, 1), Some(&json!(40)));
        assert_eq!(report.value(0, 3), None);
    }

    #[test]
    fn test_composed_report_lookup() {
        let mut ranks = BTreeMap::new();
        ranks.insert(1u32, vec![json!(90), json!(null)]);
        let mut per_output = BTreeMap::new();
        per_output.insert(2u64, ranks);
        let report = ComposedReport {
            partition_count: 2,
            rank_count: 2,
            baseline: BTreeMap::new(),
            per_output,
        };

        assert_eq!(report.value(2, 1, 0), Some(&json!(90)));
        assert_eq!(report.value(2, 1, 1), Some(&json!(null)));
        assert_eq!(report.value(2, 0, 0), None);
    }

    #[test]
    fn test_reports_serialize() {
        let report = BitmaskReport {
            scenario_count: 1,
            per_output: BTreeMap::from([(0u64, vec![json!(5)])]),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scenario_count"], 1);
        assert_eq!(json["per_output"]["0"][0], 5);
    }
}

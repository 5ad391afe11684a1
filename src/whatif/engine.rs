//! What-if evaluation over lineage blocks
//!
//! Replays removal scenarios against a captured block and its base
//! tables without touching the executor (WHATIF.md §5, W3). The unit
//! of contribution is the block edge: an edge survives a scenario when
//! every source row it binds survives (WHATIF.md §2).
//!
//! The bitmask mode recomputes each scenario directly, so it carries
//! any aggregate. The sparse and composed modes answer one scenario
//! per code by subtraction from a baseline, which restricts them to
//! additive measures.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use crate::block::{BlockError, LineageBlock, LineageEdge};
use crate::exec::{Catalog, Table};
use crate::identity::Tid;
use crate::observability::{MetricsRegistry, ObservationScope};
use crate::plan::{Accumulator, AggregateOp};

use super::errors::{WhatIfError, WhatIfResult};
use super::matrix::{BitmaskMatrix, ComposedMatrix, Measure, ScenarioEffect, SparseMatrix};
use super::report::{BitmaskReport, ComposedReport, SparseReport};

/// Evaluates what-if requests against blocks
///
/// Lenient engines exclude rows a matrix does not cover from the
/// baseline and from every scenario; strict engines reject the
/// request instead (WHATIF.md §3).
pub struct WhatIfEngine {
    strict: bool,
    metrics: Option<Arc<MetricsRegistry>>,
}

/// Per-scenario recomputation state for the bitmask mode
#[derive(Clone)]
struct ScenarioSlot {
    survivors: u64,
    acc: Accumulator,
}

impl ScenarioSlot {
    fn new() -> Self {
        Self {
            survivors: 0,
            acc: Accumulator::new(),
        }
    }
}

/// Subtractable aggregate state for the sparse and composed modes
///
/// Mirrors what `Accumulator` tracks, restricted to the additive ops.
#[derive(Debug, Clone, Copy, Default)]
struct AdditiveState {
    edges: u64,
    values: u64,
    sum_int: i64,
    sum_float: f64,
    saw_float: bool,
}

impl AdditiveState {
    fn add(&mut self, op: AggregateOp, value: Option<&Value>) {
        self.edges += 1;
        if matches!(op, AggregateOp::Count) {
            return;
        }
        if let Some(value) = value {
            if value.is_null() {
                return;
            }
            self.values += 1;
            if let Some(i) = value.as_i64() {
                self.sum_int = self.sum_int.wrapping_add(i);
                self.sum_float += i as f64;
            } else if let Some(f) = value.as_f64() {
                self.saw_float = true;
                self.sum_float += f;
            }
        }
    }

    fn add_state(&mut self, other: &AdditiveState) {
        self.edges += other.edges;
        self.values += other.values;
        self.sum_int = self.sum_int.wrapping_add(other.sum_int);
        self.sum_float += other.sum_float;
        self.saw_float |= other.saw_float;
    }

    fn minus(&self, other: &AdditiveState) -> AdditiveState {
        AdditiveState {
            edges: self.edges.saturating_sub(other.edges),
            values: self.values.saturating_sub(other.values),
            sum_int: self.sum_int.wrapping_sub(other.sum_int),
            sum_float: self.sum_float - other.sum_float,
            saw_float: self.saw_float,
        }
    }

    fn finalize(&self, op: AggregateOp) -> Value {
        if self.edges == 0 {
            return Value::Null;
        }
        match op {
            AggregateOp::Count => Value::from(self.edges),
            AggregateOp::Sum => {
                if self.values == 0 {
                    Value::Null
                } else if self.saw_float {
                    Value::from(self.sum_float)
                } else {
                    Value::from(self.sum_int)
                }
            }
            AggregateOp::Avg => {
                if self.values == 0 {
                    Value::Null
                } else {
                    Value::from(self.sum_float / self.values as f64)
                }
            }
            // Gated out before any state is built
            AggregateOp::Min | AggregateOp::Max => Value::Null,
        }
    }
}

impl WhatIfEngine {
    /// Engine that excludes uncovered rows
    pub fn lenient() -> Self {
        Self {
            strict: false,
            metrics: None,
        }
    }

    /// Engine that rejects requests with uncovered rows
    pub fn strict() -> Self {
        Self {
            strict: true,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Evaluate up to 64 independent removal scenarios in one pass
    pub fn evaluate_bitmask(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, BitmaskMatrix>,
    ) -> WhatIfResult<BitmaskReport> {
        self.observed("bitmask", block, || {
            self.bitmask_inner(block, catalog, measure, matrices, ScenarioEffect::Retain)
        })
    }

    /// Bitmask evaluation with an explicit scenario effect
    pub fn evaluate_bitmask_with_effect(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, BitmaskMatrix>,
        effect: ScenarioEffect,
    ) -> WhatIfResult<BitmaskReport> {
        self.observed("bitmask", block, || {
            self.bitmask_inner(block, catalog, measure, matrices, effect)
        })
    }

    /// One removal scenario per code: scenario c removes code c
    pub fn evaluate_sparse_equality(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, SparseMatrix>,
    ) -> WhatIfResult<SparseReport> {
        self.observed("sparse_equality", block, || {
            self.sparse_inner(block, catalog, measure, matrices, false)
        })
    }

    /// One threshold scenario per code: scenario c removes codes <= c
    pub fn evaluate_sparse_range(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, SparseMatrix>,
    ) -> WhatIfResult<SparseReport> {
        self.observed("sparse_range", block, || {
            self.sparse_inner(block, catalog, measure, matrices, true)
        })
    }

    /// Per-partition threshold scenarios: (p, r) removes ranks <= r
    /// inside partition p only
    pub fn evaluate_composed(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, ComposedMatrix>,
    ) -> WhatIfResult<ComposedReport> {
        self.observed("composed", block, || {
            self.composed_inner(block, catalog, measure, matrices)
        })
    }

    fn observed<R>(
        &self,
        mode: &str,
        block: &LineageBlock,
        f: impl FnOnce() -> WhatIfResult<R>,
    ) -> WhatIfResult<R> {
        let query_id = block.query_id.0.to_string();
        let scope =
            ObservationScope::with_fields("WHATIF", &[("mode", mode), ("query_id", &query_id)]);
        match f() {
            Ok(report) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_whatif_evaluations();
                }
                scope.complete();
                Ok(report)
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_whatif_rejections();
                }
                scope.fail(err.code());
                Err(err)
            }
        }
    }

    fn bitmask_inner(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, BitmaskMatrix>,
        effect: ScenarioEffect,
    ) -> WhatIfResult<BitmaskReport> {
        let scenario_count = Self::bitmask_scenario_count(matrices)?;
        let bound = Self::bind_columns(block, matrices)?;
        Self::check_versions(
            block,
            catalog,
            matrices.keys().chain(std::iter::once(&measure.relation)),
        )?;
        let measure_index = Self::resolve_measure(block, measure)?;
        let table = Self::measure_table(catalog, measure)?;

        let full_mask = if scenario_count == 64 {
            u64::MAX
        } else {
            (1u64 << scenario_count) - 1
        };
        let output_count = block.output_count as usize;
        let mut state = vec![vec![ScenarioSlot::new(); scenario_count]; output_count];

        for edge in &block.edges {
            let output = Self::check_edge(block, edge)?;

            let mut mask = match effect {
                ScenarioEffect::Retain => full_mask,
                ScenarioEffect::Scale(_) => 0,
            };
            for (index, matrix) in &bound {
                if let Some(tid) = edge.cells[*index] {
                    match matrix.mask(tid) {
                        Some(m) => match effect {
                            ScenarioEffect::Retain => mask &= m,
                            ScenarioEffect::Scale(_) => mask |= m,
                        },
                        None => {
                            self.reject_uncovered(block, *index, tid)?;
                            // Unknown fate reads as mask zero
                            if matches!(effect, ScenarioEffect::Retain) {
                                mask = 0;
                            }
                        }
                    }
                }
            }

            let value = Self::measure_value(table, measure, edge.cells[measure_index])?;
            let scaled = match effect {
                ScenarioEffect::Scale(factor) => Self::scale_value(&value, factor),
                ScenarioEffect::Retain => None,
            };

            let slots = &mut state[output];
            for s in 0..scenario_count {
                let targeted = mask & (1u64 << s) != 0;
                match effect {
                    ScenarioEffect::Retain => {
                        if targeted {
                            slots[s].survivors += 1;
                            Self::feed(&mut slots[s].acc, measure.op, value.as_ref());
                        }
                    }
                    ScenarioEffect::Scale(_) => {
                        slots[s].survivors += 1;
                        let v = if targeted {
                            scaled.as_ref().or(value.as_ref())
                        } else {
                            value.as_ref()
                        };
                        Self::feed(&mut slots[s].acc, measure.op, v);
                    }
                }
            }
        }

        let mut per_output = BTreeMap::new();
        for (output_tid, slots) in state.into_iter().enumerate() {
            let values = slots
                .into_iter()
                .map(|slot| {
                    if slot.survivors == 0 {
                        Value::Null
                    } else {
                        slot.acc.finalize(measure.op)
                    }
                })
                .collect();
            per_output.insert(output_tid as Tid, values);
        }
        Ok(BitmaskReport {
            scenario_count,
            per_output,
        })
    }

    fn sparse_inner(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, SparseMatrix>,
        range: bool,
    ) -> WhatIfResult<SparseReport> {
        Self::require_additive(measure)?;
        let code_count = Self::sparse_code_count(matrices, range)?;
        let bound = Self::bind_columns(block, matrices)?;
        Self::check_versions(
            block,
            catalog,
            matrices.keys().chain(std::iter::once(&measure.relation)),
        )?;
        let measure_index = Self::resolve_measure(block, measure)?;
        let table = Self::measure_table(catalog, measure)?;

        let output_count = block.output_count as usize;
        let mut baseline = vec![AdditiveState::default(); output_count];
        let mut buckets =
            vec![vec![AdditiveState::default(); code_count as usize]; output_count];

        for edge in &block.edges {
            let output = Self::check_edge(block, edge)?;

            let mut codes = BTreeSet::new();
            let mut covered = true;
            for (index, matrix) in &bound {
                if let Some(tid) = edge.cells[*index] {
                    match matrix.code(tid) {
                        Some(code) => {
                            codes.insert(code);
                        }
                        None => {
                            self.reject_uncovered(block, *index, tid)?;
                            covered = false;
                        }
                    }
                }
            }
            if !covered {
                continue;
            }

            let value = Self::measure_value(table, measure, edge.cells[measure_index])?;
            baseline[output].add(measure.op, value.as_ref());
            if range {
                // A threshold that removes the lowest bound code
                // removes the edge, so bucket by the minimum
                if let Some(min_code) = codes.iter().next() {
                    buckets[output][*min_code as usize].add(measure.op, value.as_ref());
                }
            } else {
                for code in &codes {
                    buckets[output][*code as usize].add(measure.op, value.as_ref());
                }
            }
        }

        let mut baseline_report = BTreeMap::new();
        let mut per_output = BTreeMap::new();
        for output in 0..output_count {
            baseline_report.insert(output as Tid, baseline[output].finalize(measure.op));
            let mut values = Vec::with_capacity(code_count as usize);
            if range {
                let mut running = AdditiveState::default();
                for code in 0..code_count as usize {
                    running.add_state(&buckets[output][code]);
                    values.push(baseline[output].minus(&running).finalize(measure.op));
                }
            } else {
                for code in 0..code_count as usize {
                    values.push(
                        baseline[output]
                            .minus(&buckets[output][code])
                            .finalize(measure.op),
                    );
                }
            }
            per_output.insert(output as Tid, values);
        }
        Ok(SparseReport {
            code_count,
            baseline: baseline_report,
            per_output,
        })
    }

    fn composed_inner(
        &self,
        block: &LineageBlock,
        catalog: &Catalog,
        measure: &Measure,
        matrices: &BTreeMap<String, ComposedMatrix>,
    ) -> WhatIfResult<ComposedReport> {
        Self::require_additive(measure)?;
        let (partition_count, rank_count) = Self::composed_domain(matrices)?;
        let bound = Self::bind_columns(block, matrices)?;
        Self::check_versions(
            block,
            catalog,
            matrices.keys().chain(std::iter::once(&measure.relation)),
        )?;
        let measure_index = Self::resolve_measure(block, measure)?;
        let table = Self::measure_table(catalog, measure)?;

        let output_count = block.output_count as usize;
        let mut baseline = vec![AdditiveState::default(); output_count];
        let mut buckets: Vec<BTreeMap<u32, Vec<AdditiveState>>> =
            vec![BTreeMap::new(); output_count];

        for edge in &block.edges {
            let output = Self::check_edge(block, edge)?;

            // Partition to lowest bound rank in that partition
            let mut keys: BTreeMap<u32, u32> = BTreeMap::new();
            let mut covered = true;
            for (index, matrix) in &bound {
                if let Some(tid) = edge.cells[*index] {
                    match matrix.entry(tid) {
                        Some((partition, rank)) => {
                            keys.entry(partition)
                                .and_modify(|r| *r = (*r).min(rank))
                                .or_insert(rank);
                        }
                        None => {
                            self.reject_uncovered(block, *index, tid)?;
                            covered = false;
                        }
                    }
                }
            }
            if !covered {
                continue;
            }

            let value = Self::measure_value(table, measure, edge.cells[measure_index])?;
            baseline[output].add(measure.op, value.as_ref());
            for (partition, min_rank) in keys {
                let ranks = buckets[output]
                    .entry(partition)
                    .or_insert_with(|| vec![AdditiveState::default(); rank_count as usize]);
                ranks[min_rank as usize].add(measure.op, value.as_ref());
            }
        }

        let mut baseline_report = BTreeMap::new();
        let mut per_output = BTreeMap::new();
        for output in 0..output_count {
            let base_value = baseline[output].finalize(measure.op);
            baseline_report.insert(output as Tid, base_value.clone());
            let mut partitions = BTreeMap::new();
            for partition in 0..partition_count {
                let mut values = Vec::with_capacity(rank_count as usize);
                match buckets[output].get(&partition) {
                    Some(ranks) => {
                        let mut running = AdditiveState::default();
                        for rank in 0..rank_count as usize {
                            running.add_state(&ranks[rank]);
                            values
                                .push(baseline[output].minus(&running).finalize(measure.op));
                        }
                    }
                    // Nothing bound in this partition; removal is a
                    // no-op at every rank
                    None => {
                        for _ in 0..rank_count {
                            values.push(base_value.clone());
                        }
                    }
                }
                partitions.insert(partition, values);
            }
            per_output.insert(output as Tid, partitions);
        }
        Ok(ComposedReport {
            partition_count,
            rank_count,
            baseline: baseline_report,
            per_output,
        })
    }

    fn bitmask_scenario_count(
        matrices: &BTreeMap<String, BitmaskMatrix>,
    ) -> WhatIfResult<usize> {
        let mut iter = matrices.values();
        let first = iter.next().ok_or_else(Self::no_matrices)?;
        let count = first.scenario_count();
        for matrix in iter {
            if matrix.scenario_count() != count {
                return Err(WhatIfError::ShapeMismatch(format!(
                    "matrices disagree on scenario count ({} vs {})",
                    count,
                    matrix.scenario_count()
                )));
            }
        }
        Ok(count)
    }

    fn sparse_code_count(
        matrices: &BTreeMap<String, SparseMatrix>,
        range: bool,
    ) -> WhatIfResult<u32> {
        let mut count = None;
        for matrix in matrices.values() {
            if range && !matrix.is_ordered() {
                return Err(WhatIfError::ModeUnsupported(
                    "range scenarios need ordered code domains".to_string(),
                ));
            }
            match count {
                None => count = Some(matrix.code_count()),
                Some(c) if c != matrix.code_count() => {
                    return Err(WhatIfError::ShapeMismatch(format!(
                        "matrices disagree on code count ({} vs {})",
                        c,
                        matrix.code_count()
                    )));
                }
                Some(_) => {}
            }
        }
        count.ok_or_else(Self::no_matrices)
    }

    fn composed_domain(
        matrices: &BTreeMap<String, ComposedMatrix>,
    ) -> WhatIfResult<(u32, u32)> {
        let mut domain = None;
        for matrix in matrices.values() {
            let this = (matrix.partition_count(), matrix.rank_count());
            match domain {
                None => domain = Some(this),
                Some(d) if d != this => {
                    return Err(WhatIfError::ShapeMismatch(format!(
                        "matrices disagree on domain ({}x{} vs {}x{})",
                        d.0, d.1, this.0, this.1
                    )));
                }
                Some(_) => {}
            }
        }
        domain.ok_or_else(Self::no_matrices)
    }

    fn no_matrices() -> WhatIfError {
        WhatIfError::MalformedMatrix("request carries no matrices".to_string())
    }

    fn require_additive(measure: &Measure) -> WhatIfResult<()> {
        if measure.op.is_additive() {
            Ok(())
        } else {
            Err(WhatIfError::ModeUnsupported(format!(
                "{} needs the bitmask mode; sparse evaluation is additive only",
                measure.op.as_str()
            )))
        }
    }

    fn bind_columns<'m, M>(
        block: &LineageBlock,
        matrices: &'m BTreeMap<String, M>,
    ) -> WhatIfResult<Vec<(usize, &'m M)>> {
        let mut bound = Vec::new();
        for (relation, matrix) in matrices {
            let indexes = block.column_indexes_for_relation(relation);
            if indexes.is_empty() {
                return Err(WhatIfError::UnknownRelation(format!(
                    "{} is not a source of the block",
                    relation
                )));
            }
            for index in indexes {
                bound.push((index, matrix));
            }
        }
        Ok(bound)
    }

    fn check_versions<'a>(
        block: &LineageBlock,
        catalog: &Catalog,
        relations: impl Iterator<Item = &'a String>,
    ) -> WhatIfResult<()> {
        for relation in relations {
            let table = catalog.table(relation).map_err(|_| {
                WhatIfError::UnknownRelation(format!("{} is not in the catalog", relation))
            })?;
            for index in block.column_indexes_for_relation(relation) {
                let column = &block.columns[index];
                if column.version != table.version() {
                    return Err(BlockError::stale(format!(
                        "{} changed since capture (version {}, now {})",
                        relation,
                        column.version.0,
                        table.version().0
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    fn resolve_measure(block: &LineageBlock, measure: &Measure) -> WhatIfResult<usize> {
        let indexes = block.column_indexes_for_relation(&measure.relation);
        match indexes.len() {
            0 => Err(WhatIfError::MissingMeasure(format!(
                "{} is not a source of the block",
                measure.relation
            ))),
            1 => Ok(indexes[0]),
            n => Err(WhatIfError::ShapeMismatch(format!(
                "{} is bound by {} accesses; the measure needs exactly one",
                measure.relation, n
            ))),
        }
    }

    fn measure_table<'c>(catalog: &'c Catalog, measure: &Measure) -> WhatIfResult<&'c Table> {
        catalog.table(&measure.relation).map_err(|_| {
            WhatIfError::UnknownRelation(format!("{} is not in the catalog", measure.relation))
        })
    }

    fn check_edge(block: &LineageBlock, edge: &LineageEdge) -> WhatIfResult<usize> {
        if edge.output_tid >= block.output_count {
            return Err(BlockError::malformed(format!(
                "edge output tid {} past output count {}",
                edge.output_tid, block.output_count
            ))
            .into());
        }
        if edge.cells.len() != block.columns.len() {
            return Err(BlockError::malformed(format!(
                "edge width {} against {} columns",
                edge.cells.len(),
                block.columns.len()
            ))
            .into());
        }
        Ok(edge.output_tid as usize)
    }

    fn reject_uncovered(&self, block: &LineageBlock, index: usize, tid: Tid) -> WhatIfResult<()> {
        if self.strict {
            return Err(WhatIfError::ShapeMismatch(format!(
                "{} tid {} has no matrix entry",
                block.columns[index].relation, tid
            )));
        }
        Ok(())
    }

    fn measure_value(
        table: &Table,
        measure: &Measure,
        cell: Option<Tid>,
    ) -> WhatIfResult<Option<Value>> {
        let tid = match cell {
            Some(tid) => tid,
            None => return Ok(None),
        };
        let row = table.row(tid).ok_or_else(|| {
            BlockError::malformed(format!(
                "edge references {} tid {} past the table end",
                measure.relation, tid
            ))
        })?;
        Ok(row.get(&measure.column).cloned())
    }

    fn scale_value(value: &Option<Value>, factor: f64) -> Option<Value> {
        value
            .as_ref()
            .and_then(|v| v.as_f64())
            .map(|f| Value::from(f * factor))
    }

    fn feed(acc: &mut Accumulator, op: AggregateOp, value: Option<&Value>) {
        match op {
            AggregateOp::Count => acc.add_row(),
            _ => {
                if let Some(value) = value {
                    if !value.is_null() {
                        acc.add_value(value);
                    }
                }
            }
        }
    }
}

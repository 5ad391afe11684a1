//! Reference plan evaluator
//!
//! Evaluates a plan tree over the catalog, row-at-a-time, and doubles
//! as the live callback point for lineage capture: with a capture
//! context present, every tuple flows paired with its annotation and
//! compaction runs after each wide operator (LINEAGE.md §3-§4).
//!
//! Capture is additive (LINEAGE.md §6, L3): the rows produced are
//! identical with and without a context.

use serde_json::Value;

use crate::annotation::{propagate_group, propagate_join, Annotation};
use crate::identity::Tid;
use crate::plan::{Accumulator, AggregateSpec, JoinKind, JoinOn, PlanNode, PredicateFilter};
use crate::session::CaptureContext;

use super::catalog::Catalog;
use super::errors::{ExecError, ExecResult};
use super::row::{merge_rows, Row};

/// Evaluates plans over one catalog
pub struct Evaluator<'a> {
    catalog: &'a Catalog,
}

/// One in-flight tuple with its annotation
type Tagged = (Row, Annotation);

impl<'a> Evaluator<'a> {
    /// Create an evaluator over a catalog
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Run a plan without capture
    pub fn run(&self, plan: &PlanNode) -> ExecResult<Vec<Row>> {
        let tagged = self.eval(plan, None)?;
        Ok(tagged.into_iter().map(|(row, _)| row).collect())
    }

    /// Run a plan with capture
    ///
    /// Output tids are positional: row i of the result is output tid i
    /// (LINEAGE.md §4).
    pub fn run_captured(
        &self,
        plan: &PlanNode,
        ctx: &mut CaptureContext,
    ) -> ExecResult<Vec<Row>> {
        let tagged = self.eval(plan, Some(ctx))?;
        let mut rows = Vec::with_capacity(tagged.len());
        let mut annotations = Vec::with_capacity(tagged.len());
        for (row, annotation) in tagged {
            rows.push(row);
            annotations.push(annotation);
        }
        ctx.finish_root(annotations);
        Ok(rows)
    }

    fn eval(
        &self,
        node: &PlanNode,
        mut ctx: Option<&mut CaptureContext>,
    ) -> ExecResult<Vec<Tagged>> {
        match node {
            PlanNode::Scan { relation, alias } => {
                self.eval_scan(relation, alias.as_deref(), ctx)
            }
            PlanNode::Filter { predicates, input } => {
                let mut rows = self.eval(input, ctx)?;
                rows.retain(|(row, _)| PredicateFilter::matches(row, predicates));
                Ok(rows)
            }
            PlanNode::Project { columns, input } => {
                let rows = self.eval(input, ctx)?;
                Ok(rows
                    .into_iter()
                    .map(|(row, annotation)| {
                        let projected = columns
                            .iter()
                            .map(|c| {
                                (c.clone(), row.get(c).cloned().unwrap_or(Value::Null))
                            })
                            .collect();
                        (projected, annotation)
                    })
                    .collect())
            }
            PlanNode::Join {
                kind,
                on,
                left,
                right,
            } => self.eval_join(*kind, on, left, right, ctx),
            PlanNode::Aggregate {
                group_by,
                aggregates,
                input,
            } => self.eval_aggregate(group_by, aggregates, input, ctx),
            PlanNode::Distinct { input } => self.eval_distinct(input, ctx),
            PlanNode::Union { inputs } => {
                let mut rows = Vec::new();
                for branch in inputs {
                    rows.extend(self.eval(branch, ctx.as_deref_mut())?);
                }
                Ok(rows)
            }
            PlanNode::Opaque { label, input } => {
                let rows = self.eval(input, ctx.as_deref_mut())?;
                if let Some(ctx) = ctx {
                    ctx.note_unsupported(label);
                }
                Ok(rows
                    .into_iter()
                    .map(|(row, _)| (row, Annotation::Absent))
                    .collect())
            }
        }
    }

    fn eval_scan(
        &self,
        relation: &str,
        alias: Option<&str>,
        ctx: Option<&mut CaptureContext>,
    ) -> ExecResult<Vec<Tagged>> {
        let table = self.catalog.table(relation)?;
        match ctx {
            Some(ctx) if table.is_materialized() => {
                let source = ctx.register_source(relation, alias, table.version());
                Ok(table
                    .rows()
                    .iter()
                    .enumerate()
                    .map(|(tid, row)| (row.clone(), Annotation::scalar(source, tid as Tid)))
                    .collect())
            }
            Some(ctx) => {
                ctx.note_identity_unavailable(relation);
                Ok(table
                    .rows()
                    .iter()
                    .map(|row| (row.clone(), Annotation::Absent))
                    .collect())
            }
            None => Ok(table
                .rows()
                .iter()
                .map(|row| (row.clone(), Annotation::Absent))
                .collect()),
        }
    }

    fn eval_join(
        &self,
        kind: JoinKind,
        on: &JoinOn,
        left: &PlanNode,
        right: &PlanNode,
        mut ctx: Option<&mut CaptureContext>,
    ) -> ExecResult<Vec<Tagged>> {
        let left_rows = self.eval(left, ctx.as_deref_mut())?;
        let right_rows = self.eval(right, ctx.as_deref_mut())?;

        // The compacting op is allocated after both children, so any
        // synthetic handle it stores points at an earlier op.
        let op = match (&mut ctx, kind) {
            (Some(ctx), JoinKind::Inner) => Some(ctx.new_op()),
            _ => None,
        };

        let mut out = Vec::new();
        match kind {
            JoinKind::Inner => {
                for (left_row, left_ann) in &left_rows {
                    for (right_row, right_ann) in &right_rows {
                        if !Self::keys_match(left_row, right_row, on) {
                            continue;
                        }
                        let row = merge_rows(left_row, right_row);
                        let annotation = match (&mut ctx, op) {
                            (Some(ctx), Some(op)) => ctx.compact(
                                op,
                                propagate_join(kind, left_ann.clone(), right_ann.clone()),
                            ),
                            _ => Annotation::Absent,
                        };
                        out.push((row, annotation));
                    }
                }
            }
            JoinKind::Semi => {
                // Presence check: first match wins, one output per probe row
                for (left_row, left_ann) in &left_rows {
                    let found = right_rows
                        .iter()
                        .any(|(right_row, _)| Self::keys_match(left_row, right_row, on));
                    if found {
                        let annotation = match &ctx {
                            Some(_) => propagate_join(
                                kind,
                                left_ann.clone(),
                                Annotation::Absent,
                            ),
                            None => Annotation::Absent,
                        };
                        out.push((left_row.clone(), annotation));
                    }
                }
            }
            JoinKind::Anti => {
                for (left_row, left_ann) in &left_rows {
                    let found = right_rows
                        .iter()
                        .any(|(right_row, _)| Self::keys_match(left_row, right_row, on));
                    if !found {
                        let annotation = match &ctx {
                            Some(_) => propagate_join(
                                kind,
                                left_ann.clone(),
                                Annotation::Absent,
                            ),
                            None => Annotation::Absent,
                        };
                        out.push((left_row.clone(), annotation));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Strict key equality; missing or null keys never join
    fn keys_match(left: &Row, right: &Row, on: &JoinOn) -> bool {
        match (left.get(&on.left), right.get(&on.right)) {
            (Some(l), Some(r)) => !l.is_null() && !r.is_null() && l == r,
            _ => false,
        }
    }

    fn eval_aggregate(
        &self,
        group_by: &[String],
        aggregates: &[AggregateSpec],
        input: &PlanNode,
        mut ctx: Option<&mut CaptureContext>,
    ) -> ExecResult<Vec<Tagged>> {
        struct GroupState {
            key_values: Vec<Value>,
            accumulators: Vec<Accumulator>,
            contributors: Vec<Annotation>,
        }

        let input_rows = self.eval(input, ctx.as_deref_mut())?;
        let op = ctx.as_deref_mut().map(|c| c.new_op());

        let mut groups: std::collections::BTreeMap<String, GroupState> =
            std::collections::BTreeMap::new();

        for (row, annotation) in input_rows {
            let key_values: Vec<Value> = group_by
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            let key = serde_json::to_string(&key_values)
                .map_err(|e| ExecError::failed(format!("group key: {}", e)))?;

            let state = groups.entry(key).or_insert_with(|| GroupState {
                key_values,
                accumulators: vec![Accumulator::new(); aggregates.len()],
                contributors: Vec::new(),
            });

            for (spec, acc) in aggregates.iter().zip(state.accumulators.iter_mut()) {
                match &spec.column {
                    None => acc.add_row(),
                    Some(column) => {
                        if let Some(value) = row.get(column) {
                            if !value.is_null() {
                                acc.add_value(value);
                            }
                        }
                    }
                }
            }
            state.contributors.push(annotation);
        }

        let mut out = Vec::with_capacity(groups.len());
        for state in groups.into_values() {
            let mut row = Row::new();
            for (column, value) in group_by.iter().zip(state.key_values) {
                row.insert(column.clone(), value);
            }
            for (spec, acc) in aggregates.iter().zip(&state.accumulators) {
                row.insert(spec.output.clone(), acc.finalize(spec.op));
            }
            let annotation = match (&mut ctx, op) {
                (Some(ctx), Some(op)) => {
                    ctx.compact(op, propagate_group(state.contributors))
                }
                _ => Annotation::Absent,
            };
            out.push((row, annotation));
        }
        Ok(out)
    }

    fn eval_distinct(
        &self,
        input: &PlanNode,
        mut ctx: Option<&mut CaptureContext>,
    ) -> ExecResult<Vec<Tagged>> {
        let input_rows = self.eval(input, ctx.as_deref_mut())?;
        let op = ctx.as_deref_mut().map(|c| c.new_op());

        // Row serialization is deterministic (BTreeMap keys)
        let mut seen: std::collections::BTreeMap<String, (Row, Vec<Annotation>)> =
            std::collections::BTreeMap::new();
        for (row, annotation) in input_rows {
            let key = serde_json::to_string(&row)
                .map_err(|e| ExecError::failed(format!("distinct key: {}", e)))?;
            seen.entry(key)
                .or_insert_with(|| (row, Vec::new()))
                .1
                .push(annotation);
        }

        let mut out = Vec::with_capacity(seen.len());
        for (row, contributors) in seen.into_values() {
            let annotation = match (&mut ctx, op) {
                (Some(ctx), Some(op)) => {
                    ctx.compact(op, propagate_group(contributors))
                }
                _ => Annotation::Absent,
            };
            out.push((row, annotation));
        }
        Ok(out)
    }
}

//! Block construction from finished capture state
//!
//! Building consumes the capture context, so a block can only exist
//! after the query has fully executed and every side table is final
//! (LINEAGE.md §6, L4). Expansion unfolds synthetic handles back into
//! full source combinations: products cross-multiply cell-wise, sets
//! concatenate (LINEAGE.md §5).

use chrono::Utc;

use crate::annotation::{Annotation, OpId, SyntheticTid};
use crate::compaction::Compactor;
use crate::identity::Tid;
use crate::observability::ObservationScope;
use crate::session::CaptureParts;

use super::block::{BlockColumn, LineageBlock, LineageEdge};
use super::errors::{BlockError, BlockResult};

pub struct BlockBuilder;

impl BlockBuilder {
    /// Build the lineage block for one finished capture
    pub fn build(parts: CaptureParts) -> BlockResult<LineageBlock> {
        let query_id = parts.query_id.0.to_string();
        let scope = ObservationScope::with_fields("BLOCK_BUILD", &[("query_id", &query_id)]);
        match Self::build_inner(parts) {
            Ok(block) => {
                let edges = block.edges.len().to_string();
                scope.complete_with_fields(&[("edges", &edges)]);
                Ok(block)
            }
            Err(err) => {
                scope.fail(err.code().code());
                Err(err)
            }
        }
    }

    fn build_inner(parts: CaptureParts) -> BlockResult<LineageBlock> {
        let CaptureParts {
            query_id,
            identity,
            compactor,
            root,
            diagnostics,
            partial,
        } = parts;

        let (sources, _) = identity.into_parts();
        let columns: Vec<BlockColumn> = sources
            .into_iter()
            .map(|s| BlockColumn {
                relation: s.relation,
                column: s.column,
                version: s.version,
            })
            .collect();
        let width = columns.len();

        let mut edges = Vec::new();
        for (output_tid, annotation) in root.iter().enumerate() {
            let mut visiting = Vec::new();
            for cells in Self::expand(annotation, &compactor, width, &mut visiting)? {
                edges.push(LineageEdge {
                    output_tid: output_tid as Tid,
                    cells,
                });
            }
        }
        edges.sort_by(|a, b| (a.output_tid, &a.cells).cmp(&(b.output_tid, &b.cells)));
        edges.dedup();

        let output_count = root.len() as u64;
        let fingerprint = LineageBlock::compute_fingerprint(&columns, &edges, output_count);

        Ok(LineageBlock {
            query_id,
            created_at: Utc::now(),
            columns,
            edges,
            output_count,
            partial,
            diagnostics,
            fingerprint,
        })
    }

    /// Unfold one annotation into full-width cell combinations
    fn expand(
        annotation: &Annotation,
        compactor: &Compactor,
        width: usize,
        visiting: &mut Vec<(OpId, SyntheticTid)>,
    ) -> BlockResult<Vec<Vec<Option<Tid>>>> {
        match annotation {
            // One combination binding nothing, so sibling slots in a
            // product still come through
            Annotation::Absent => Ok(vec![vec![None; width]]),
            Annotation::Scalar(source_tid) => {
                let index = source_tid.source.index();
                if index >= width {
                    return Err(BlockError::malformed(format!(
                        "source {} outside the {} registered columns",
                        source_tid.source.0, width
                    )));
                }
                let mut cells = vec![None; width];
                cells[index] = Some(source_tid.tid);
                Ok(vec![cells])
            }
            Annotation::Synthetic { op, tid } => {
                let key = (*op, *tid);
                if visiting.contains(&key) {
                    return Err(BlockError::expansion_cycle(format!(
                        "op {} entry {} revisited during expansion",
                        op.0, tid
                    )));
                }
                let inner = compactor.resolve(*op, *tid).ok_or_else(|| {
                    BlockError::malformed(format!(
                        "dangling handle: op {} entry {}",
                        op.0, tid
                    ))
                })?;
                visiting.push(key);
                let combos = Self::expand(&inner, compactor, width, visiting);
                visiting.pop();
                combos
            }
            Annotation::Composite(children) => {
                let mut acc = vec![vec![None; width]];
                for child in children {
                    let expanded = Self::expand(child, compactor, width, visiting)?;
                    let mut next = Vec::with_capacity(acc.len() * expanded.len());
                    for base in &acc {
                        for combo in &expanded {
                            next.push(Self::merge_cells(base, combo)?);
                        }
                    }
                    acc = next;
                }
                Ok(acc)
            }
            Annotation::Set(children) => {
                let mut combos = Vec::new();
                for child in children {
                    combos.extend(Self::expand(child, compactor, width, visiting)?);
                }
                Ok(combos)
            }
        }
    }

    fn merge_cells(a: &[Option<Tid>], b: &[Option<Tid>]) -> BlockResult<Vec<Option<Tid>>> {
        a.iter()
            .zip(b)
            .map(|(left, right)| match (left, right) {
                (Some(l), Some(r)) if l != r => Err(BlockError::malformed(
                    "conflicting bindings for one column in a product",
                )),
                (Some(l), _) => Ok(Some(*l)),
                (_, Some(r)) => Ok(Some(*r)),
                _ => Ok(None),
            })
            .collect()
    }
}

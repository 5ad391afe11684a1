//! The lineage block document
//!
//! One block per captured query: a header of source columns, a bag of
//! edges mapping output tids to source tid combinations, and a content
//! fingerprint. Blocks are immutable once built (LINEAGE.md §5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{TableVersion, Tid};
use crate::session::{CaptureDiagnostic, QueryId};

/// One source access, in registration order
///
/// The column position in the block equals the source id that tagged
/// its rows (LINEAGE.md §2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockColumn {
    /// Base relation the access read
    pub relation: String,
    /// Access name; differs from `relation` under aliases or repeats
    pub column: String,
    /// Relation version at scan time
    pub version: TableVersion,
}

/// One lineage edge: an output row and one full source combination
///
/// `cells` is block-width. `None` marks a column the edge does not
/// bind (untouched branch, presence-check side, or degraded capture).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub output_tid: Tid,
    pub cells: Vec<Option<Tid>>,
}

/// Summary header of a stored block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockMeta {
    pub query_id: QueryId,
    pub created_at: DateTime<Utc>,
    /// Access names of the block's columns, in slot order
    pub sources: Vec<String>,
    pub column_count: usize,
    pub edge_count: usize,
    pub output_count: u64,
    pub partial: bool,
    pub fingerprint: u32,
}

/// The unified lineage block for one captured query
///
/// Edges are sorted by (output_tid, cells) and deduplicated, so equal
/// captures produce byte-equal blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageBlock {
    pub query_id: QueryId,
    pub created_at: DateTime<Utc>,
    pub columns: Vec<BlockColumn>,
    pub edges: Vec<LineageEdge>,
    /// Number of output rows; output tids run 0..output_count
    pub output_count: u64,
    /// True when capture degraded (LINEAGE.md §6, L1 does not hold)
    pub partial: bool,
    pub diagnostics: Vec<CaptureDiagnostic>,
    /// CRC32 over columns, edges, and output count
    pub fingerprint: u32,
}

impl LineageBlock {
    /// Content fingerprint over the parts that define the mapping
    ///
    /// Excludes query id, timestamp, and diagnostics: two captures of
    /// the same query over the same data fingerprint identically.
    pub fn compute_fingerprint(
        columns: &[BlockColumn],
        edges: &[LineageEdge],
        output_count: u64,
    ) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&(columns.len() as u64).to_le_bytes());
        for column in columns {
            hasher.update(&(column.relation.len() as u64).to_le_bytes());
            hasher.update(column.relation.as_bytes());
            hasher.update(&(column.column.len() as u64).to_le_bytes());
            hasher.update(column.column.as_bytes());
            hasher.update(&column.version.0.to_le_bytes());
        }
        hasher.update(&(edges.len() as u64).to_le_bytes());
        for edge in edges {
            hasher.update(&edge.output_tid.to_le_bytes());
            for cell in &edge.cells {
                match cell {
                    None => hasher.update(&[0]),
                    Some(tid) => {
                        hasher.update(&[1]);
                        hasher.update(&tid.to_le_bytes());
                    }
                }
            }
        }
        hasher.update(&output_count.to_le_bytes());
        hasher.finalize()
    }

    /// Recompute and compare the stored fingerprint
    pub fn verify_fingerprint(&self) -> bool {
        Self::compute_fingerprint(&self.columns, &self.edges, self.output_count)
            == self.fingerprint
    }

    /// Column positions whose access reads the given base relation
    ///
    /// A relation scanned more than once occupies several columns.
    pub fn column_indexes_for_relation(&self, relation: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.relation == relation)
            .map(|(i, _)| i)
            .collect()
    }

    /// Edges backing one output row
    pub fn edges_for_output(&self, output_tid: Tid) -> impl Iterator<Item = &LineageEdge> {
        self.edges
            .iter()
            .filter(move |e| e.output_tid == output_tid)
    }

    pub fn meta(&self) -> BlockMeta {
        BlockMeta {
            query_id: self.query_id,
            created_at: self.created_at,
            sources: self.columns.iter().map(|c| c.column.clone()).collect(),
            column_count: self.columns.len(),
            edge_count: self.edges.len(),
            output_count: self.output_count,
            partial: self.partial,
            fingerprint: self.fingerprint,
        }
    }
}

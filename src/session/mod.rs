//! Capture sessions
//!
//! A session owns the capture switch, the query id sequence, the block
//! registry, and the metrics handle. `execute` runs a plan and, when
//! capture is on, builds and stores the lineage block behind the
//! result. A capture that cannot produce a block degrades to a plain
//! result, never to a query error (LINEAGE.md §6, L3).

pub mod context;

pub use context::{CaptureContext, CaptureDiagnostic, CaptureParts, DiagnosticCode};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::{BlockBuilder, BlockRegistry, BlockResult, LineageBlock};
use crate::exec::{Catalog, Evaluator, ExecResult, Row};
use crate::observability::{
    log_event_with_fields, Event, MetricsRegistry, ObservationScope,
};
use crate::plan::PlanNode;

/// Per-session query sequence number
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct QueryId(pub u64);

/// Session configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Whether queries capture lineage; off by default
    pub enabled: bool,
    /// How many blocks the session retains before evicting
    pub retention_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retention_capacity: 16,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.retention_capacity == 0 {
            return Err("retention_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Result of one executed query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub query_id: QueryId,
    /// Row i carries output tid i in the block
    pub rows: Vec<Row>,
    /// False when capture was off or the block could not be built
    pub block_stored: bool,
}

/// One capture session over a catalog
pub struct CaptureSession {
    id: Uuid,
    enabled: AtomicBool,
    next_query: AtomicU64,
    registry: BlockRegistry,
    metrics: Arc<MetricsRegistry>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let session = Self {
            id: Uuid::new_v4(),
            enabled: AtomicBool::new(config.enabled),
            next_query: AtomicU64::new(1),
            registry: BlockRegistry::new(config.retention_capacity, Arc::clone(&metrics)),
            metrics,
        };
        log_event_with_fields(
            Event::SessionOpened,
            &[
                ("capture", if config.enabled { "on" } else { "off" }),
                ("session", &session.id.to_string()),
            ],
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn capture_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn enable_capture(&self) {
        self.enabled.store(true, Ordering::Relaxed);
        log_event_with_fields(Event::CaptureEnabled, &[("session", &self.id.to_string())]);
    }

    pub fn disable_capture(&self) {
        self.enabled.store(false, Ordering::Relaxed);
        log_event_with_fields(Event::CaptureDisabled, &[("session", &self.id.to_string())]);
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Execute a plan, capturing lineage when the session has it on
    pub fn execute(&self, catalog: &Catalog, plan: &PlanNode) -> ExecResult<QueryOutcome> {
        let query_id = QueryId(self.next_query.fetch_add(1, Ordering::Relaxed));
        let evaluator = Evaluator::new(catalog);

        if !self.capture_enabled() {
            let rows = evaluator.run(plan)?;
            return Ok(QueryOutcome {
                query_id,
                rows,
                block_stored: false,
            });
        }

        let query_id_string = query_id.0.to_string();
        let scope = ObservationScope::with_fields("CAPTURE", &[("query_id", &query_id_string)]);
        let mut ctx = CaptureContext::new(query_id);
        let rows = match evaluator.run_captured(plan, &mut ctx) {
            Ok(rows) => rows,
            Err(err) => {
                scope.fail(err.code().code());
                return Err(err);
            }
        };

        for diagnostic in ctx.diagnostics() {
            match diagnostic.code {
                DiagnosticCode::IdentityUnavailable => {
                    self.metrics.increment_identities_unavailable()
                }
                DiagnosticCode::UnsupportedOperator => {
                    self.metrics.increment_operators_skipped()
                }
            }
        }
        let partial = ctx.partial();
        let parts = ctx.into_parts();
        let interned = parts.compactor.interned_total();

        match BlockBuilder::build(parts) {
            Ok(block) => {
                let edge_count = block.edges.len() as u64;
                self.registry.store(block);
                self.metrics.increment_captures_completed();
                if partial {
                    self.metrics.increment_captures_partial();
                }
                self.metrics.add_edges_emitted(edge_count);
                self.metrics.add_synthetics_interned(interned);
                scope.complete_with_fields(&[
                    ("block_stored", "true"),
                    ("edges", &edge_count.to_string()),
                ]);
                Ok(QueryOutcome {
                    query_id,
                    rows,
                    block_stored: true,
                })
            }
            Err(err) => {
                // The block is lost; the query result is not
                self.metrics.increment_capture_failures();
                scope.fail(err.code().code());
                Ok(QueryOutcome {
                    query_id,
                    rows,
                    block_stored: false,
                })
            }
        }
    }

    /// Read the block captured for a query
    pub fn block(&self, query_id: QueryId) -> BlockResult<Arc<LineageBlock>> {
        self.registry.read(query_id)
    }

    /// Read the newest stored block
    pub fn latest_block(&self) -> BlockResult<Arc<LineageBlock>> {
        match self.registry.latest_query_id() {
            Some(query_id) => self.registry.read(query_id),
            None => Err(crate::block::BlockError::stale("no blocks stored")),
        }
    }

    /// Export a stored block as JSON lines at a path
    pub fn export_block(&self, query_id: QueryId, path: &std::path::Path) -> BlockResult<u64> {
        let block = self.registry.read(query_id)?;
        let written = crate::block::export_to_path(&block, path)?;
        self.metrics.increment_blocks_exported();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::AggregateSpec;
    use serde_json::json;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.create_table("orders");
        catalog
            .insert("orders", json!({"id": "o1", "customer": "c1", "value": 10}))
            .unwrap();
        catalog
            .insert("orders", json!({"id": "o2", "customer": "c1", "value": 100}))
            .unwrap();
        catalog
            .insert("orders", json!({"id": "o3", "customer": "c2", "value": 25}))
            .unwrap();
        catalog
    }

    fn capture_config() -> CaptureConfig {
        CaptureConfig {
            enabled: true,
            retention_capacity: 16,
        }
    }

    #[test]
    fn test_capture_off_by_default() {
        let session = CaptureSession::new(CaptureConfig::default());
        assert!(!session.capture_enabled());

        let outcome = session
            .execute(&catalog(), &PlanNode::scan("orders"))
            .unwrap();
        assert_eq!(outcome.rows.len(), 3);
        assert!(!outcome.block_stored);
        assert!(session.registry().is_empty());
    }

    #[test]
    fn test_capture_stores_a_block_per_query() {
        let session = CaptureSession::new(capture_config());
        let catalog = catalog();

        let first = session.execute(&catalog, &PlanNode::scan("orders")).unwrap();
        let second = session
            .execute(
                &catalog,
                &PlanNode::scan("orders").aggregate(
                    &["customer"],
                    vec![AggregateSpec::sum("value", "total")],
                ),
            )
            .unwrap();

        assert!(first.block_stored);
        assert!(second.block_stored);
        assert_eq!(first.query_id, QueryId(1));
        assert_eq!(second.query_id, QueryId(2));

        let block = session.block(second.query_id).unwrap();
        assert_eq!(block.output_count, 2);
        assert_eq!(block.edges.len(), 3);
        assert!(block.verify_fingerprint());
        assert_eq!(session.registry().len(), 2);
    }

    #[test]
    fn test_toggling_capture_takes_effect_per_query() {
        let session = CaptureSession::new(CaptureConfig::default());
        let catalog = catalog();

        session.enable_capture();
        let captured = session.execute(&catalog, &PlanNode::scan("orders")).unwrap();
        session.disable_capture();
        let plain = session.execute(&catalog, &PlanNode::scan("orders")).unwrap();

        assert!(captured.block_stored);
        assert!(!plain.block_stored);
        assert_eq!(captured.rows, plain.rows);
        assert_eq!(session.registry().len(), 1);
    }

    #[test]
    fn test_exec_error_propagates_and_stores_nothing() {
        let session = CaptureSession::new(capture_config());
        let err = session
            .execute(&catalog(), &PlanNode::scan("ghost"))
            .unwrap_err();
        assert_eq!(err.code().code(), "LIN_EXEC_UNKNOWN_RELATION");
        assert!(session.registry().is_empty());
    }

    #[test]
    fn test_degraded_capture_still_stores_partial_block() {
        let session = CaptureSession::new(capture_config());
        let outcome = session
            .execute(&catalog(), &PlanNode::scan("orders").opaque("window"))
            .unwrap();

        assert!(outcome.block_stored);
        let block = session.block(outcome.query_id).unwrap();
        assert!(block.partial);
        assert_eq!(block.diagnostics.len(), 1);

        let snapshot = session.metrics().snapshot();
        assert_eq!(snapshot.captures_completed, 1);
        assert_eq!(snapshot.captures_partial, 1);
        assert_eq!(snapshot.operators_skipped, 1);
    }

    #[test]
    fn test_capture_metrics_accumulate() {
        let session = CaptureSession::new(capture_config());
        let catalog = catalog();
        session.execute(&catalog, &PlanNode::scan("orders")).unwrap();

        let snapshot = session.metrics().snapshot();
        assert_eq!(snapshot.captures_completed, 1);
        assert_eq!(snapshot.edges_emitted, 3);
        assert_eq!(snapshot.blocks_stored, 1);
        assert_eq!(snapshot.blocks_live, 1);
    }

    #[test]
    fn test_latest_block_follows_newest_query() {
        let session = CaptureSession::new(capture_config());
        let catalog = catalog();

        assert!(session.latest_block().is_err());
        session.execute(&catalog, &PlanNode::scan("orders")).unwrap();
        let outcome = session
            .execute(&catalog, &PlanNode::scan("orders").distinct())
            .unwrap();

        let latest = session.latest_block().unwrap();
        assert_eq!(latest.query_id, outcome.query_id);
    }

    #[test]
    fn test_config_validation() {
        assert!(CaptureConfig::default().validate().is_ok());
        let bad = CaptureConfig {
            enabled: true,
            retention_capacity: 0,
        };
        assert!(bad.validate().is_err());
    }
}

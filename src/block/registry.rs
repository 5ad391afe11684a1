//! In-memory block retention
//!
//! Blocks are kept per session, keyed by query id, up to a fixed
//! capacity. Past capacity the oldest block is evicted; a read of an
//! evicted or never-captured query id fails stale (LINEAGE.md §7).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::session::QueryId;

use super::block::{BlockMeta, LineageBlock};
use super::errors::{BlockError, BlockResult};

pub struct BlockRegistry {
    capacity: usize,
    metrics: Arc<MetricsRegistry>,
    blocks: Mutex<BTreeMap<QueryId, Arc<LineageBlock>>>,
}

impl BlockRegistry {
    /// Registry holding at most `capacity` blocks
    pub fn new(capacity: usize, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            // A zero capacity would evict every block at store time
            capacity: capacity.max(1),
            metrics,
            blocks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Store a block, evicting the oldest past capacity
    pub fn store(&self, block: LineageBlock) -> Arc<LineageBlock> {
        let query_id = block.query_id;
        let edge_count = block.edges.len();
        let stored = Arc::new(block);
        let mut blocks = self.blocks.lock().unwrap();
        blocks.insert(query_id, Arc::clone(&stored));
        self.metrics.increment_blocks_stored();
        log_event_with_fields(
            Event::BlockStored,
            &[
                ("edges", &edge_count.to_string()),
                ("query_id", &query_id.0.to_string()),
            ],
        );
        while blocks.len() > self.capacity {
            let oldest = match blocks.keys().next() {
                Some(id) => *id,
                None => break,
            };
            blocks.remove(&oldest);
            self.metrics.increment_blocks_evicted();
            log_event_with_fields(
                Event::BlockEvicted,
                &[("query_id", &oldest.0.to_string())],
            );
        }
        stored
    }

    /// Read a stored block
    pub fn read(&self, query_id: QueryId) -> BlockResult<Arc<LineageBlock>> {
        let blocks = self.blocks.lock().unwrap();
        match blocks.get(&query_id) {
            Some(block) => {
                let block = Arc::clone(block);
                drop(blocks);
                self.metrics.increment_blocks_read();
                log_event_with_fields(
                    Event::BlockRead,
                    &[("query_id", &query_id.0.to_string())],
                );
                Ok(block)
            }
            None => Err(BlockError::stale(format!(
                "query {}: block evicted or never captured",
                query_id.0
            ))),
        }
    }

    /// Header of a stored block without counting a read
    pub fn meta(&self, query_id: QueryId) -> BlockResult<BlockMeta> {
        let blocks = self.blocks.lock().unwrap();
        blocks.get(&query_id).map(|b| b.meta()).ok_or_else(|| {
            BlockError::stale(format!(
                "query {}: block evicted or never captured",
                query_id.0
            ))
        })
    }

    /// Headers of every stored block, oldest query first
    pub fn metas(&self) -> Vec<BlockMeta> {
        let blocks = self.blocks.lock().unwrap();
        blocks.values().map(|b| b.meta()).collect()
    }

    /// Query id of the newest stored block
    pub fn latest_query_id(&self) -> Option<QueryId> {
        let blocks = self.blocks.lock().unwrap();
        blocks.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn block(query_id: u64) -> LineageBlock {
        LineageBlock {
            query_id: QueryId(query_id),
            created_at: Utc::now(),
            columns: Vec::new(),
            edges: Vec::new(),
            output_count: 0,
            partial: false,
            diagnostics: Vec::new(),
            fingerprint: LineageBlock::compute_fingerprint(&[], &[], 0),
        }
    }

    fn registry(capacity: usize) -> BlockRegistry {
        BlockRegistry::new(capacity, Arc::new(MetricsRegistry::new()))
    }

    #[test]
    fn test_store_then_read_round_trips() {
        let registry = registry(4);
        registry.store(block(1));
        let read = registry.read(QueryId(1)).unwrap();
        assert_eq!(read.query_id, QueryId(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_block_reads_stale() {
        let registry = registry(4);
        let err = registry.read(QueryId(9)).unwrap_err();
        assert_eq!(err.code().code(), "LIN_BLOCK_STALE");
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let registry = registry(2);
        registry.store(block(1));
        registry.store(block(2));
        registry.store(block(3));

        assert_eq!(registry.len(), 2);
        assert!(registry.read(QueryId(1)).is_err());
        assert!(registry.read(QueryId(2)).is_ok());
        assert!(registry.read(QueryId(3)).is_ok());
    }

    #[test]
    fn test_eviction_counts_in_metrics() {
        let metrics = Arc::new(MetricsRegistry::new());
        let registry = BlockRegistry::new(1, Arc::clone(&metrics));
        registry.store(block(1));
        registry.store(block(2));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.blocks_stored, 2);
        assert_eq!(snapshot.blocks_evicted, 1);
        assert_eq!(snapshot.blocks_live, 1);
    }

    #[test]
    fn test_latest_query_id_tracks_newest() {
        let registry = registry(4);
        assert_eq!(registry.latest_query_id(), None);
        registry.store(block(3));
        registry.store(block(7));
        assert_eq!(registry.latest_query_id(), Some(QueryId(7)));
    }

    #[test]
    fn test_metas_lists_stored_blocks_oldest_first() {
        let registry = registry(4);
        registry.store(block(2));
        registry.store(block(5));

        let metas = registry.metas();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].query_id, QueryId(2));
        assert_eq!(metas[1].query_id, QueryId(5));
    }

    #[test]
    fn test_meta_does_not_count_a_read() {
        let metrics = Arc::new(MetricsRegistry::new());
        let registry = BlockRegistry::new(4, Arc::clone(&metrics));
        registry.store(block(1));

        let meta = registry.meta(QueryId(1)).unwrap();
        assert_eq!(meta.query_id, QueryId(1));
        assert_eq!(metrics.snapshot().blocks_read, 0);
        assert!(registry.meta(QueryId(2)).is_err());
    }
}

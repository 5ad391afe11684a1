//! Block export
//!
//! Serializes a block as JSON lines, one object per edge, for offline
//! joins against the base tables. Cells appear as `<column>_tid` keys;
//! an unbound cell exports as null. Keys are sorted, so equal blocks
//! export byte-equal streams.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use crate::observability::{log_event_with_fields, Event};

use super::block::LineageBlock;
use super::errors::{BlockError, BlockResult};

/// Write a block's edges to a writer, returning the line count
pub fn export_jsonl<W: Write>(block: &LineageBlock, writer: &mut W) -> BlockResult<u64> {
    let mut written = 0u64;
    for edge in &block.edges {
        let mut object = Map::new();
        object.insert("query_id".to_string(), Value::from(block.query_id.0));
        object.insert("output_tid".to_string(), Value::from(edge.output_tid));
        for (column, cell) in block.columns.iter().zip(&edge.cells) {
            let value = match cell {
                Some(tid) => Value::from(*tid),
                None => Value::Null,
            };
            object.insert(format!("{}_tid", column.column), value);
        }
        writeln!(writer, "{}", Value::Object(object)).map_err(|e| {
            BlockError::export_failed(
                format!("write edge for output {}", edge.output_tid),
                e,
            )
        })?;
        written += 1;
    }
    Ok(written)
}

/// Export a block to a file path
pub fn export_to_path(block: &LineageBlock, path: &Path) -> BlockResult<u64> {
    let file = File::create(path)
        .map_err(|e| BlockError::export_failed(format!("create {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    let written = export_jsonl(block, &mut writer)?;
    writer
        .flush()
        .map_err(|e| BlockError::export_failed(format!("flush {}", path.display()), e))?;
    log_event_with_fields(
        Event::BlockExported,
        &[
            ("edges", &written.to_string()),
            ("path", &path.display().to_string()),
            ("query_id", &block.query_id.0.to_string()),
        ],
    );
    Ok(written)
}

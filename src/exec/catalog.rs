//! In-memory catalog
//!
//! Base tables are append-only row vectors; the row offset is the tid
//! (LINEAGE.md §1). Appends keep existing tids valid; deletes and
//! in-place updates shift offsets, so they bump the table version.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::identity::{TableVersion, Tid};
use crate::plan::{Predicate, PredicateFilter};

use super::errors::{ExecError, ExecResult};
use super::row::{row_from_object, Row};

/// One base table
#[derive(Debug)]
pub struct Table {
    name: String,
    version: TableVersion,
    rows: Vec<Row>,
    materialized: bool,
}

impl Table {
    fn new(name: &str, materialized: bool) -> Self {
        Self {
            name: name.to_string(),
            version: TableVersion::initial(),
            rows: Vec::new(),
            materialized,
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current tid-space version
    pub fn version(&self) -> TableVersion {
        self.version
    }

    /// All rows; the index is the tid
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row by tid
    pub fn row(&self, tid: Tid) -> Option<&Row> {
        self.rows.get(tid as usize)
    }

    /// Row count
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True if rows have stable identity
    ///
    /// Transient tables (views, temporary results) do not; scanning
    /// one degrades lineage instead of failing the query.
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }
}

/// The in-memory table catalog
#[derive(Debug, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a materialized base table
    pub fn create_table(&mut self, name: &str) {
        self.tables
            .insert(name.to_string(), Table::new(name, true));
    }

    /// Create a transient table without stable row identity
    pub fn create_transient(&mut self, name: &str) {
        self.tables
            .insert(name.to_string(), Table::new(name, false));
    }

    /// Append a row, returning its tid
    ///
    /// Appends do not invalidate existing tids, so the version is
    /// unchanged.
    pub fn insert(&mut self, name: &str, value: Value) -> ExecResult<Tid> {
        let row = row_from_object(value)?;
        let table = self.table_mut(name)?;
        let tid = table.rows.len() as Tid;
        table.rows.push(row);
        Ok(tid)
    }

    /// Look up a table
    pub fn table(&self, name: &str) -> ExecResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| ExecError::unknown_relation(name))
    }

    /// Delete all rows matching the predicates (AND semantics)
    ///
    /// Offsets shift, so the version bumps. Returns the removed count.
    pub fn delete_where(&mut self, name: &str, predicates: &[Predicate]) -> ExecResult<usize> {
        let table = self.table_mut(name)?;
        let before = table.rows.len();
        table
            .rows
            .retain(|row| !PredicateFilter::matches(row, predicates));
        let removed = before - table.rows.len();
        if removed > 0 {
            table.version = table.version.next();
        }
        Ok(removed)
    }

    /// Apply an in-place transform to every row
    ///
    /// Always bumps the version: values changed under existing tids.
    pub fn map_rows(&mut self, name: &str, mut f: impl FnMut(&mut Row)) -> ExecResult<()> {
        let table = self.table_mut(name)?;
        for row in &mut table.rows {
            f(row);
        }
        table.version = table.version.next();
        Ok(())
    }

    fn table_mut(&mut self, name: &str) -> ExecResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| ExecError::unknown_relation(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_assigns_offset_tids() {
        let mut catalog = Catalog::new();
        catalog.create_table("orders");

        let a = catalog.insert("orders", json!({"id": "o1"})).unwrap();
        let b = catalog.insert("orders", json!({"id": "o2"})).unwrap();

        assert_eq!((a, b), (0, 1));
        let table = catalog.table("orders").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.row(1).unwrap().get("id"), Some(&json!("o2")));
        assert_eq!(table.version(), TableVersion(0));
    }

    #[test]
    fn test_unknown_relation() {
        let catalog = Catalog::new();
        let err = catalog.table("ghost").unwrap_err();
        assert_eq!(err.code().code(), "LIN_EXEC_UNKNOWN_RELATION");
    }

    #[test]
    fn test_invalid_row_rejected() {
        let mut catalog = Catalog::new();
        catalog.create_table("orders");

        let err = catalog.insert("orders", json!(42)).unwrap_err();
        assert_eq!(err.code().code(), "LIN_EXEC_INVALID_ROW");
    }

    #[test]
    fn test_transient_table_is_not_materialized() {
        let mut catalog = Catalog::new();
        catalog.create_transient("temp_view");

        assert!(!catalog.table("temp_view").unwrap().is_materialized());
    }

    #[test]
    fn test_delete_where_bumps_version() {
        let mut catalog = Catalog::new();
        catalog.create_table("orders");
        catalog
            .insert("orders", json!({"id": "o1", "value": 10}))
            .unwrap();
        catalog
            .insert("orders", json!({"id": "o2", "value": 100}))
            .unwrap();

        let removed = catalog
            .delete_where("orders", &[Predicate::gt("value", json!(50))])
            .unwrap();

        assert_eq!(removed, 1);
        let table = catalog.table("orders").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.version(), TableVersion(1));
    }

    #[test]
    fn test_delete_nothing_keeps_version() {
        let mut catalog = Catalog::new();
        catalog.create_table("orders");
        catalog.insert("orders", json!({"value": 10})).unwrap();

        let removed = catalog
            .delete_where("orders", &[Predicate::gt("value", json!(50))])
            .unwrap();

        assert_eq!(removed, 0);
        assert_eq!(catalog.table("orders").unwrap().version(), TableVersion(0));
    }

    #[test]
    fn test_map_rows_bumps_version() {
        let mut catalog = Catalog::new();
        catalog.create_table("orders");
        catalog.insert("orders", json!({"value": 10})).unwrap();

        catalog
            .map_rows("orders", |row| {
                row.insert("value".to_string(), json!(20));
            })
            .unwrap();

        let table = catalog.table("orders").unwrap();
        assert_eq!(table.row(0).unwrap().get("value"), Some(&json!(20)));
        assert_eq!(table.version(), TableVersion(1));
    }
}

//! Row identity layer
//!
//! Per LINEAGE.md §1:
//! - Every base-table row has a tuple identifier (tid): its physical
//!   row offset within the current table version
//! - Every base-table access in a plan is a distinct source
//! - A source without stable identity reports lineage as unavailable
//!
//! `RowIdentity` is the per-execution registrar of base-table accesses.
//! Source ids are dense and assigned in plan-walk order, so block
//! columns come out in a deterministic order for one plan shape.

use serde::{Deserialize, Serialize};

/// Tuple identifier: the physical row offset within one table version.
pub type Tid = u64;

/// Version of a base table's tid space
///
/// Bumped by the collaborating engine on any mutation or physical
/// compaction. Tids are only comparable within one version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TableVersion(pub u64);

impl TableVersion {
    /// Initial version of a freshly created table
    pub fn initial() -> Self {
        TableVersion(0)
    }

    /// The next version after a mutation
    pub fn next(&self) -> Self {
        TableVersion(self.0 + 1)
    }
}

/// Dense identifier of one base-table access within one query
///
/// Two scans of the same table are two sources and two block columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SourceId(pub u32);

impl SourceId {
    /// Index into per-source parallel structures (block columns, cells)
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One registered base-table access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Dense access id
    pub id: SourceId,
    /// Base relation name
    pub relation: String,
    /// Block column name: the access name, disambiguated on repeats
    pub column: String,
    /// Table version the tids were assigned under
    pub version: TableVersion,
}

/// A scalar lineage tag: one row of one registered access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceTid {
    pub source: SourceId,
    pub tid: Tid,
}

impl SourceTid {
    pub fn new(source: SourceId, tid: Tid) -> Self {
        Self { source, tid }
    }
}

/// Per-execution registrar of base-table accesses
///
/// Accumulates one `SourceDescriptor` per scan in plan-walk order and
/// the list of relations whose identity was unavailable. Consumed by
/// the block builder to lay out block columns.
#[derive(Debug, Default)]
pub struct RowIdentity {
    sources: Vec<SourceDescriptor>,
    unavailable: Vec<String>,
}

impl RowIdentity {
    /// Create an empty registrar
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one base-table access and get its dense source id
    ///
    /// The column name is the alias if given, else the relation name.
    /// Repeated access names get a numeric suffix: `orders`, `orders_2`,
    /// `orders_3`, so every block column name is unique.
    pub fn register_access(
        &mut self,
        relation: &str,
        alias: Option<&str>,
        version: TableVersion,
    ) -> SourceId {
        let base = alias.unwrap_or(relation);
        let column = self.disambiguate(base);
        let id = SourceId(self.sources.len() as u32);
        self.sources.push(SourceDescriptor {
            id,
            relation: relation.to_string(),
            column,
            version,
        });
        id
    }

    fn disambiguate(&self, base: &str) -> String {
        let taken = |name: &str| self.sources.iter().any(|s| s.column == name);
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Record a relation whose rows have no stable identity
    ///
    /// The relation gets no block column; it is reported on the block
    /// instead. Duplicate notes collapse.
    pub fn note_unavailable(&mut self, relation: &str) {
        if !self.unavailable.iter().any(|r| r == relation) {
            self.unavailable.push(relation.to_string());
        }
    }

    /// Descriptor for a registered source
    pub fn source(&self, id: SourceId) -> Option<&SourceDescriptor> {
        self.sources.get(id.index())
    }

    /// All registered sources, in registration order
    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Relations with no stable identity, in first-seen order
    pub fn unavailable(&self) -> &[String] {
        &self.unavailable
    }

    /// Split into sources and unavailable list
    pub fn into_parts(self) -> (Vec<SourceDescriptor>, Vec<String>) {
        (self.sources, self.unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ids_are_dense_and_ordered() {
        let mut identity = RowIdentity::new();
        let a = identity.register_access("customers", None, TableVersion(0));
        let b = identity.register_access("orders", None, TableVersion(0));
        let c = identity.register_access("items", None, TableVersion(3));

        assert_eq!(a, SourceId(0));
        assert_eq!(b, SourceId(1));
        assert_eq!(c, SourceId(2));
        assert_eq!(identity.source_count(), 3);
        assert_eq!(identity.source(b).unwrap().relation, "orders");
        assert_eq!(identity.source(c).unwrap().version, TableVersion(3));
    }

    #[test]
    fn test_repeated_access_gets_suffixed_column() {
        let mut identity = RowIdentity::new();
        identity.register_access("orders", None, TableVersion(0));
        identity.register_access("orders", None, TableVersion(0));
        identity.register_access("orders", None, TableVersion(0));

        let columns: Vec<&str> = identity
            .sources()
            .iter()
            .map(|s| s.column.as_str())
            .collect();
        assert_eq!(columns, vec!["orders", "orders_2", "orders_3"]);
    }

    #[test]
    fn test_alias_names_the_column() {
        let mut identity = RowIdentity::new();
        identity.register_access("orders", Some("recent_orders"), TableVersion(0));

        assert_eq!(identity.sources()[0].column, "recent_orders");
        assert_eq!(identity.sources()[0].relation, "orders");
    }

    #[test]
    fn test_alias_collision_is_disambiguated() {
        let mut identity = RowIdentity::new();
        identity.register_access("orders", Some("o"), TableVersion(0));
        identity.register_access("orders", Some("o"), TableVersion(0));

        let columns: Vec<&str> = identity
            .sources()
            .iter()
            .map(|s| s.column.as_str())
            .collect();
        assert_eq!(columns, vec!["o", "o_2"]);
    }

    #[test]
    fn test_unavailable_relations_collapse() {
        let mut identity = RowIdentity::new();
        identity.note_unavailable("temp_view");
        identity.note_unavailable("temp_view");
        identity.note_unavailable("scratch");

        assert_eq!(identity.unavailable(), &["temp_view", "scratch"]);
        assert_eq!(identity.source_count(), 0);
    }

    #[test]
    fn test_table_version_next() {
        let v = TableVersion::initial();
        assert_eq!(v, TableVersion(0));
        assert_eq!(v.next(), TableVersion(1));
    }

    #[test]
    fn test_source_tid_equality() {
        let a = SourceTid::new(SourceId(0), 5);
        let b = SourceTid::new(SourceId(0), 5);
        let c = SourceTid::new(SourceId(1), 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

//! Plan node tree
//!
//! A plan is a tree (no shared subplans). Construction is by chaining:
//! scans at the leaves, each combinator wrapping its input.

use super::aggregate::AggregateSpec;
use super::predicate::Predicate;

/// Join forms distinguished by annotation propagation
///
/// Inner joins pair both sides; semi and anti joins are presence
/// checks and keep only the probe side (LINEAGE.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Semi,
    Anti,
}

impl JoinKind {
    /// Returns the kind name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Semi => "semi",
            JoinKind::Anti => "anti",
        }
    }
}

/// Equi-join condition: left.column = right.column
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOn {
    pub left: String,
    pub right: String,
}

impl JoinOn {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// A relational operator tree
///
/// The closed vocabulary capture knows how to instrument. Anything
/// the host engine runs that is not in this set maps to `Opaque`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Base-table access; one block column per scan
    Scan {
        relation: String,
        alias: Option<String>,
    },
    /// Row selection; predicates AND together
    Filter {
        predicates: Vec<Predicate>,
        input: Box<PlanNode>,
    },
    /// Column selection; absent columns project as null
    Project {
        columns: Vec<String>,
        input: Box<PlanNode>,
    },
    /// Equi-join of two inputs
    Join {
        kind: JoinKind,
        on: JoinOn,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    /// Grouped aggregation
    Aggregate {
        group_by: Vec<String>,
        aggregates: Vec<AggregateSpec>,
        input: Box<PlanNode>,
    },
    /// Duplicate elimination over whole rows
    Distinct { input: Box<PlanNode> },
    /// Bag union of any number of branches (no deduplication)
    Union { inputs: Vec<PlanNode> },
    /// An operator with no propagation rule; rows pass through
    Opaque {
        label: String,
        input: Box<PlanNode>,
    },
}

impl PlanNode {
    /// Scan a base table
    pub fn scan(relation: impl Into<String>) -> Self {
        PlanNode::Scan {
            relation: relation.into(),
            alias: None,
        }
    }

    /// Scan a base table under an access alias
    pub fn scan_as(relation: impl Into<String>, alias: impl Into<String>) -> Self {
        PlanNode::Scan {
            relation: relation.into(),
            alias: Some(alias.into()),
        }
    }

    /// Wrap in a filter
    pub fn filter(self, predicates: Vec<Predicate>) -> Self {
        PlanNode::Filter {
            predicates,
            input: Box::new(self),
        }
    }

    /// Wrap in a projection
    pub fn project(self, columns: &[&str]) -> Self {
        PlanNode::Project {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            input: Box::new(self),
        }
    }

    /// Join with another plan
    pub fn join(
        self,
        right: PlanNode,
        kind: JoinKind,
        left_col: impl Into<String>,
        right_col: impl Into<String>,
    ) -> Self {
        PlanNode::Join {
            kind,
            on: JoinOn::new(left_col, right_col),
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    /// Wrap in a grouped aggregation
    pub fn aggregate(self, group_by: &[&str], aggregates: Vec<AggregateSpec>) -> Self {
        PlanNode::Aggregate {
            group_by: group_by.iter().map(|c| c.to_string()).collect(),
            aggregates,
            input: Box::new(self),
        }
    }

    /// Wrap in duplicate elimination
    pub fn distinct(self) -> Self {
        PlanNode::Distinct {
            input: Box::new(self),
        }
    }

    /// Bag union of branches
    pub fn union(inputs: Vec<PlanNode>) -> Self {
        PlanNode::Union { inputs }
    }

    /// Wrap in an uninstrumentable operator
    pub fn opaque(self, label: impl Into<String>) -> Self {
        PlanNode::Opaque {
            label: label.into(),
            input: Box::new(self),
        }
    }

    /// Returns the operator kind name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            PlanNode::Scan { .. } => "scan",
            PlanNode::Filter { .. } => "filter",
            PlanNode::Project { .. } => "project",
            PlanNode::Join { .. } => "join",
            PlanNode::Aggregate { .. } => "aggregate",
            PlanNode::Distinct { .. } => "distinct",
            PlanNode::Union { .. } => "union",
            PlanNode::Opaque { .. } => "opaque",
        }
    }

    /// The access name a scan contributes as a block column
    pub fn scan_access_name(&self) -> Option<&str> {
        match self {
            PlanNode::Scan { relation, alias } => {
                Some(alias.as_deref().unwrap_or(relation.as_str()))
            }
            _ => None,
        }
    }
}

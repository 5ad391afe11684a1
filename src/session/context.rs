//! Per-query capture state
//!
//! One `CaptureContext` lives for exactly one captured query. The
//! evaluator drives it: sources at scans, op allocation and compaction
//! at wide operators, root annotations at the end. When the query
//! finishes the context is torn apart by the block builder.
//!
//! Capture degrades instead of failing (LINEAGE.md §6, L3): identity
//! gaps and unsupported operators become diagnostics and a partial
//! flag, never an error on the query path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, OpId};
use crate::compaction::Compactor;
use crate::identity::{RowIdentity, SourceId, TableVersion};
use crate::observability::{log_event_with_fields, Event};

use super::QueryId;

/// Machine-readable diagnostic codes (LINEAGE.md §7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    #[serde(rename = "LIN_IDENTITY_UNAVAILABLE")]
    IdentityUnavailable,
    #[serde(rename = "LIN_UNSUPPORTED_OPERATOR")]
    UnsupportedOperator,
}

impl DiagnosticCode {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticCode::IdentityUnavailable => "LIN_IDENTITY_UNAVAILABLE",
            DiagnosticCode::UnsupportedOperator => "LIN_UNSUPPORTED_OPERATOR",
        }
    }
}

/// One recorded capture degradation, carried onto the block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureDiagnostic {
    pub code: DiagnosticCode,
    pub detail: String,
}

/// Live capture state for one query
#[derive(Debug)]
pub struct CaptureContext {
    query_id: QueryId,
    identity: RowIdentity,
    compactor: Arc<Compactor>,
    root: Vec<Annotation>,
    diagnostics: Vec<CaptureDiagnostic>,
    partial: bool,
}

/// Everything the block builder needs, by value
#[derive(Debug)]
pub struct CaptureParts {
    pub query_id: QueryId,
    pub identity: RowIdentity,
    pub compactor: Arc<Compactor>,
    pub root: Vec<Annotation>,
    pub diagnostics: Vec<CaptureDiagnostic>,
    pub partial: bool,
}

impl CaptureContext {
    /// Fresh context for one query
    pub fn new(query_id: QueryId) -> Self {
        Self {
            query_id,
            identity: RowIdentity::new(),
            compactor: Arc::new(Compactor::new()),
            root: Vec::new(),
            diagnostics: Vec::new(),
            partial: false,
        }
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    /// Register one base-table access as a block column
    pub fn register_source(
        &mut self,
        relation: &str,
        alias: Option<&str>,
        version: TableVersion,
    ) -> SourceId {
        self.identity.register_access(relation, alias, version)
    }

    /// Record that a scanned relation carries no stable row identity
    ///
    /// Repeated notes for the same relation collapse to one diagnostic.
    pub fn note_identity_unavailable(&mut self, relation: &str) {
        if self.identity.unavailable().iter().any(|r| r == relation) {
            return;
        }
        self.identity.note_unavailable(relation);
        self.partial = true;
        self.diagnostics.push(CaptureDiagnostic {
            code: DiagnosticCode::IdentityUnavailable,
            detail: relation.to_string(),
        });
        log_event_with_fields(
            Event::IdentityUnavailable,
            &[
                ("query_id", &self.query_id.0.to_string()),
                ("relation", relation),
            ],
        );
    }

    /// Record an operator with no propagation rule
    pub fn note_unsupported(&mut self, label: &str) {
        self.partial = true;
        self.diagnostics.push(CaptureDiagnostic {
            code: DiagnosticCode::UnsupportedOperator,
            detail: label.to_string(),
        });
        log_event_with_fields(
            Event::OperatorSkipped,
            &[
                ("operator", label),
                ("query_id", &self.query_id.0.to_string()),
            ],
        );
    }

    /// Allocate the next compaction op
    pub fn new_op(&mut self) -> OpId {
        self.compactor.new_op()
    }

    /// Compact an annotation at an op
    pub fn compact(&mut self, op: OpId, annotation: Annotation) -> Annotation {
        self.compactor.compact(op, annotation)
    }

    /// Install the root annotations; row i is output tid i
    pub fn finish_root(&mut self, annotations: Vec<Annotation>) {
        self.root = annotations;
    }

    pub fn root(&self) -> &[Annotation] {
        &self.root
    }

    pub fn identity(&self) -> &RowIdentity {
        &self.identity
    }

    pub fn compactor(&self) -> &Arc<Compactor> {
        &self.compactor
    }

    pub fn partial(&self) -> bool {
        self.partial
    }

    pub fn diagnostics(&self) -> &[CaptureDiagnostic] {
        &self.diagnostics
    }

    /// Tear the context apart for block building
    pub fn into_parts(self) -> CaptureParts {
        CaptureParts {
            query_id: self.query_id,
            identity: self.identity,
            compactor: self.compactor,
            root: self.root,
            diagnostics: self.diagnostics,
            partial: self.partial,
        }
    }
}

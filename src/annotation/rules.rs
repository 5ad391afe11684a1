//! Per-operator propagation rules
//!
//! Per LINEAGE.md §3: a closed dispatch over operator classes. An
//! operator kind outside the table produces `Absent` downstream and
//! flags the capture partial; sibling branches keep capturing.

use crate::plan::{JoinKind, PlanNode};

use super::types::Annotation;

/// Operator classes the propagation rules dispatch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    /// Base-table scan; annotations are created here
    Source,
    /// Filter, project; annotation passes through row-for-row
    OneToOne,
    /// Aggregate, distinct; contributors collapse into a set
    ManyToOneSet,
    /// Join; two inputs pair into a composite
    FanInBinary,
    /// Union; branch rows pass through unchanged
    FanOut,
    /// No propagation rule; lineage becomes absent downstream
    Unsupported,
}

impl OperatorClass {
    /// Classify a plan node
    pub fn classify(node: &PlanNode) -> OperatorClass {
        match node {
            PlanNode::Scan { .. } => OperatorClass::Source,
            PlanNode::Filter { .. } | PlanNode::Project { .. } => OperatorClass::OneToOne,
            PlanNode::Aggregate { .. } | PlanNode::Distinct { .. } => {
                OperatorClass::ManyToOneSet
            }
            PlanNode::Join { .. } => OperatorClass::FanInBinary,
            PlanNode::Union { .. } => OperatorClass::FanOut,
            PlanNode::Opaque { .. } => OperatorClass::Unsupported,
        }
    }

    /// Returns the class name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorClass::Source => "source",
            OperatorClass::OneToOne => "one_to_one",
            OperatorClass::ManyToOneSet => "many_to_one_set",
            OperatorClass::FanInBinary => "fan_in_binary",
            OperatorClass::FanOut => "fan_out",
            OperatorClass::Unsupported => "unsupported",
        }
    }
}

/// Join propagation
///
/// Inner joins pair both sides into a product. Semi and anti joins
/// are presence checks: the probe row survives, the build side binds
/// nothing, and a probe row matching several build rows still emits
/// exactly one annotation (first match).
pub fn propagate_join(kind: JoinKind, probe: Annotation, build: Annotation) -> Annotation {
    match kind {
        JoinKind::Inner => Annotation::composite(probe, build),
        JoinKind::Semi | JoinKind::Anti => probe,
    }
}

/// Group propagation for aggregation and distinct
///
/// All contributors of one group, in input order, duplicates kept.
pub fn propagate_group(contributors: Vec<Annotation>) -> Annotation {
    Annotation::set(contributors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SourceId;
    use crate::plan::{AggregateSpec, Predicate};
    use serde_json::json;

    #[test]
    fn test_classification_covers_every_kind() {
        let scan = PlanNode::scan("t");
        assert_eq!(OperatorClass::classify(&scan), OperatorClass::Source);

        let filter = PlanNode::scan("t").filter(vec![Predicate::eq("a", json!(1))]);
        assert_eq!(OperatorClass::classify(&filter), OperatorClass::OneToOne);

        let project = PlanNode::scan("t").project(&["a"]);
        assert_eq!(OperatorClass::classify(&project), OperatorClass::OneToOne);

        let join = PlanNode::scan("a").join(PlanNode::scan("b"), JoinKind::Inner, "x", "y");
        assert_eq!(OperatorClass::classify(&join), OperatorClass::FanInBinary);

        let agg = PlanNode::scan("t").aggregate(&["g"], vec![AggregateSpec::count_star("n")]);
        assert_eq!(OperatorClass::classify(&agg), OperatorClass::ManyToOneSet);

        let distinct = PlanNode::scan("t").distinct();
        assert_eq!(OperatorClass::classify(&distinct), OperatorClass::ManyToOneSet);

        let union = PlanNode::union(vec![PlanNode::scan("a"), PlanNode::scan("b")]);
        assert_eq!(OperatorClass::classify(&union), OperatorClass::FanOut);

        let opaque = PlanNode::scan("t").opaque("window");
        assert_eq!(OperatorClass::classify(&opaque), OperatorClass::Unsupported);
    }

    #[test]
    fn test_inner_join_pairs_both_sides() {
        let l = Annotation::scalar(SourceId(0), 1);
        let r = Annotation::scalar(SourceId(1), 2);

        let out = propagate_join(JoinKind::Inner, l.clone(), r.clone());
        assert_eq!(out, Annotation::Composite(vec![l, r]));
    }

    #[test]
    fn test_semi_and_anti_keep_probe_only() {
        let probe = Annotation::scalar(SourceId(0), 1);
        let build = Annotation::scalar(SourceId(1), 2);

        let semi = propagate_join(JoinKind::Semi, probe.clone(), build.clone());
        assert_eq!(semi, probe);

        let anti = propagate_join(JoinKind::Anti, probe.clone(), build);
        assert_eq!(anti, probe);
    }

    #[test]
    fn test_group_keeps_order_and_duplicates() {
        let a = Annotation::scalar(SourceId(0), 1);
        let b = Annotation::scalar(SourceId(0), 2);

        let out = propagate_group(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(out, Annotation::Set(vec![a.clone(), b, a]));
    }
}

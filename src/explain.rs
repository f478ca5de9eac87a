//! Human-readable explain trees and deterministic plan hashes.

use std::fmt::Write as _;
use std::hash::Hasher;

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use xxhash_rust::xxh64::Xxh64;

use crate::physical::{LabelRef, PhysicalNode, PhysicalOp, PhysicalPlan};

const REDACTED: &str = "<redacted>";

/// Explain tree of a materialized plan.
#[derive(Clone, Debug)]
pub struct PlanExplain {
    /// Root node of the explain tree.
    pub root: ExplainNode,
    /// Deterministic hash for the plan.
    pub plan_hash: u64,
}

impl PlanExplain {
    /// Builds the explain tree of `plan`, optionally hiding literal-bearing
    /// properties. The hash is computed before redaction.
    pub fn new(plan: &PhysicalPlan, redact_literals: bool) -> Self {
        let root = build_explain_tree(&plan.root, &mut FxHashSet::default());
        let root = if redact_literals {
            root.redacted()
        } else {
            root
        };
        Self {
            root,
            plan_hash: plan_hash(plan),
        }
    }

    /// Indented text rendering, one operator per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "plan_hash: {:016x}", self.plan_hash);
        render_text(&self.root, 0, &mut out);
        out
    }

    /// JSON rendering: `{ "plan_hash": "...", "plan": { "op", "props", "inputs" } }`.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "plan_hash".into(),
            Value::String(format!("{:016x}", self.plan_hash)),
        );
        root.insert("plan".into(), explain_node_to_value(&self.root));
        Value::Object(root)
    }
}

/// Explain node representing an operator with its metadata.
#[derive(Clone, Debug)]
pub struct ExplainNode {
    /// Operator name
    pub op: String,
    /// Additional properties describing the operator
    pub props: Vec<ExplainProp>,
    /// Input operators
    pub inputs: Vec<ExplainNode>,
}

impl ExplainNode {
    /// Creates a new explain node with the given operator name.
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            props: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Value of the first property named `key`.
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    fn redacted(self) -> Self {
        Self {
            op: self.op,
            props: self
                .props
                .into_iter()
                .map(|p| {
                    if p.redactable {
                        ExplainProp::literal(p.key, REDACTED)
                    } else {
                        p
                    }
                })
                .collect(),
            inputs: self.inputs.into_iter().map(ExplainNode::redacted).collect(),
        }
    }
}

/// Single property associated with an [`ExplainNode`].
#[derive(Clone, Debug)]
pub struct ExplainProp {
    /// Property key.
    pub key: String,
    /// Property value serialized for display.
    pub value: String,
    /// Whether this property contains literal data that may be redacted.
    pub redactable: bool,
}

impl ExplainProp {
    fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            redactable: false,
        }
    }

    fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            redactable: true,
        }
    }
}

/// Deterministic xxh64 hash of the operator tree.
///
/// Shared sub-plans contribute once, at their first read.
pub fn plan_hash(plan: &PhysicalPlan) -> u64 {
    let mut hasher = Xxh64::new(0);
    hash_physical_node(&plan.root, &mut hasher, &mut FxHashSet::default());
    hasher.finish()
}

fn hash_physical_node(node: &PhysicalNode, hasher: &mut Xxh64, seen: &mut FxHashSet<usize>) {
    hasher.write(node.op.name().as_bytes());
    for prop in op_props(&node.op) {
        hasher.write(prop.key.as_bytes());
        hasher.write(prop.value.as_bytes());
    }
    hasher.write_u64(node.inputs.len() as u64);
    for child in &node.inputs {
        hash_physical_node(child, hasher, seen);
    }
    if let PhysicalOp::CommonScan { table } = &node.op {
        if seen.insert(table.id) {
            hash_physical_node(&table.plan, hasher, seen);
        }
    }
}

fn build_explain_tree(node: &PhysicalNode, seen: &mut FxHashSet<usize>) -> ExplainNode {
    let mut explain = ExplainNode::new(node.op.name());
    explain.props = op_props(&node.op);
    explain.inputs = node
        .inputs
        .iter()
        .map(|child| build_explain_tree(child, seen))
        .collect();
    if let PhysicalOp::CommonScan { table } = &node.op {
        if seen.insert(table.id) {
            explain.inputs.push(build_explain_tree(&table.plan, seen));
        }
    }
    explain
}

fn op_props(op: &PhysicalOp) -> Vec<ExplainProp> {
    match op {
        PhysicalOp::Scan { labels, alias } => vec![
            ExplainProp::plain("labels", describe_labels(labels)),
            ExplainProp::plain("as", alias.clone()),
        ],
        PhysicalOp::Filter { predicate } => {
            vec![ExplainProp::literal("predicate", predicate.to_string())]
        }
        PhysicalOp::Expand {
            direction,
            labels,
            alias,
            start_alias,
            optional,
            edge_type,
        } => vec![
            ExplainProp::plain("from", start_alias.clone()),
            ExplainProp::plain("dir", direction.to_string()),
            ExplainProp::plain("labels", describe_labels(labels)),
            ExplainProp::plain("as", alias.clone().unwrap_or_else(|| "_".into())),
            ExplainProp::plain("optional", optional.to_string()),
            ExplainProp::plain("type", edge_type.to_string()),
        ],
        PhysicalOp::PathExpand {
            direction,
            labels,
            edge_filter,
            inner_opt,
            inner_labels,
            range,
            result,
            path,
            alias,
            start_alias,
            optional,
            edge_type,
        } => {
            let mut props = vec![
                ExplainProp::plain("from", start_alias.clone()),
                ExplainProp::plain("dir", direction.to_string()),
                ExplainProp::plain("labels", describe_labels(labels)),
                ExplainProp::plain("range", range.to_string()),
                ExplainProp::plain("inner", format!("{inner_opt:?}")),
                ExplainProp::plain("inner_labels", describe_labels(inner_labels)),
                ExplainProp::plain("result", format!("{result:?}")),
                ExplainProp::plain("path", format!("{path:?}")),
                ExplainProp::plain("as", alias.clone().unwrap_or_else(|| "_".into())),
                ExplainProp::plain("optional", optional.to_string()),
                ExplainProp::plain("type", edge_type.to_string()),
            ];
            if let Some(filter) = edge_filter {
                props.push(ExplainProp::literal("edge_predicate", filter.to_string()));
            }
            props
        }
        PhysicalOp::GetVertex { opt, labels, alias } => vec![
            ExplainProp::plain("opt", format!("{opt:?}")),
            ExplainProp::plain("labels", describe_labels(labels)),
            ExplainProp::plain("as", alias.clone()),
        ],
        PhysicalOp::CommonScan { table } => {
            vec![ExplainProp::plain("table", table.id.to_string())]
        }
        PhysicalOp::Join { condition } | PhysicalOp::MultiJoin { condition } => {
            vec![ExplainProp::plain("on", condition.to_string())]
        }
        PhysicalOp::Project { items, append } => vec![
            ExplainProp::literal(
                "items",
                items
                    .iter()
                    .map(|item| format!("{} AS {}", item.expr, item.alias))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            ExplainProp::plain("append", append.to_string()),
        ],
    }
}

fn describe_labels(labels: &[LabelRef]) -> String {
    if labels.is_empty() {
        return "*".into();
    }
    labels
        .iter()
        .map(|l| l.name.as_str())
        .collect::<Vec<_>>()
        .join("|")
}

fn render_text(node: &ExplainNode, depth: usize, out: &mut String) {
    let props = node
        .props
        .iter()
        .map(|p| format!("{}={}", p.key, p.value))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "{:indent$}{} [{}]", "", node.op, props, indent = depth * 2);
    for input in &node.inputs {
        render_text(input, depth + 1, out);
    }
}

fn explain_node_to_value(node: &ExplainNode) -> Value {
    let mut map = Map::new();
    map.insert("op".into(), Value::String(node.op.clone()));
    if !node.props.is_empty() {
        let mut props = Map::new();
        for prop in &node.props {
            props.insert(prop.key.clone(), Value::String(prop.value.clone()));
        }
        map.insert("props".into(), Value::Object(props));
    }
    let inputs = node
        .inputs
        .iter()
        .map(explain_node_to_value)
        .collect::<Vec<_>>();
    map.insert("inputs".into(), Value::Array(inputs));
    Value::Object(map)
}

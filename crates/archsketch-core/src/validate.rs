use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::{DiagramSpecification, NodeTypeSet, MAX_NODE_NAME_CHARS};

/// Which rule a rejected specification broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Not syntactically valid JSON.
    MalformedInput,
    /// Valid JSON, wrong shape (missing field, wrong type, empty node list).
    SchemaViolation,
    /// A node type outside the configured list.
    UnsupportedNodeType,
    /// Two or more nodes share a name.
    DuplicateNodeName,
    /// A connection or cluster names a node that does not exist.
    DanglingReference,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedInput => "MalformedInput",
            ErrorKind::SchemaViolation => "SchemaViolation",
            ErrorKind::UnsupportedNodeType => "UnsupportedNodeType",
            ErrorKind::DuplicateNodeName => "DuplicateNodeName",
            ErrorKind::DanglingReference => "DanglingReference",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ValidationFailure {
    fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(DiagramSpecification),
    Invalid(ValidationFailure),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    pub fn into_result(self) -> Result<DiagramSpecification, ValidationFailure> {
        match self {
            ValidationOutcome::Valid(spec) => Ok(spec),
            ValidationOutcome::Invalid(failure) => Err(failure),
        }
    }
}

/// Validate raw model output against the specification shape and its
/// referential rules.
///
/// Rules run in a fixed order (JSON syntax, shape, node types, unique names,
/// connection references, cluster references) and the first failing rule
/// wins. Within that rule every offending item is reported, so the detail
/// gives the repair prompt the whole picture at once.
pub fn validate(raw: &str, supported: &NodeTypeSet) -> ValidationOutcome {
    tracing::debug!(input_len = raw.len(), "validating specification");

    match check(raw, supported) {
        Ok(spec) => {
            tracing::debug!(
                node_count = spec.nodes.len(),
                connection_count = spec.connections.len(),
                cluster_count = spec.clusters.len(),
                "specification valid"
            );
            ValidationOutcome::Valid(spec)
        }
        Err(failure) => {
            tracing::warn!(kind = %failure.kind, detail = %failure.detail, "specification rejected");
            ValidationOutcome::Invalid(failure)
        }
    }
}

fn check(raw: &str, supported: &NodeTypeSet) -> Result<DiagramSpecification, ValidationFailure> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ValidationFailure::new(ErrorKind::MalformedInput, format!("Invalid JSON: {e}")))?;

    let violations = shape_violations(&value);
    if !violations.is_empty() {
        return Err(ValidationFailure::new(
            ErrorKind::SchemaViolation,
            format!("Invalid structure: {}", violations.join("; ")),
        ));
    }

    let mut spec: DiagramSpecification = serde_json::from_value(value).map_err(|e| {
        ValidationFailure::new(ErrorKind::SchemaViolation, format!("Invalid structure: {e}"))
    })?;
    for node in &mut spec.nodes {
        let trimmed = node.name.trim();
        if trimmed.len() != node.name.len() {
            node.name = trimmed.to_string();
        }
    }

    check_node_types(&spec, supported)?;
    check_unique_names(&spec)?;
    let names: HashSet<&str> = spec.nodes.iter().map(|n| n.name.as_str()).collect();
    check_connections(&spec, &names)?;
    check_clusters(&spec, &names)?;

    Ok(spec)
}

// --- Rule 2: shape ---

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(path: &str, what: &str, found: &Value) -> String {
    format!("{path}: expected {what}, found {}", type_name(found))
}

fn required_string<'a>(
    obj: &'a Map<String, Value>,
    path: &str,
    field: &str,
    out: &mut Vec<String>,
) -> Option<&'a str> {
    match obj.get(field) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            out.push(expected(&format!("{path}.{field}"), "string", other));
            None
        }
        None => {
            out.push(format!("{path}.{field}: field required (expected string)"));
            None
        }
    }
}

fn shape_violations(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let Some(root) = value.as_object() else {
        out.push(expected("(root)", "object", value));
        return out;
    };

    match root.get("nodes") {
        Some(Value::Array(nodes)) => {
            if nodes.is_empty() {
                out.push("nodes: expected at least one node".to_string());
            }
            for (i, node) in nodes.iter().enumerate() {
                check_node_shape(&format!("nodes[{i}]"), node, &mut out);
            }
        }
        Some(other) => out.push(expected("nodes", "array", other)),
        None => out.push("nodes: field required (expected non-empty array)".to_string()),
    }

    match root.get("connections") {
        Some(Value::Array(conns)) => {
            for (i, conn) in conns.iter().enumerate() {
                check_connection_shape(&format!("connections[{i}]"), conn, &mut out);
            }
        }
        Some(other) => out.push(expected("connections", "array", other)),
        None => {}
    }

    match root.get("clusters") {
        Some(Value::Array(clusters)) => {
            for (i, cluster) in clusters.iter().enumerate() {
                check_cluster_shape(&format!("clusters[{i}]"), cluster, &mut out);
            }
        }
        Some(other) => out.push(expected("clusters", "array", other)),
        None => {}
    }

    out
}

fn check_node_shape(path: &str, node: &Value, out: &mut Vec<String>) {
    let Some(obj) = node.as_object() else {
        out.push(expected(path, "object", node));
        return;
    };
    required_string(obj, path, "type", out);
    if let Some(name) = required_string(obj, path, "name", out) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            out.push(format!("{path}.name: must not be empty"));
        } else if trimmed.chars().count() > MAX_NODE_NAME_CHARS {
            out.push(format!(
                "{path}.name: too long (max {MAX_NODE_NAME_CHARS} characters)"
            ));
        }
    }
    if let Some(props) = obj.get("properties") {
        if !props.is_object() {
            out.push(expected(&format!("{path}.properties"), "object", props));
        }
    }
}

fn check_connection_shape(path: &str, conn: &Value, out: &mut Vec<String>) {
    let Some(obj) = conn.as_object() else {
        out.push(expected(path, "object", conn));
        return;
    };
    required_string(obj, path, "from", out);
    required_string(obj, path, "to", out);
    match obj.get("label") {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(other) => out.push(expected(&format!("{path}.label"), "string or null", other)),
    }
}

fn check_cluster_shape(path: &str, cluster: &Value, out: &mut Vec<String>) {
    let Some(obj) = cluster.as_object() else {
        out.push(expected(path, "object", cluster));
        return;
    };
    required_string(obj, path, "name", out);
    match obj.get("nodes") {
        Some(Value::Array(members)) => {
            if members.is_empty() {
                out.push(format!("{path}.nodes: expected at least one node name"));
            }
            for (i, member) in members.iter().enumerate() {
                if !member.is_string() {
                    out.push(expected(&format!("{path}.nodes[{i}]"), "string", member));
                }
            }
        }
        Some(other) => out.push(expected(&format!("{path}.nodes"), "array of strings", other)),
        None => out.push(format!("{path}.nodes: field required (expected array of strings)")),
    }
}

// --- Rules 3-6 ---

fn check_node_types(spec: &DiagramSpecification, supported: &NodeTypeSet) -> Result<(), ValidationFailure> {
    // type -> node names using it, in first-appearance order
    let mut offenders: Vec<(&str, Vec<&str>)> = Vec::new();
    for node in &spec.nodes {
        if supported.contains(&node.node_type) {
            continue;
        }
        match offenders.iter_mut().find(|(t, _)| *t == node.node_type) {
            Some((_, users)) => users.push(node.name.as_str()),
            None => offenders.push((node.node_type.as_str(), vec![node.name.as_str()])),
        }
    }
    if offenders.is_empty() {
        return Ok(());
    }

    let listed: Vec<String> = offenders
        .iter()
        .map(|(t, users)| format!("'{t}' (used by {})", quote_all(users)))
        .collect();
    Err(ValidationFailure::new(
        ErrorKind::UnsupportedNodeType,
        format!(
            "Unsupported node types: {}. Supported types: {supported}",
            listed.join(", ")
        ),
    ))
}

fn check_unique_names(spec: &DiagramSpecification) -> Result<(), ValidationFailure> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for node in &spec.nodes {
        let count = counts.entry(node.name.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(node.name.as_str());
        }
    }
    if order.is_empty() {
        return Ok(());
    }

    let listed: Vec<String> = order
        .iter()
        .map(|name| format!("'{name}' ({} times)", counts[name]))
        .collect();
    Err(ValidationFailure::new(
        ErrorKind::DuplicateNodeName,
        format!("Duplicate node names: {}", listed.join(", ")),
    ))
}

fn check_connections(spec: &DiagramSpecification, names: &HashSet<&str>) -> Result<(), ValidationFailure> {
    let mut dangling = Vec::new();
    for (i, conn) in spec.connections.iter().enumerate() {
        for end in [&conn.from, &conn.to] {
            if !names.contains(end.as_str()) {
                dangling.push(format!(
                    "connections[{i}] ({} -> {}) references unknown node '{end}'",
                    conn.from, conn.to
                ));
            }
        }
    }
    dangling_result(dangling)
}

fn check_clusters(spec: &DiagramSpecification, names: &HashSet<&str>) -> Result<(), ValidationFailure> {
    let mut dangling = Vec::new();
    for (i, cluster) in spec.clusters.iter().enumerate() {
        for member in &cluster.nodes {
            if !names.contains(member.as_str()) {
                dangling.push(format!(
                    "clusters[{i}] '{}' references unknown node '{member}'",
                    cluster.name
                ));
            }
        }
    }
    dangling_result(dangling)
}

fn dangling_result(dangling: Vec<String>) -> Result<(), ValidationFailure> {
    if dangling.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure::new(
            ErrorKind::DanglingReference,
            format!("Dangling references: {}", dangling.join("; ")),
        ))
    }
}

fn quote_all(items: &[&str]) -> String {
    items
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

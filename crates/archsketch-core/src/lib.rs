pub mod builder;
pub mod repair;
pub mod rules;
pub mod settings;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use builder::{BuildError, DiagramBuilder, Direction, ImageFormat};
pub use repair::{drawing_warnings, review, suggest_fix, ValidationReport};
pub use settings::{Settings, SettingsError};
pub use validate::{validate, ErrorKind, ValidationFailure, ValidationOutcome};

/// Longest node name accepted, counted in characters after trimming.
pub const MAX_NODE_NAME_CHARS: usize = 50;

// --- Types ---

/// A single component in the diagram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct NodeSpec {
    /// Node type, e.g. "EC2", "RDS", "LoadBalancer"
    #[serde(rename = "type")]
    pub node_type: String,
    /// Unique display name (trimmed, at most 50 characters)
    pub name: String,
    /// Free-form key/value properties. Never inspected beyond being an object.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// A directed edge between two nodes, referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct ConnectionSpec {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A named group of nodes drawn inside one box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct ClusterSpec {
    pub name: String,
    /// Member node names, in order. Must not be empty.
    pub nodes: Vec<String>,
}

/// A complete diagram: nodes, the connections between them and optional clusters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct DiagramSpecification {
    /// At least one node is required
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
}

impl DiagramSpecification {
    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// JSON Schema of [`DiagramSpecification`], pretty-printed.
pub fn specification_schema() -> String {
    let schema = schemars::schema_for!(DiagramSpecification);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|e| format!("schema error: {e}"))
}

// --- Node kinds ---

/// Node kinds the renderer knows how to draw.
///
/// The validator does not consult this enum: it checks node types against the
/// configured [`NodeTypeSet`], so a deployment can narrow the accepted types
/// without touching validation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "EC2")]
    Ec2,
    #[serde(rename = "RDS")]
    Rds,
    LoadBalancer,
    #[serde(rename = "SQS")]
    Sqs,
    Lambda,
    S3,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Ec2,
        NodeKind::Rds,
        NodeKind::LoadBalancer,
        NodeKind::Sqs,
        NodeKind::Lambda,
        NodeKind::S3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Ec2 => "EC2",
            NodeKind::Rds => "RDS",
            NodeKind::LoadBalancer => "LoadBalancer",
            NodeKind::Sqs => "SQS",
            NodeKind::Lambda => "Lambda",
            NodeKind::S3 => "S3",
        }
    }

    /// What the node stands for, in a sentence.
    pub fn description(&self) -> &'static str {
        match self {
            NodeKind::Ec2 => "A virtual machine, e.g. a web or application server.",
            NodeKind::Rds => "A managed relational database.",
            NodeKind::LoadBalancer => "Spreads incoming traffic across the nodes it connects to.",
            NodeKind::Sqs => "A message queue between producers and consumers.",
            NodeKind::Lambda => "A serverless function run on demand.",
            NodeKind::S3 => "Object storage, e.g. uploads, static assets or backups.",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    /// Exact, case-sensitive match on the wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown node kind: {s}"))
    }
}

/// Ordered, case-sensitive list of node type names accepted by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeTypeSet(Vec<String>);

impl NodeTypeSet {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for t in types {
            let t = t.into();
            if !out.contains(&t) {
                out.push(t);
            }
        }
        Self(out)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.0.iter().any(|t| t == node_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for NodeTypeSet {
    fn default() -> Self {
        Self::new(NodeKind::ALL.iter().map(|k| k.as_str()))
    }
}

/// Comma-separated, in configured order.
impl fmt::Display for NodeTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

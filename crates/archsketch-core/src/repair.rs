use serde::Serialize;
use std::collections::HashMap;

use crate::validate::{validate, ErrorKind, ValidationFailure, ValidationOutcome};
use crate::{DiagramSpecification, NodeKind, NodeTypeSet};

const GENERIC_SUGGESTION: &str = "Check the specification structure matches the expected format. \
Ensure all required fields are present: every node needs a string \"type\" and \"name\", every \
connection a \"from\" and \"to\", every cluster a \"name\" and a non-empty \"nodes\" list";

/// Turn a validation failure into instructions for the next model prompt.
///
/// Depends only on the failure kind and detail (plus the configured node
/// types, which the unsupported-type template quotes). A blank detail means
/// the failure carries nothing to act on and yields the generic suggestion.
pub fn suggest_fix(failure: &ValidationFailure, original_text: &str, supported: &NodeTypeSet) -> String {
    if failure.detail.trim().is_empty() {
        return GENERIC_SUGGESTION.to_string();
    }

    match failure.kind {
        ErrorKind::MalformedInput => {
            let mut out = String::from(
                "Ensure the response is valid JSON format. Check for missing commas, quotes, or brackets",
            );
            if original_text.contains("```") {
                out.push_str(". Do not wrap the JSON in Markdown code fences");
            } else if !original_text.trim_start().starts_with('{') {
                out.push_str(". Respond with the JSON object only, without any explanation around it");
            }
            out
        }
        ErrorKind::SchemaViolation => GENERIC_SUGGESTION.to_string(),
        ErrorKind::UnsupportedNodeType => format!(
            "Use only these node types: {supported}. Check spelling and capitalization of node types"
        ),
        ErrorKind::DuplicateNodeName => "Each node must have a unique name. \
Consider adding numbers or descriptive suffixes to duplicate names"
            .to_string(),
        ErrorKind::DanglingReference => "Ensure all nodes are defined before being referenced in \
connections or clusters. Check spelling of node names in connections and clusters matches node \
definitions exactly, including capitalization"
            .to_string(),
    }
}

/// Result of checking a user-supplied specification outside the generation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
    /// Reasons a valid specification may still fail to render.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Renderer preconditions that validation does not enforce: node types with
/// no drawing, and nodes listed in more than one cluster.
pub fn drawing_warnings(spec: &DiagramSpecification) -> Vec<String> {
    let mut out = Vec::new();

    let mut undrawable: Vec<&str> = Vec::new();
    for node in &spec.nodes {
        if node.node_type.parse::<NodeKind>().is_err() && !undrawable.contains(&node.node_type.as_str()) {
            undrawable.push(node.node_type.as_str());
        }
    }
    for node_type in undrawable {
        out.push(format!("node type '{node_type}' is accepted but has no drawing"));
    }

    // member -> index of the first cluster listing it
    let mut owner: HashMap<&str, usize> = HashMap::new();
    let mut reported: Vec<&str> = Vec::new();
    for (ci, cluster) in spec.clusters.iter().enumerate() {
        for member in &cluster.nodes {
            match owner.get(member.as_str()) {
                Some(&first) if first != ci && !reported.contains(&member.as_str()) => {
                    reported.push(member.as_str());
                    out.push(format!(
                        "node '{member}' is listed in both cluster '{}' and cluster '{}'; a node can be drawn in one cluster only",
                        spec.clusters[first].name, cluster.name
                    ));
                }
                Some(_) => {}
                None => {
                    owner.insert(member.as_str(), ci);
                }
            }
        }
    }

    out
}

/// Validate `text` and attach repair suggestions when it is rejected.
pub fn review(text: &str, supported: &NodeTypeSet) -> ValidationReport {
    match validate(text, supported) {
        ValidationOutcome::Valid(spec) => ValidationReport {
            valid: true,
            error_kind: None,
            error: None,
            suggestions: None,
            warnings: drawing_warnings(&spec),
        },
        ValidationOutcome::Invalid(failure) => ValidationReport {
            valid: false,
            error_kind: Some(failure.kind),
            suggestions: Some(suggest_fix(&failure, text, supported)),
            error: Some(failure.detail),
            warnings: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: ErrorKind, detail: &str) -> ValidationFailure {
        ValidationFailure {
            kind,
            detail: detail.to_string(),
        }
    }

    #[test]
    fn unsupported_types_quote_the_configured_list() {
        let supported = NodeTypeSet::new(["EC2", "S3"]);
        let out = suggest_fix(
            &failure(ErrorKind::UnsupportedNodeType, "Unsupported node types: 'VM'"),
            "{}",
            &supported,
        );
        assert!(out.starts_with("Use only these node types: EC2, S3"));
    }

    #[test]
    fn dangling_reference_asks_for_definitions() {
        let out = suggest_fix(
            &failure(ErrorKind::DanglingReference, "unknown node 'B'"),
            "{}",
            &NodeTypeSet::default(),
        );
        assert!(out.contains("defined before being referenced"));
        assert!(out.contains("spelling"));
    }

    #[test]
    fn malformed_input_mentions_fences_when_present() {
        let out = suggest_fix(
            &failure(ErrorKind::MalformedInput, "Invalid JSON: EOF"),
            "```json\n{\"nodes\": [\n```",
            &NodeTypeSet::default(),
        );
        assert!(out.contains("valid JSON"));
        assert!(out.contains("code fences"));
    }

    #[test]
    fn schema_violation_gets_the_generic_suggestion() {
        let out = suggest_fix(
            &failure(ErrorKind::SchemaViolation, "nodes: expected array"),
            "{}",
            &NodeTypeSet::default(),
        );
        assert_eq!(out, GENERIC_SUGGESTION);
    }

    #[test]
    fn blank_detail_falls_back_to_generic() {
        for kind in [
            ErrorKind::MalformedInput,
            ErrorKind::UnsupportedNodeType,
            ErrorKind::DuplicateNodeName,
            ErrorKind::DanglingReference,
        ] {
            assert_eq!(
                suggest_fix(&failure(kind, "  \n"), "", &NodeTypeSet::default()),
                GENERIC_SUGGESTION
            );
        }
    }

    #[test]
    fn review_reports_valid_specifications() {
        let report = review(r#"{"nodes":[{"type":"EC2","name":"WebServer"}]}"#, &NodeTypeSet::default());
        assert!(report.valid);
        assert_eq!(report.error, None);
        assert_eq!(report.suggestions, None);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn review_warns_about_overlapping_clusters() {
        let report = review(
            r#"{"nodes":[{"type":"EC2","name":"A"},{"type":"EC2","name":"B"}],
               "clusters":[{"name":"X","nodes":["A","B"]},{"name":"Y","nodes":["A"]},{"name":"Z","nodes":["A"]}]}"#,
            &NodeTypeSet::default(),
        );
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("node 'A'"));
        assert!(report.warnings[0].contains("'X' and cluster 'Y'"));
    }

    #[test]
    fn review_warns_about_types_without_a_drawing() {
        let report = review(
            r#"{"nodes":[{"type":"Queue","name":"A"},{"type":"Queue","name":"B"},{"type":"S3","name":"C"}]}"#,
            &NodeTypeSet::new(["Queue", "S3"]),
        );
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["node type 'Queue' is accepted but has no drawing".to_string()]);
    }

    #[test]
    fn repeated_member_within_one_cluster_is_not_a_warning() {
        let report = review(
            r#"{"nodes":[{"type":"EC2","name":"A"}],"clusters":[{"name":"X","nodes":["A","A"]}]}"#,
            &NodeTypeSet::default(),
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn review_attaches_suggestions_to_failures() {
        let report = review(
            r#"{"nodes":[{"type":"EC2","name":"A"},{"type":"EC2","name":"A"}]}"#,
            &NodeTypeSet::default(),
        );
        assert!(!report.valid);
        assert_eq!(report.error_kind, Some(ErrorKind::DuplicateNodeName));
        assert!(report.error.unwrap().contains("'A'"));
        assert!(report.suggestions.unwrap().contains("unique name"));
    }
}

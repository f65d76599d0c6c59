use std::collections::HashMap;
use std::fmt::Write;

use archsketch_core::{BuildError, DiagramSpecification, Direction, NodeKind, NodeSpec};

struct Style {
    shape: &'static str,
    fill: &'static str,
    caption: &'static str,
}

fn style(kind: NodeKind) -> Style {
    match kind {
        NodeKind::Ec2 => Style {
            shape: "box3d",
            fill: "#F58536",
            caption: "EC2 instance",
        },
        NodeKind::Rds => Style {
            shape: "cylinder",
            fill: "#527FFF",
            caption: "RDS database",
        },
        NodeKind::LoadBalancer => Style {
            shape: "hexagon",
            fill: "#8C4FFF",
            caption: "Load balancer",
        },
        NodeKind::Sqs => Style {
            shape: "cds",
            fill: "#E7157B",
            caption: "SQS queue",
        },
        NodeKind::Lambda => Style {
            shape: "component",
            fill: "#ED7100",
            caption: "Lambda function",
        },
        NodeKind::S3 => Style {
            shape: "folder",
            fill: "#7AA116",
            caption: "S3 bucket",
        },
    }
}

/// Quote `text` as a DOT string literal.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn node_line(out: &mut String, indent: &str, id: &str, node: &NodeSpec, kind: NodeKind) {
    let s = style(kind);
    let label = format!("{}\n{}", node.name, s.caption);
    let _ = writeln!(
        out,
        "{indent}{id} [label={}, shape={}, fillcolor={}];",
        quote(&label),
        s.shape,
        quote(s.fill)
    );
}

/// Render a validated specification as a Graphviz `digraph`.
///
/// Nodes get stable ids (`n0`, `n1`, ...) in declaration order so arbitrary
/// names never leak into DOT syntax. Each cluster becomes a
/// `subgraph cluster_<i>`; a node may belong to at most one.
pub fn render_dot(spec: &DiagramSpecification, title: &str, direction: Direction) -> Result<String, BuildError> {
    let mut kinds = Vec::with_capacity(spec.nodes.len());
    let mut ids: HashMap<&str, String> = HashMap::with_capacity(spec.nodes.len());
    for (i, node) in spec.nodes.iter().enumerate() {
        let kind: NodeKind = node.node_type.parse().map_err(|_| BuildError::UnsupportedNodeKind {
            node: node.name.clone(),
            node_type: node.node_type.clone(),
        })?;
        kinds.push(kind);
        ids.insert(node.name.as_str(), format!("n{i}"));
    }

    // node name -> index of the cluster that owns it
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (ci, cluster) in spec.clusters.iter().enumerate() {
        for member in &cluster.nodes {
            if !ids.contains_key(member.as_str()) {
                return Err(BuildError::UnknownNode(member.clone()));
            }
            if let Some(&prev) = owner.get(member.as_str()) {
                if prev != ci {
                    return Err(BuildError::OverlappingClusters {
                        node: member.clone(),
                        first: spec.clusters[prev].name.clone(),
                        second: cluster.name.clone(),
                    });
                }
            }
            owner.insert(member.as_str(), ci);
        }
    }

    let mut out = String::with_capacity(256 + spec.nodes.len() * 96);
    out.push_str("digraph architecture {\n");
    let _ = writeln!(out, "    label={};", quote(title));
    out.push_str("    labelloc=t;\n    fontname=\"Helvetica\";\n    fontsize=16;\n");
    let _ = writeln!(out, "    rankdir={};", direction.as_str());
    out.push_str("    node [style=\"filled,rounded\", fontname=\"Helvetica\", fontcolor=white];\n");
    out.push_str("    edge [fontname=\"Helvetica\", fontsize=10];\n");

    for (ci, cluster) in spec.clusters.iter().enumerate() {
        let _ = writeln!(out, "\n    subgraph cluster_{ci} {{");
        let _ = writeln!(out, "        label={};", quote(&cluster.name));
        out.push_str("        style=dashed;\n        color=\"#7D8998\";\n");
        for (i, node) in spec.nodes.iter().enumerate() {
            if owner.get(node.name.as_str()) == Some(&ci) {
                node_line(&mut out, "        ", &ids[node.name.as_str()], node, kinds[i]);
            }
        }
        out.push_str("    }\n");
    }

    out.push('\n');
    for (i, node) in spec.nodes.iter().enumerate() {
        if !owner.contains_key(node.name.as_str()) {
            node_line(&mut out, "    ", &ids[node.name.as_str()], node, kinds[i]);
        }
    }

    if !spec.connections.is_empty() {
        out.push('\n');
    }
    for conn in &spec.connections {
        let from = ids
            .get(conn.from.as_str())
            .ok_or_else(|| BuildError::UnknownNode(conn.from.clone()))?;
        let to = ids
            .get(conn.to.as_str())
            .ok_or_else(|| BuildError::UnknownNode(conn.to.clone()))?;
        match conn.label.as_deref().filter(|l| !l.is_empty()) {
            Some(label) => {
                let _ = writeln!(out, "    {from} -> {to} [label={}];", quote(label));
            }
            None => {
                let _ = writeln!(out, "    {from} -> {to};");
            }
        }
    }

    out.push_str("}\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archsketch_core::{ClusterSpec, ConnectionSpec};

    fn node(node_type: &str, name: &str) -> NodeSpec {
        NodeSpec {
            node_type: node_type.into(),
            name: name.into(),
            properties: Default::default(),
        }
    }

    fn web_app() -> DiagramSpecification {
        DiagramSpecification {
            nodes: vec![
                node("LoadBalancer", "ALB"),
                node("EC2", "Web1"),
                node("EC2", "Web2"),
                node("RDS", "Db"),
            ],
            connections: vec![
                ConnectionSpec {
                    from: "ALB".into(),
                    to: "Web1".into(),
                    label: Some("http".into()),
                },
                ConnectionSpec {
                    from: "Web1".into(),
                    to: "Db".into(),
                    label: None,
                },
            ],
            clusters: vec![ClusterSpec {
                name: "Web Tier".into(),
                nodes: vec!["Web1".into(), "Web2".into()],
            }],
        }
    }

    #[test]
    fn every_kind_has_a_distinct_shape() {
        let mut shapes: Vec<_> = NodeKind::ALL.iter().map(|k| style(*k).shape).collect();
        shapes.sort_unstable();
        shapes.dedup();
        assert_eq!(shapes.len(), NodeKind::ALL.len());
    }

    #[test]
    fn renders_nodes_edges_and_clusters() {
        let dot = render_dot(&web_app(), "Web app", Direction::LeftRight).unwrap();
        assert!(dot.starts_with("digraph architecture {"));
        assert!(dot.contains("rankdir=LR;"));
        assert!(dot.contains("label=\"Web app\";"));
        assert!(dot.contains("subgraph cluster_0 {"));
        assert!(dot.contains("label=\"Web Tier\";"));
        assert!(dot.contains("n0 -> n1 [label=\"http\"];"));
        assert!(dot.contains("n1 -> n3;"));
        assert!(dot.contains("shape=cylinder"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn clustered_nodes_are_declared_inside_their_cluster() {
        let dot = render_dot(&web_app(), "t", Direction::TopBottom).unwrap();
        let start = dot.find("subgraph cluster_0").unwrap();
        let end = start + dot[start..].find("\n    }\n").unwrap();
        let cluster = &dot[start..end];
        assert!(cluster.contains("n1 ["));
        assert!(cluster.contains("n2 ["));
        assert!(!cluster.contains("n0 ["));
        assert_eq!(dot.matches("    n1 [label").count(), 1);
    }

    #[test]
    fn names_are_escaped() {
        let spec = DiagramSpecification {
            nodes: vec![node("S3", r#"my "bucket" \ files"#)],
            connections: vec![],
            clusters: vec![],
        };
        let dot = render_dot(&spec, "quote \" title", Direction::LeftRight).unwrap();
        assert!(dot.contains(r#"my \"bucket\" \\ files\nS3 bucket"#));
        assert!(dot.contains(r#"label="quote \" title";"#));
    }

    #[test]
    fn overlapping_clusters_are_rejected() {
        let mut spec = web_app();
        spec.clusters.push(ClusterSpec {
            name: "Edge".into(),
            nodes: vec!["ALB".into(), "Web2".into()],
        });
        match render_dot(&spec, "t", Direction::LeftRight) {
            Err(BuildError::OverlappingClusters { node, first, second }) => {
                assert_eq!(node, "Web2");
                assert_eq!(first, "Web Tier");
                assert_eq!(second, "Edge");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn repeated_member_in_one_cluster_is_fine() {
        let mut spec = web_app();
        spec.clusters[0].nodes.push("Web1".into());
        assert!(render_dot(&spec, "t", Direction::LeftRight).is_ok());
    }

    #[test]
    fn types_without_a_drawing_are_rejected() {
        let spec = DiagramSpecification {
            nodes: vec![node("Mainframe", "Big")],
            connections: vec![],
            clusters: vec![],
        };
        assert!(matches!(
            render_dot(&spec, "t", Direction::LeftRight),
            Err(BuildError::UnsupportedNodeKind { .. })
        ));
    }

    #[test]
    fn unknown_connection_end_is_an_error() {
        let mut spec = web_app();
        spec.connections.push(ConnectionSpec {
            from: "Db".into(),
            to: "Cache".into(),
            label: None,
        });
        assert!(matches!(
            render_dot(&spec, "t", Direction::LeftRight),
            Err(BuildError::UnknownNode(n)) if n == "Cache"
        ));
    }
}

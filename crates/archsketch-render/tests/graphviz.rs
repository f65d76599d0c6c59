#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use archsketch_core::{
    BuildError, DiagramBuilder, DiagramSpecification, Direction, ImageFormat, NodeSpec, Settings,
};
use archsketch_render::GraphvizBuilder;

/// Write an executable shell script standing in for `dot`.
fn fake_dot(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("dot");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn spec() -> DiagramSpecification {
    DiagramSpecification {
        nodes: vec![NodeSpec {
            node_type: "EC2".into(),
            name: "Web".into(),
            properties: Default::default(),
        }],
        connections: vec![],
        clusters: vec![],
    }
}

#[tokio::test]
async fn dot_output_is_returned_as_image_bytes() {
    let dir = tempfile::tempdir().unwrap();
    // Echo the requested format, then the DOT source, so both can be checked.
    let dot = fake_dot(dir.path(), "echo \"$1\"; cat");
    let builder = GraphvizBuilder::new(dot, Direction::TopBottom, ImageFormat::Svg);

    let image = builder.build(spec(), "My title").await.unwrap();
    let text = String::from_utf8(image).unwrap();
    assert!(text.starts_with("-Tsvg\n"));
    assert!(text.contains("digraph architecture"));
    assert!(text.contains("rankdir=TB;"));
    assert!(text.contains("My title"));
    assert_eq!(builder.format(), ImageFormat::Svg);
}

#[tokio::test]
async fn failing_dot_reports_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let dot = fake_dot(dir.path(), "cat > /dev/null; echo 'syntax error in line 3' >&2; exit 1");
    let builder = GraphvizBuilder::new(dot, Direction::LeftRight, ImageFormat::Png);

    match builder.build(spec(), "t").await {
        Err(BuildError::Renderer(msg)) => assert!(msg.contains("syntax error in line 3")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn silent_dot_is_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let dot = fake_dot(dir.path(), "cat > /dev/null");
    let builder = GraphvizBuilder::new(dot, Direction::LeftRight, ImageFormat::Png);
    assert!(matches!(builder.build(spec(), "t").await, Err(BuildError::EmptyOutput)));
}

#[tokio::test]
async fn invalid_specification_never_reaches_dot() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let dot = fake_dot(dir.path(), &format!("touch {}; cat", marker.display()));
    let builder = GraphvizBuilder::new(dot, Direction::LeftRight, ImageFormat::Png);

    let mut bad = spec();
    bad.nodes[0].node_type = "Mainframe".into();
    assert!(matches!(
        builder.build(bad, "t").await,
        Err(BuildError::UnsupportedNodeKind { .. })
    ));
    assert!(!marker.exists());
}

#[test]
fn configured_dot_path_must_exist() {
    let settings = Settings {
        dot_path: Some(PathBuf::from("/definitely/not/here/dot")),
        ..Settings::default()
    };
    assert!(matches!(
        GraphvizBuilder::from_settings(&settings),
        Err(BuildError::RendererMissing(_))
    ));
}

#[test]
fn configured_dot_path_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let dot = fake_dot(dir.path(), "cat");
    let settings = Settings {
        dot_path: Some(dot.clone()),
        format: ImageFormat::Pdf,
        ..Settings::default()
    };
    let builder = GraphvizBuilder::from_settings(&settings).unwrap();
    assert_eq!(builder.dot_path(), dot.as_path());
    assert_eq!(builder.format(), ImageFormat::Pdf);
}

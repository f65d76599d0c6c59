use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DiagramSpecification;

/// Turns a validated specification into image bytes.
///
/// Implementations take the specification by value and never hand it back,
/// so each one is rendered at most once. Failures are reported as
/// [`BuildError`]; callers do not retry them.
#[async_trait]
pub trait DiagramBuilder: Send + Sync {
    async fn build(&self, spec: DiagramSpecification, title: &str) -> Result<Vec<u8>, BuildError>;

    /// Format of the bytes returned by [`DiagramBuilder::build`].
    fn format(&self) -> ImageFormat;
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The node type passed validation but the renderer has no drawing for it.
    #[error("node '{node}' has type '{node_type}', which the renderer cannot draw")]
    UnsupportedNodeKind { node: String, node_type: String },

    /// Clusters are drawn as nested boxes, so a node can sit in only one.
    #[error("node '{node}' is listed in both cluster '{first}' and cluster '{second}'")]
    OverlappingClusters {
        node: String,
        first: String,
        second: String,
    },

    #[error("connection or cluster references unknown node '{0}'")]
    UnknownNode(String),

    #[error("renderer not available: {0}")]
    RendererMissing(String),

    #[error("renderer failed: {0}")]
    Renderer(String),

    #[error("renderer produced no output")]
    EmptyOutput,

    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpg,
    Svg,
    Pdf,
}

impl ImageFormat {
    /// Graphviz `-T` output name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpg => "image/jpeg",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout direction of the rendered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "TB")]
    TopBottom,
    #[default]
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "BT")]
    BottomTop,
    #[serde(rename = "RL")]
    RightLeft,
}

impl Direction {
    /// Graphviz `rankdir` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::TopBottom => "TB",
            Direction::LeftRight => "LR",
            Direction::BottomTop => "BT",
            Direction::RightLeft => "RL",
        }
    }
}

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use archsketch_core::{BuildError, DiagramBuilder, DiagramSpecification, Direction, ImageFormat, Settings};

use crate::dot::render_dot;

/// [`DiagramBuilder`] that pipes DOT source through the Graphviz `dot` binary.
#[derive(Debug, Clone)]
pub struct GraphvizBuilder {
    dot: PathBuf,
    direction: Direction,
    format: ImageFormat,
}

impl GraphvizBuilder {
    pub fn new(dot: impl Into<PathBuf>, direction: Direction, format: ImageFormat) -> Self {
        Self {
            dot: dot.into(),
            direction,
            format,
        }
    }

    /// Use `dotPath` from the settings, or find `dot` on PATH.
    pub fn from_settings(settings: &Settings) -> Result<Self, BuildError> {
        let dot = match &settings.dot_path {
            Some(path) => path.clone(),
            None => which::which("dot")
                .map_err(|e| BuildError::RendererMissing(format!("graphviz 'dot' not found on PATH: {e}")))?,
        };
        if !dot.exists() {
            return Err(BuildError::RendererMissing(format!("{} does not exist", dot.display())));
        }
        tracing::info!(dot = %dot.display(), format = %settings.format, "using graphviz");
        Ok(Self::new(dot, settings.direction, settings.format))
    }

    pub fn dot_path(&self) -> &Path {
        &self.dot
    }

    async fn run_dot(&self, source: String) -> Result<Vec<u8>, BuildError> {
        let mut child = Command::new(&self.dot)
            .arg(format!("-T{}", self.format.as_str()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BuildError::Renderer("dot stdin unavailable".to_string()))?;

        let writer = async move {
            stdin.write_all(source.as_bytes()).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(writer, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::Renderer(format!("dot exited with {}: {}", output.status, stderr.trim())));
        }
        written?;

        if output.stdout.is_empty() {
            return Err(BuildError::EmptyOutput);
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl DiagramBuilder for GraphvizBuilder {
    async fn build(&self, spec: DiagramSpecification, title: &str) -> Result<Vec<u8>, BuildError> {
        let source = render_dot(&spec, title, self.direction)?;
        tracing::debug!(bytes = source.len(), "rendering DOT source");
        let image = self.run_dot(source).await?;
        tracing::info!(bytes = image.len(), format = %self.format, "diagram rendered");
        Ok(image)
    }

    fn format(&self) -> ImageFormat {
        self.format
    }
}

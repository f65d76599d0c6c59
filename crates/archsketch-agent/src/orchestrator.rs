use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use archsketch_core::{
    suggest_fix, validate, DiagramBuilder, DiagramSpecification, ImageFormat, NodeTypeSet,
    ValidationOutcome,
};

use crate::engine::ModelClient;
use crate::error::{AttemptFailure, GenerationError};
use crate::{parse, prompt};

/// Longest diagram title, in characters, before "..." is appended.
const MAX_TITLE_CHARS: usize = 50;

/// A rendered diagram plus what it took to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDiagram {
    pub image: Vec<u8>,
    pub format: ImageFormat,
    pub attempts_used: u32,
    pub node_count: usize,
    pub connection_count: usize,
    pub cluster_count: usize,
}

impl GeneratedDiagram {
    pub fn metadata(&self) -> DiagramMetadata {
        DiagramMetadata {
            format: self.format,
            attempts_used: self.attempts_used,
            node_count: self.node_count,
            connection_count: self.connection_count,
            cluster_count: self.cluster_count,
            image_bytes: self.image.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramMetadata {
    pub format: ImageFormat,
    pub attempts_used: u32,
    pub node_count: usize,
    pub connection_count: usize,
    pub cluster_count: usize,
    pub image_bytes: usize,
}

/// A validated specification that has not been rendered yet.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSpecification {
    pub specification: DiagramSpecification,
    pub attempts_used: u32,
}

/// Title shown on the diagram: the trimmed description, cut to 50 characters.
pub fn diagram_title(description: &str) -> String {
    let trimmed = description.trim();
    match trimmed.char_indices().nth(MAX_TITLE_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Drives the prompt, validate, repair loop and hands the first valid
/// specification to the builder.
///
/// Holds no per-request state, so one instance serves concurrent requests.
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    builder: Arc<dyn DiagramBuilder>,
    node_types: NodeTypeSet,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelClient>, builder: Arc<dyn DiagramBuilder>, node_types: NodeTypeSet) -> Self {
        Self {
            model,
            builder,
            node_types,
        }
    }

    pub fn node_types(&self) -> &NodeTypeSet {
        &self.node_types
    }

    pub fn format(&self) -> ImageFormat {
        self.builder.format()
    }

    pub async fn generate(&self, description: &str, max_attempts: u32) -> Result<GeneratedDiagram, GenerationError> {
        self.generate_with_cancel(description, max_attempts, &CancellationToken::new())
            .await
    }

    /// Like [`Orchestrator::generate`], but stops at the next await point once
    /// `cancel` fires. An in-flight model call or build is dropped.
    pub async fn generate_with_cancel(
        &self,
        description: &str,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<GeneratedDiagram, GenerationError> {
        let GeneratedSpecification {
            specification,
            attempts_used,
        } = self
            .generate_specification(description, max_attempts, cancel)
            .await?;

        let node_count = specification.nodes.len();
        let connection_count = specification.connections.len();
        let cluster_count = specification.clusters.len();
        let title = diagram_title(description);

        tracing::info!(node_count, connection_count, cluster_count, %title, "building diagram");

        let built = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled { attempts_used }),
            built = self.builder.build(specification, &title) => built,
        };

        let image = built.map_err(|source| {
            tracing::error!(error = %source, "diagram build failed");
            GenerationError::Build {
                source,
                attempts_used,
            }
        })?;

        Ok(GeneratedDiagram {
            image,
            format: self.builder.format(),
            attempts_used,
            node_count,
            connection_count,
            cluster_count,
        })
    }

    /// Run the repair loop without rendering.
    ///
    /// Every model call counts as one attempt, whether it fails, returns an
    /// invalid specification or succeeds. A failed call is retried with the
    /// same prompt; a rejected answer is retried with a repair prompt built
    /// from the answer, the failure and its suggested fix.
    pub async fn generate_specification(
        &self,
        description: &str,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<GeneratedSpecification, GenerationError> {
        if max_attempts == 0 {
            return Err(GenerationError::InvalidAttempts);
        }

        let mut prompt = prompt::generation_prompt(description, &self.node_types);
        let mut last_failure = None;

        for attempt in 1..=max_attempts {
            tracing::debug!(attempt, max_attempts, model = %self.model.describe(), "requesting specification");

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(attempt, "generation cancelled");
                    return Err(GenerationError::Cancelled { attempts_used: attempt - 1 });
                }
                reply = self.model.complete(&prompt) => reply,
            };

            let raw = match reply {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "model call failed");
                    last_failure = Some(AttemptFailure::ModelCall(e.to_string()));
                    continue;
                }
            };

            match validate(parse::extract_json_object(&raw), &self.node_types) {
                ValidationOutcome::Valid(specification) => {
                    tracing::info!(attempt, "specification accepted");
                    return Ok(GeneratedSpecification {
                        specification,
                        attempts_used: attempt,
                    });
                }
                ValidationOutcome::Invalid(failure) => {
                    tracing::info!(attempt, kind = %failure.kind, "specification rejected");
                    if attempt < max_attempts {
                        let suggestions = suggest_fix(&failure, &raw, &self.node_types);
                        prompt = prompt::repair_prompt(description, &raw, &failure, &suggestions, &self.node_types);
                    }
                    last_failure = Some(AttemptFailure::Validation(failure));
                }
            }
        }

        let Some(last_failure) = last_failure else {
            return Err(GenerationError::InvalidAttempts);
        };
        tracing::warn!(max_attempts, %last_failure, "attempts exhausted");
        Err(GenerationError::Exhausted {
            last_failure,
            attempts_used: max_attempts,
        })
    }
}

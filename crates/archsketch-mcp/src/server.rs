use base64::Engine;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use archsketch_agent::{GenerationError, Orchestrator, MAX_DESCRIPTION_CHARS};
use archsketch_core::{review, specification_schema, ImageFormat, NodeKind};

/// Shortest accepted description, in characters after trimming. The upper
/// bound is the prompt's own limit, [`MAX_DESCRIPTION_CHARS`].
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// Upper bound for a per-request `max_attempts` override.
pub const MAX_ATTEMPTS_CAP: u32 = 10;

const INSTRUCTIONS: &str = r#"archsketch turns a plain-language description of a cloud architecture into a rendered diagram.

Call generate_diagram with a description such as "An application load balancer in front of two EC2 web servers that share an RDS database". The server asks a language model for a JSON diagram specification, validates it, feeds any validation error back to the model, and renders the first valid specification with Graphviz.

Use validate_specification to check a hand-written specification, list_node_types to see which node types are accepted, explain_node_type to learn what one stands for, and get_specification_schema for the JSON Schema."#;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GenerateDiagramRequest {
    /// Plain-language description of the architecture (10 to 2000 characters)
    pub description: String,
    /// Model calls allowed for this request, counting the first (1 to 10). Defaults to the server setting.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Write the image to this file instead of returning it inline. Required for PDF output.
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ValidateSpecificationRequest {
    /// JSON text of a diagram specification: {"nodes": [...], "connections": [...], "clusters": [...]}
    pub specification: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExplainNodeTypeRequest {
    /// Node type name, exactly as used in a specification (e.g. "EC2")
    pub node_type: String,
}

// --- Server ---

#[derive(Clone)]
pub struct ArchsketchServer {
    orchestrator: Arc<Orchestrator>,
    max_attempts: u32,
    shutdown: CancellationToken,
    tool_router: ToolRouter<Self>,
}

fn check_description(description: &str) -> Result<&str, String> {
    let trimmed = description.trim();
    let len = trimmed.chars().count();
    if len < MIN_DESCRIPTION_CHARS {
        return Err(format!(
            "Description is too short ({len} characters). Describe the architecture in at least {MIN_DESCRIPTION_CHARS} characters."
        ));
    }
    if len > MAX_DESCRIPTION_CHARS {
        return Err(format!(
            "Description is too long ({len} characters). Keep it to at most {MAX_DESCRIPTION_CHARS} characters."
        ));
    }
    Ok(trimmed)
}

fn generation_error_json(err: &GenerationError) -> String {
    let detail = match err {
        GenerationError::Exhausted { last_failure, .. } => last_failure.detail().to_string(),
        GenerationError::Build { source, .. } => source.to_string(),
        other => other.to_string(),
    };
    let body = serde_json::json!({
        "errorKind": err.kind_name(),
        "message": err.to_string(),
        "detail": detail,
        "attemptsUsed": err.attempts_used(),
    });
    serde_json::to_string_pretty(&body).unwrap_or_else(|e| format!("Serialization error: {e}"))
}

#[tool_router]
impl ArchsketchServer {
    pub fn new(orchestrator: Arc<Orchestrator>, max_attempts: u32, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            max_attempts,
            shutdown,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Generate an architecture diagram from a plain-language description. Returns the image (PNG, JPG or SVG inline; PDF only via output_path) plus JSON metadata {format, attemptsUsed, nodeCount, connectionCount, clusterCount, imageBytes, path?}. On failure returns {errorKind, message, detail, attemptsUsed}."
    )]
    pub async fn generate_diagram(
        &self,
        Parameters(req): Parameters<GenerateDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let description = match check_description(&req.description) {
            Ok(d) => d,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        let max_attempts = req.max_attempts.unwrap_or(self.max_attempts);
        if max_attempts == 0 || max_attempts > MAX_ATTEMPTS_CAP {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "max_attempts must be between 1 and {MAX_ATTEMPTS_CAP}, got {max_attempts}"
            ))]));
        }
        if self.orchestrator.format() == ImageFormat::Pdf && req.output_path.is_none() {
            return Ok(CallToolResult::error(vec![Content::text(
                "The server renders PDF, which cannot be returned inline. Pass output_path.",
            )]));
        }

        tracing::info!(max_attempts, chars = description.chars().count(), "generate_diagram");

        let cancel = self.shutdown.child_token();
        let diagram = match self
            .orchestrator
            .generate_with_cancel(description, max_attempts, &cancel)
            .await
        {
            Ok(diagram) => diagram,
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                return Ok(CallToolResult::error(vec![Content::text(generation_error_json(&e))]));
            }
        };

        let mut metadata = match serde_json::to_value(diagram.metadata()) {
            Ok(v) => v,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(format!("Serialization error: {e}"))])),
        };

        if let Some(path) = req.output_path {
            let path = PathBuf::from(path);
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                if let Err(e) = tokio::fs::create_dir_all(dir).await {
                    return Ok(CallToolResult::error(vec![Content::text(format!(
                        "Failed to create {}: {e}",
                        dir.display()
                    ))]));
                }
            }
            if let Err(e) = tokio::fs::write(&path, &diagram.image).await {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to write {}: {e}",
                    path.display()
                ))]));
            }
            metadata["path"] = serde_json::Value::String(path.display().to_string());
            let json = serde_json::to_string_pretty(&metadata).unwrap_or_else(|e| format!("Serialization error: {e}"));
            return Ok(CallToolResult::success(vec![Content::text(json)]));
        }

        let json = serde_json::to_string_pretty(&metadata).unwrap_or_else(|e| format!("Serialization error: {e}"));
        let data = base64::engine::general_purpose::STANDARD.encode(&diagram.image);
        Ok(CallToolResult::success(vec![
            Content::image(data, diagram.format.mime_type()),
            Content::text(json),
        ]))
    }

    #[tool(
        description = "Validate a diagram specification without rendering it. Returns {valid, errorKind?, error?, suggestions?, warnings?}. Rules are checked in order (JSON syntax, structure, node types, unique names, connection and cluster references) and only the first failing rule is reported, with every offending item listed. A valid specification can still fail to render; warnings lists those cases (a node in two clusters, a node type with no drawing)."
    )]
    pub fn validate_specification(
        &self,
        Parameters(req): Parameters<ValidateSpecificationRequest>,
    ) -> Result<CallToolResult, McpError> {
        let report = review(&req.specification, self.orchestrator.node_types());
        let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("Serialization error: {e}"));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List the node types accepted in specifications, in configured order.")]
    pub fn list_node_types(&self) -> Result<CallToolResult, McpError> {
        let types: Vec<serde_json::Value> = self
            .orchestrator
            .node_types()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": t,
                    "drawable": t.parse::<NodeKind>().is_ok(),
                })
            })
            .collect();
        let json = serde_json::to_string_pretty(&serde_json::json!({ "nodeTypes": types }))
            .unwrap_or_else(|e| format!("Serialization error: {e}"));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Explain what a node type stands for and whether it can be used and drawn. Returns {type, accepted, drawable, description}.")]
    pub fn explain_node_type(
        &self,
        Parameters(req): Parameters<ExplainNodeTypeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let name = req.node_type.trim();
        let accepted = self.orchestrator.node_types().contains(name);
        let kind = name.parse::<NodeKind>().ok();

        if !accepted && kind.is_none() {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Unknown node type '{name}'. Available node types: {}",
                self.orchestrator.node_types()
            ))]));
        }

        let description = match kind {
            Some(kind) if accepted => kind.description().to_string(),
            Some(kind) => format!("{} Not accepted by this server's configuration.", kind.description()),
            None => "Accepted by this server's configuration, but there is no drawing for it, so diagrams using it fail to render.".to_string(),
        };
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "type": name,
            "accepted": accepted,
            "drawable": kind.is_some(),
            "description": description,
        }))
        .unwrap_or_else(|e| format!("Serialization error: {e}"));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get the JSON Schema of a diagram specification and the rules the generator follows.")]
    pub fn get_specification_schema(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![
            Content::text(specification_schema()),
            Content::text(format!("## Specification rules\n{}", archsketch_core::rules::RULES)),
        ]))
    }
}

#[tool_handler]
impl ServerHandler for ArchsketchServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\nAvailable node types: {}\n\n## Specification rules\n{}",
            INSTRUCTIONS,
            self.orchestrator.node_types(),
            archsketch_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

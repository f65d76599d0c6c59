pub mod engine;
pub mod error;
pub mod mock;
mod orchestrator;
mod parse;
pub mod prompt;

use std::sync::Arc;

use archsketch_core::Settings;

pub use engine::{LlmClient, ModelClient, ModelError};
pub use error::{AttemptFailure, GenerationError};
pub use mock::CannedClient;
pub use orchestrator::{diagram_title, DiagramMetadata, GeneratedDiagram, GeneratedSpecification, Orchestrator};
pub use parse::extract_json_object;
pub use prompt::MAX_DESCRIPTION_CHARS;

/// Pick the model client the settings ask for: canned replies in mock mode,
/// otherwise the configured `llm` provider.
pub fn client_from_settings(settings: &Settings) -> Result<Arc<dyn ModelClient>, ModelError> {
    if settings.mock_mode() {
        tracing::info!("using canned model replies");
        return Ok(Arc::new(CannedClient::new()));
    }
    let client = LlmClient::from_settings(settings)?;
    tracing::info!(model = %client.describe(), "using llm provider");
    Ok(Arc::new(client))
}

use crate::error::AgentError;
use async_trait::async_trait;
use domu_voice::{GeminiClient, GeminiPart};
use std::sync::Arc;

/// Text-generation backend: prompt in, completion out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Generates through Gemini with a single prompt string and no system role.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiGenerator {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        let model = client.config().generation_model.clone();
        Self { client, model }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        self.client
            .generate(&self.model, vec![GeminiPart::Text(prompt.to_string())])
            .await
            .map_err(|e| AgentError::Generation(e.to_string()))
    }
}

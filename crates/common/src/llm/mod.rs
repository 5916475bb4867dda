//! Completion service abstraction
//!
//! Two generation modes behind one trait:
//! - free-text completion (optionally streamed chunk by chunk)
//! - structured completion constrained to a JSON schema
//!
//! Implementations own provider-side retries for malformed structured output
//! and report `SchemaViolation` once those are exhausted.

mod openai;
mod schema;

pub use openai::OpenAiCompletionService;
pub use schema::{parse_json_output, OutputSchema};

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use futures::Stream;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;

/// Ordered text chunks from a streamed completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A single prompt: instructions, the user turn and optional context
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub context: Option<String>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// User message with the context block appended
    pub fn render_user(&self) -> String {
        match &self.context {
            Some(context) => format!("{}\n\nContext:\n{}", self.user, context),
            None => self.user.clone(),
        }
    }
}

/// Text generation capability
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Free-text completion
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Completion constrained to `schema`; the returned value conforms to it
    async fn complete_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<serde_json::Value>;

    /// Free-text completion delivered as ordered chunks
    async fn complete_stream(&self, prompt: &Prompt) -> Result<TextStream> {
        let text = self.complete(prompt).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Types produced by structured generation
///
/// The schema sent to the model is derived from the type itself, so the
/// decoder and the constraint cannot drift apart.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn schema() -> OutputSchema {
        OutputSchema::of::<Self>(Self::NAME, Self::DESCRIPTION)
    }
}

/// Structured completion decoded into `T`
///
/// The value is validated again on this side so a misbehaving service cannot
/// hand the caller something outside the schema.
pub async fn complete_typed<T: StructuredOutput>(
    service: &dyn CompletionService,
    prompt: &Prompt,
) -> Result<T> {
    let schema = T::schema();
    let value = service.complete_structured(prompt, &schema).await?;

    schema.validate(&value).map_err(|message| AppError::SchemaViolation {
        schema: schema.name.clone(),
        message,
    })?;

    serde_json::from_value(value).map_err(|e| AppError::SchemaViolation {
        schema: schema.name.clone(),
        message: e.to_string(),
    })
}

/// Create a completion service based on configuration
pub fn create_completion_service(config: &LlmConfig) -> Result<Arc<dyn CompletionService>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompletionService::new(config)?)),
        other => Err(AppError::Configuration {
            message: format!("Unknown completion provider: {}", other),
        }),
    }
}

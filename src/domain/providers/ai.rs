//! Generative AI provider.

use async_trait::async_trait;

/// Sampling knobs for text generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 4096,
        }
    }
}

/// Embeddings, text and image generation.
///
/// # Implementations
///
/// - [`crate::infrastructure::google::GeminiClient`] - Google Generative Language API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Embeds a single document.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Generates text for a prompt. An empty string means the model returned
    /// no candidates.
    async fn generate_text(&self, prompt: &str, options: TextOptions) -> anyhow::Result<String>;

    /// Generates one PNG image with the given aspect ratio (e.g. `16:9`).
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> anyhow::Result<Vec<u8>>;

    fn embedding_model(&self) -> String;

    fn generation_model(&self) -> String;

    fn image_model(&self) -> String;
}

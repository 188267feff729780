//! Gemini (text, embeddings) and Imagen client for the Generative Language API.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;

use super::ApiClient;
use crate::domain::providers::{AiProvider, TextOptions};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Generative Language API client authenticated with an API key.
pub struct GeminiClient {
    api: ApiClient,
    base_url: String,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    image_model: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Option<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

impl GeminiClient {
    pub fn new(
        api: ApiClient,
        api_key: impl Into<String>,
        embedding_model: impl Into<String>,
        generation_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        Self {
            api,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            embedding_model: embedding_model.into(),
            generation_model: generation_model.into(),
            image_model: image_model.into(),
        }
    }

    /// Points the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    fn ensure_key(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow!("GOOGLE_API_KEY is not configured"));
        }
        Ok(())
    }
}

#[async_trait]
impl AiProvider for GeminiClient {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.ensure_key()?;

        let body = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] },
        });
        let request = self
            .api
            .http()
            .post(self.model_url(&self.embedding_model, "embedContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response: EmbedResponse = self.api.send_json(request, "Gemini embedContent").await?;
        let values = response.embedding.map(|e| e.values).unwrap_or_default();
        if values.is_empty() {
            return Err(anyhow!("Gemini returned an empty embedding"));
        }
        Ok(values)
    }

    async fn generate_text(&self, prompt: &str, options: TextOptions) -> anyhow::Result<String> {
        self.ensure_key()?;

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": options.temperature,
                "maxOutputTokens": options.max_output_tokens,
            },
        });
        let request = self
            .api
            .http()
            .post(self.model_url(&self.generation_model, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response: GenerateResponse =
            self.api.send_json(request, "Gemini generateContent").await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }

    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> anyhow::Result<Vec<u8>> {
        self.ensure_key()?;

        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1, "aspectRatio": aspect_ratio },
        });
        let request = self
            .api
            .http()
            .post(self.model_url(&self.image_model, "predict"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response: PredictResponse = self.api.send_json(request, "Imagen predict").await?;
        let encoded = response
            .predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded)
            .ok_or_else(|| anyhow!("Imagen returned no images"))?;

        STANDARD
            .decode(encoded)
            .context("Imagen returned invalid base64 image data")
    }

    fn embedding_model(&self) -> String {
        self.embedding_model.clone()
    }

    fn generation_model(&self) -> String {
        self.generation_model.clone()
    }

    fn image_model(&self) -> String {
        self.image_model.clone()
    }
}

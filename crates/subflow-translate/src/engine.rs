//! Translation engine client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TranslateError, TranslateResult};

/// A batch text translator. Takes an ordered batch of subtitle texts and
/// returns the engine's free-text response, expected (but not guaranteed)
/// to be a numbered list matching the batch size.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> TranslateResult<String>;
}

/// Gemini engine configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> TranslateResult<Self> {
        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY").map_err(|_| TranslateError::MissingApiKey)?,
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
        })
    }
}

/// Gemini-backed translation engine.
pub struct GeminiEngine {
    config: GeminiConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

impl GeminiEngine {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> TranslateResult<Self> {
        Ok(Self::new(GeminiConfig::from_env()?))
    }
}

#[async_trait]
impl TranslationEngine for GeminiEngine {
    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> TranslateResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );
        let prompt = build_prompt(texts, source_lang, target_lang);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        debug!(model = %self.config.model, batch_size = texts.len(), "Requesting translation");
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Service { status, body });
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or(TranslateError::EmptyResponse)?;

        Ok(text)
    }
}

/// Build the numbered-list translation prompt.
fn build_prompt(texts: &[String], source_lang: &str, target_lang: &str) -> String {
    let mut prompt = format!(
        "Translate the following {} numbered subtitle lines from {} to {}.\n\
         Keep the tone natural and conversational. Preserve inline markup \
         tags such as <i>...</i> exactly.\n\n\
         IMPORTANT: Reply with ONLY a numbered list of exactly {} items, one \
         per input line, in the same order. Do not merge, split, or skip \
         items. Do not add commentary.\n\n",
        texts.len(),
        source_lang,
        target_lang,
        texts.len()
    );

    for (i, text) in texts.iter().enumerate() {
        // Real line breaks inside one entry would desynchronize numbering
        let flat = text.replace('\n', " ");
        prompt.push_str(&format!("{}. {}\n", i + 1, flat));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_numbers_every_entry() {
        let texts = vec![
            "Hello there.".to_string(),
            "How are\nyou?".to_string(),
            "Goodbye.".to_string(),
        ];
        let prompt = build_prompt(&texts, "English", "Portuguese");

        assert!(prompt.contains("1. Hello there."));
        assert!(prompt.contains("2. How are you?"));
        assert!(prompt.contains("3. Goodbye."));
        assert!(prompt.contains("exactly 3 items"));
    }
}

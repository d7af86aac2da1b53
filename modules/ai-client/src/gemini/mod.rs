mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::TextCompletion;
use client::GeminiClient;
use types::GenerateRequest;

// =============================================================================
// Gemini
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn client(&self) -> GeminiClient {
        let client = GeminiClient::new(&self.api_key, self.http.clone());
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }
}

#[async_trait]
impl TextCompletion for Gemini {
    async fn chat_completion(&self, system: &str, user: &str) -> Result<String> {
        let request = GenerateRequest::new(system, user);
        let response = self.client().generate(&self.model, &request).await?;
        response
            .text()
            .ok_or_else(|| anyhow!("No text in Gemini response"))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

//! Gemini API連携
//!
//! ラベルを渡して what / safety のJSONを受け取り、
//! 回収拠点を添えたセクション形式のガイダンスに整形する。

use super::{Advice, Advisor, Unavailable};
use crate::config::Config;
use ewizard_common::{build_advisory_prompt, compose_guidance, parse_advice_reply};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: ResponseContent,
}

#[derive(Deserialize, Default)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone)]
pub struct GeminiAdvisor {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    timeout: Duration,
    location_hint: String,
}

impl GeminiAdvisor {
    pub fn new(
        api_key: Option<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        location_hint: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: endpoint.into(),
            model: model.into(),
            timeout,
            location_hint: location_hint.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.get_api_key().ok(),
            config.advisory_endpoint.clone(),
            config.model.clone(),
            Duration::from_secs(config.advisory_timeout_seconds),
            config.location_hint.clone(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, api_key: &str) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            api_key
        )
    }

    async fn request(&self, api_key: &str, label: &str) -> Result<String, Unavailable> {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_advisory_prompt(label, &self.location_hint),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 300,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(self.url(api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Unavailable::Timeout
                } else {
                    Unavailable::Request(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Unavailable::Status(status.as_u16()));
        }

        let payload: GeminiResponse = response
            .json()
            .await
            .map_err(|e| Unavailable::Malformed(e.without_url().to_string()))?;

        let text: String = payload
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        debug!(chars = text.len(), "Gemini応答を受信");

        if text.trim().is_empty() {
            return Err(Unavailable::Malformed("候補が空です".into()));
        }

        let reply = parse_advice_reply(&text).map_err(|e| Unavailable::Malformed(e.to_string()))?;
        Ok(compose_guidance(&reply.what, &reply.safety, &self.location_hint))
    }
}

impl Advisor for GeminiAdvisor {
    async fn advise(&self, label: &str) -> Advice {
        let Some(api_key) = self.api_key.as_deref() else {
            return Advice::Unavailable(Unavailable::NotConfigured);
        };

        match tokio::time::timeout(self.timeout, self.request(api_key, label)).await {
            Ok(Ok(text)) => Advice::Generated(text),
            Ok(Err(reason)) => Advice::Unavailable(reason),
            Err(_) => Advice::Unavailable(Unavailable::Timeout),
        }
    }
}

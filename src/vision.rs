//! Model Client: one extraction attempt per image against an
//! OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::diag::Diagnostics;
use crate::dispatch::{PipelineError, RecordExtractor};
use crate::record::{self, RunningRecord};

const EXTRACTION_PROMPT: &str = "この画像からランニング記録を抽出してください。以下の情報をJSON形式で返してください。\n- date: 日時 (YYYY-MM-DD HH:MM)\n- distance: 走った距離 (km)\n- time: 走った時間 (HH:MM:SS)\n- pace: 1キロのペース (MM:SS/km)";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

pub struct VisionClient {
    client: reqwest::Client,
    config: OpenAiConfig,
    diag: Diagnostics,
}

impl VisionClient {
    pub fn new(config: OpenAiConfig, diag: Diagnostics) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build model HTTP client")?;
        Ok(Self {
            client,
            config,
            diag,
        })
    }

    /// Single-turn multimodal call: the image as a base64 data URI plus
    /// the extraction instruction, with the answer constrained to the
    /// running-record schema. One attempt, no retries.
    pub async fn extract_record(&self, image: &[u8]) -> Result<RunningRecord> {
        let request = build_request(&self.config.model, self.config.max_tokens, image);
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!("Sending extraction request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send extraction request")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("model API error ({}): {}", status, error_body);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to decode model response")?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("model response contained no content")?;

        // The raw answer stays in diagnostics; the user never sees it.
        self.diag
            .debug("extract_record", &format!("model answer: {content}"))
            .await;

        RunningRecord::from_model_json(&content)
    }
}

/// Request body: one user turn carrying the instruction and the image,
/// plus the structured-output constraint. Compliance is requested, not
/// guaranteed — the answer parser copes with fenced and prose replies.
fn build_request(model: &str, max_tokens: u32, image: &[u8]) -> Value {
    let data_uri = format!("data:image/jpeg;base64,{}", BASE64.encode(image));
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": EXTRACTION_PROMPT },
                { "type": "image_url", "image_url": { "url": data_uri } }
            ]
        }],
        "response_format": record::response_schema(),
    })
}

#[async_trait]
impl RecordExtractor for VisionClient {
    async fn extract_record(&self, image: &[u8]) -> Result<RunningRecord, PipelineError> {
        VisionClient::extract_record(self, image)
            .await
            .map_err(PipelineError::ExtractionFailed)
    }
}

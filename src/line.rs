//! LINE Messaging API client: attachment content download and reply
//! delivery, plus the two canonical reply texts.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::LineConfig;
use crate::dispatch::{ImageSource, PipelineError, ReplySender};
use crate::record::RunningRecord;

/// Fixed failure reply. The same string for every stage — error detail
/// stays in diagnostics, never in the chat.
pub const FAILURE_TEXT: &str = "記録の処理に失敗しました。もう一度試してください。";

/// Confirmation reply echoing the archived record.
pub fn success_text(record: &RunningRecord) -> String {
    format!(
        "記録を保存しました！\n\n日時: {}\n距離: {}\n時間: {}\nペース: {}",
        record.date,
        record.distance,
        record.time,
        record.pace.as_deref().unwrap_or("-"),
    )
}

pub struct LineClient {
    client: reqwest::Client,
    config: LineConfig,
}

impl LineClient {
    pub fn new(config: LineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build LINE HTTP client")?;
        Ok(Self { client, config })
    }

    /// Download the raw bytes of a message attachment. Always a fresh
    /// fetch — content URLs are only valid for a short window after
    /// delivery, so there is nothing worth caching.
    pub async fn fetch_image(&self, attachment_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/v2/bot/message/{}/content",
            self.config.content_base_url, attachment_id
        );

        debug!("Fetching attachment content: {}", url);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.channel_access_token),
            )
            .send()
            .await
            .context("Failed to request attachment content")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("content endpoint returned {}", status);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read attachment body")?;
        Ok(bytes.to_vec())
    }

    /// Send one text reply. The token is single-use and expires quickly,
    /// so there is exactly one attempt.
    pub async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let url = format!("{}/v2/bot/message/reply", self.config.api_base_url);
        let body = json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }],
        });

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.channel_access_token),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send reply")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("reply endpoint returned {}: {}", status, error_body);
        }

        Ok(())
    }
}

#[async_trait]
impl ImageSource for LineClient {
    async fn fetch_image(&self, attachment_id: &str) -> Result<Vec<u8>, PipelineError> {
        LineClient::fetch_image(self, attachment_id)
            .await
            .map_err(PipelineError::FetchFailed)
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), PipelineError> {
        LineClient::reply(self, reply_token, text)
            .await
            .map_err(PipelineError::ReplyFailed)
    }
}

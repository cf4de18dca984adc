//! Event Dispatcher: drives the fetch → extract → persist → reply chain
//! for every event in a webhook payload.
//!
//! Stages are explicit `Result` values behind small traits so the
//! dispatcher composes outcomes by matching instead of relying on error
//! propagation across await points. Failures inside one event's chain
//! are terminal for that event only — the remaining events still run,
//! and the sender still gets the fixed failure reply.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::diag::Diagnostics;
use crate::line;
use crate::record::RunningRecord;
use crate::webhook::{self, InboundEvent, WebhookEvent};

/// Everything that can go wrong inside one webhook request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The body itself cannot be understood — fatal for the whole
    /// request, there is no token to reply on.
    #[error("malformed webhook payload: {0}")]
    PayloadMalformed(#[from] serde_json::Error),
    #[error("image fetch failed: {0:#}")]
    FetchFailed(anyhow::Error),
    #[error("record extraction failed: {0:#}")]
    ExtractionFailed(anyhow::Error),
    #[error("record append failed: {0:#}")]
    PersistFailed(anyhow::Error),
    /// Best-effort stage: logged, then swallowed.
    #[error("reply delivery failed: {0:#}")]
    ReplyFailed(anyhow::Error),
}

impl PipelineError {
    /// Originating stage name, used for diagnostics rows.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::PayloadMalformed(_) => "handle_payload",
            PipelineError::FetchFailed(_) => "fetch_image",
            PipelineError::ExtractionFailed(_) => "extract_record",
            PipelineError::PersistFailed(_) => "append_record",
            PipelineError::ReplyFailed(_) => "reply",
        }
    }
}

/// Resolves an attachment reference into raw image bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_image(&self, attachment_id: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Turns image bytes into a validated record.
#[async_trait]
pub trait RecordExtractor: Send + Sync {
    async fn extract_record(&self, image: &[u8]) -> Result<RunningRecord, PipelineError>;
}

/// Appends one finalized record to durable storage.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append_record(&self, record: &RunningRecord) -> Result<(), PipelineError>;
}

/// Delivers one text reply against a single-use token.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), PipelineError>;
}

pub struct Dispatcher {
    images: Arc<dyn ImageSource>,
    extractor: Arc<dyn RecordExtractor>,
    sink: Arc<dyn RecordSink>,
    replies: Arc<dyn ReplySender>,
    diag: Diagnostics,
}

impl Dispatcher {
    pub fn new(
        images: Arc<dyn ImageSource>,
        extractor: Arc<dyn RecordExtractor>,
        sink: Arc<dyn RecordSink>,
        replies: Arc<dyn ReplySender>,
        diag: Diagnostics,
    ) -> Self {
        Self {
            images,
            extractor,
            sink,
            replies,
            diag,
        }
    }

    /// Process one raw webhook body. Events run sequentially in payload
    /// order; each gets exactly one terminal action.
    pub async fn handle_payload(&self, body: &str) -> Result<(), PipelineError> {
        let payload = match webhook::parse_payload(body) {
            Ok(p) => p,
            Err(e) => {
                let err = PipelineError::from(e);
                self.diag.error(err.stage(), &err.to_string()).await;
                return Err(err);
            }
        };

        self.diag
            .info(
                "handle_payload",
                &format!("processing {} event(s)", payload.events.len()),
            )
            .await;

        for event in &payload.events {
            self.handle_event(event).await;
        }

        Ok(())
    }

    async fn handle_event(&self, event: &WebhookEvent) {
        match event.classify() {
            InboundEvent::Image {
                reply_token,
                attachment_id,
                sender_id,
            } => {
                self.handle_image(&reply_token, &attachment_id, sender_id.as_deref())
                    .await;
            }
            InboundEvent::Text { reply_token, text, .. } => {
                // Verbatim echo, no record. Liveness path for checking
                // the bot is up without burning a model call.
                if let Err(e) = self.replies.reply(&reply_token, &text).await {
                    self.report(&e).await;
                }
            }
            InboundEvent::Unsupported { kind } => {
                self.diag
                    .info("handle_event", &format!("ignoring event kind: {kind}"))
                    .await;
            }
        }
    }

    /// Full extraction chain for one image event. Whatever happens, the
    /// sender hears back exactly once.
    async fn handle_image(&self, reply_token: &str, attachment_id: &str, sender_id: Option<&str>) {
        let text = match self.run_chain(attachment_id, sender_id).await {
            Ok(record) => {
                self.diag
                    .info(
                        "handle_image",
                        &format!("record archived for user {}", record.user_id),
                    )
                    .await;
                line::success_text(&record)
            }
            Err(e) => {
                self.report(&e).await;
                line::FAILURE_TEXT.to_string()
            }
        };

        // A failed reply must not take down the rest of the request.
        if let Err(e) = self.replies.reply(reply_token, &text).await {
            self.report(&e).await;
        }
    }

    async fn run_chain(
        &self,
        attachment_id: &str,
        sender_id: Option<&str>,
    ) -> Result<RunningRecord, PipelineError> {
        let image = self.images.fetch_image(attachment_id).await?;
        let record = self
            .extractor
            .extract_record(&image)
            .await?
            .with_user_id(sender_id);
        self.sink.append_record(&record).await?;
        Ok(record)
    }

    async fn report(&self, error: &PipelineError) {
        self.diag
            .error_detail(error.stage(), &error.to_string(), &format!("{error:?}"))
            .await;
    }
}

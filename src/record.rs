use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

/// A running-activity record extracted from a summary-screen photo.
///
/// Every value is the display-formatted string the model read off the
/// screen — no unit conversion or date parsing happens downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningRecord {
    /// Activity date and time, `YYYY-MM-DD HH:MM`
    pub date: String,
    /// Distance in km, e.g. "5.20"
    pub distance: String,
    /// Elapsed time, `HH:MM:SS`
    pub time: String,
    /// Average pace per km, `MM:SS`. Some activity screens omit it.
    pub pace: Option<String>,
    /// Sender id, attached by the dispatcher after extraction.
    /// Never empty — "unknown" stands in when the event has no source user.
    pub user_id: String,
}

pub const UNKNOWN_USER: &str = "unknown";

/// The model's half of the record — `user_id` is not its business.
#[derive(Debug, Default, Deserialize)]
struct ModelAnswer {
    date: Option<String>,
    distance: Option<String>,
    time: Option<String>,
    pace: Option<String>,
}

impl RunningRecord {
    /// Parse a model answer into a record.
    ///
    /// The schema constraint requests bare JSON, but the model may wrap
    /// its answer in a fenced ```json block or ignore the contract
    /// entirely. A fenced block is unwrapped first; anything else must
    /// parse as-is. `date`, `distance` and `time` are mandatory.
    pub fn from_model_json(content: &str) -> Result<Self> {
        let answer: ModelAnswer = serde_json::from_str(extract_json(content))
            .context("model answer is not valid JSON")?;

        Ok(Self {
            date: require_field(answer.date, "date")?,
            distance: require_field(answer.distance, "distance")?,
            time: require_field(answer.time, "time")?,
            pace: answer.pace.filter(|p| !p.trim().is_empty()),
            user_id: UNKNOWN_USER.to_string(),
        })
    }

    /// Attach the sender id resolved from the webhook event. Called once,
    /// before the record is read anywhere else.
    pub fn with_user_id(mut self, sender_id: Option<&str>) -> Self {
        if let Some(id) = sender_id {
            if !id.is_empty() {
                self.user_id = id.to_string();
            }
        }
        self
    }
}

fn require_field(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("model answer is missing required field '{name}'"),
    }
}

/// Unwrap a fenced code block if the answer carries one.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let body = &trimmed[start + fence.len()..];
            let end = body.find("```").unwrap_or(body.len());
            return body[..end].trim();
        }
    }
    trimmed
}

/// Structured-output constraint sent with every extraction request:
/// the four record fields, nothing else, three of them mandatory.
/// Compliance is requested, not guaranteed — see [`RunningRecord::from_model_json`].
pub fn response_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "running_record",
            "schema": {
                "type": "object",
                "properties": {
                    "date": { "type": "string", "description": "日時 (YYYY-MM-DD HH:MM)" },
                    "distance": { "type": "string", "description": "走った距離 (km)" },
                    "time": { "type": "string", "description": "走った時間 (HH:MM:SS)" },
                    "pace": { "type": "string", "description": "1キロのペース (MM:SS/km)" }
                },
                "required": ["date", "distance", "time"],
                "additionalProperties": false
            }
        }
    })
}

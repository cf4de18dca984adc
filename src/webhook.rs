//! Untrusted webhook payload types and event classification.
//!
//! The payload body comes straight off the wire — everything here is
//! optional until [`WebhookEvent::classify`] has decided what the event
//! actually is.

use serde::Deserialize;

/// Top-level webhook body: `{ "events": [ ... ] }`.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub events: Vec<WebhookEvent>,
}

/// One platform event, exactly as delivered. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "replyToken")]
    pub reply_token: Option<String>,
    pub source: Option<EventSource>,
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct EventSource {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Option<String>,
    pub text: Option<String>,
}

/// A classified unit of work for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// An image message: enters the full extraction chain.
    Image {
        reply_token: String,
        attachment_id: String,
        sender_id: Option<String>,
    },
    /// A text message: echoed back verbatim (liveness path).
    Text {
        reply_token: String,
        text: String,
        sender_id: Option<String>,
    },
    /// Anything the pipeline does not handle. Logged, never replied to.
    Unsupported { kind: String },
}

/// Decode a raw webhook body. Failure here is terminal for the whole
/// request — there is no reply token to answer on.
pub fn parse_payload(body: &str) -> Result<WebhookPayload, serde_json::Error> {
    serde_json::from_str(body)
}

impl WebhookEvent {
    fn sender_id(&self) -> Option<String> {
        self.source
            .as_ref()
            .and_then(|s| s.user_id.clone())
            .filter(|id| !id.is_empty())
    }

    /// Classify this event. Message events missing a piece the chain
    /// needs (reply token, image id, text body) fall through to
    /// [`InboundEvent::Unsupported`] rather than entering a chain that
    /// could never reply.
    pub fn classify(&self) -> InboundEvent {
        if self.kind != "message" {
            return InboundEvent::Unsupported {
                kind: self.kind.clone(),
            };
        }

        let message = match &self.message {
            Some(m) => m,
            None => {
                return InboundEvent::Unsupported {
                    kind: "message".to_string(),
                }
            }
        };

        let reply_token = match &self.reply_token {
            Some(t) if !t.is_empty() => t.clone(),
            _ => {
                return InboundEvent::Unsupported {
                    kind: format!("message/{}", message.kind),
                }
            }
        };

        match message.kind.as_str() {
            "image" => match &message.id {
                Some(id) if !id.is_empty() => InboundEvent::Image {
                    reply_token,
                    attachment_id: id.clone(),
                    sender_id: self.sender_id(),
                },
                _ => InboundEvent::Unsupported {
                    kind: "message/image".to_string(),
                },
            },
            "text" => match &message.text {
                Some(text) => InboundEvent::Text {
                    reply_token,
                    text: text.clone(),
                    sender_id: self.sender_id(),
                },
                None => InboundEvent::Unsupported {
                    kind: "message/text".to_string(),
                },
            },
            other => InboundEvent::Unsupported {
                kind: format!("message/{other}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_event_json() -> String {
        r#"{
            "events": [{
                "type": "message",
                "replyToken": "token-1",
                "source": { "userId": "U1234" },
                "message": { "type": "image", "id": "msg-1" }
            }]
        }"#
        .to_string()
    }

    #[test]
    fn classifies_image_message() {
        let payload = parse_payload(&image_event_json()).unwrap();
        assert_eq!(payload.events.len(), 1);
        assert_eq!(
            payload.events[0].classify(),
            InboundEvent::Image {
                reply_token: "token-1".to_string(),
                attachment_id: "msg-1".to_string(),
                sender_id: Some("U1234".to_string()),
            }
        );
    }

    #[test]
    fn classifies_text_message() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token-2",
                "message": { "type": "text", "text": "hello" }
            }]
        }"#;
        let payload = parse_payload(body).unwrap();
        assert_eq!(
            payload.events[0].classify(),
            InboundEvent::Text {
                reply_token: "token-2".to_string(),
                text: "hello".to_string(),
                sender_id: None,
            }
        );
    }

    #[test]
    fn non_message_events_are_unsupported() {
        let body = r#"{"events": [{ "type": "follow", "replyToken": "token-3" }]}"#;
        let payload = parse_payload(body).unwrap();
        assert_eq!(
            payload.events[0].classify(),
            InboundEvent::Unsupported {
                kind: "follow".to_string()
            }
        );
    }

    #[test]
    fn unknown_message_kinds_are_unsupported() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token-4",
                "message": { "type": "sticker", "id": "s-1" }
            }]
        }"#;
        let payload = parse_payload(body).unwrap();
        assert_eq!(
            payload.events[0].classify(),
            InboundEvent::Unsupported {
                kind: "message/sticker".to_string()
            }
        );
    }

    #[test]
    fn image_without_id_is_unsupported() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token-5",
                "message": { "type": "image" }
            }]
        }"#;
        let payload = parse_payload(body).unwrap();
        assert!(matches!(
            payload.events[0].classify(),
            InboundEvent::Unsupported { .. }
        ));
    }

    #[test]
    fn message_without_reply_token_is_unsupported() {
        let body = r#"{
            "events": [{
                "type": "message",
                "message": { "type": "image", "id": "msg-9" }
            }]
        }"#;
        let payload = parse_payload(body).unwrap();
        assert!(matches!(
            payload.events[0].classify(),
            InboundEvent::Unsupported { .. }
        ));
    }

    #[test]
    fn empty_sender_id_is_dropped() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token-6",
                "source": { "userId": "" },
                "message": { "type": "text", "text": "hi" }
            }]
        }"#;
        let payload = parse_payload(body).unwrap();
        match payload.events[0].classify() {
            InboundEvent::Text { sender_id, .. } => assert_eq!(sender_id, None),
            other => panic!("expected text event, got {other:?}"),
        }
    }

    #[test]
    fn body_without_events_is_malformed() {
        assert!(parse_payload("{}").is_err());
        assert!(parse_payload("not json at all").is_err());
    }

    #[test]
    fn empty_event_list_is_valid() {
        let payload = parse_payload(r#"{"events": []}"#).unwrap();
        assert!(payload.events.is_empty());
    }
}

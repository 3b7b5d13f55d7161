//! Inbound LINE webhook payload: envelope, wire events, and the typed events handlers consume.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Single-use reply credential. Not `Clone`: spending it moves it.
#[derive(Debug, PartialEq, Eq)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Consume the token, yielding the raw value for exactly one send call.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Webhook POST body. Events are kept raw so one malformed event does not reject its siblings.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub destination: Option<String>,
    pub events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WireEvent {
    #[serde(rename_all = "camelCase")]
    Message {
        reply_token: String,
        #[serde(default)]
        source: Option<WireSource>,
        #[serde(default)]
        timestamp: Option<i64>,
        #[serde(default)]
        webhook_event_id: Option<String>,
        message: WireMessage,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSource {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WireMessage {
    Text { text: String },
    Image { id: String },
    #[serde(other)]
    Unsupported,
}

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text { text: String },
    Image { media_id: String },
}

/// A message event the relay knows how to handle.
#[derive(Debug)]
pub struct InboundEvent {
    pub reply_token: ReplyToken,
    /// Push recipient. Absent for some group/room sources.
    pub source_user_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub webhook_event_id: Option<String>,
    pub content: InboundContent,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Typed events in delivery order. Unsupported kinds and malformed events are skipped.
    pub fn into_events(self) -> Vec<InboundEvent> {
        self.events
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| match serde_json::from_value::<WireEvent>(raw) {
                Ok(ev) => typed_event(ev),
                Err(e) => {
                    log::debug!("webhook: skipping malformed event #{}: {}", i, e);
                    None
                }
            })
            .collect()
    }
}

fn typed_event(ev: WireEvent) -> Option<InboundEvent> {
    let WireEvent::Message {
        reply_token,
        source,
        timestamp,
        webhook_event_id,
        message,
    } = ev
    else {
        log::debug!("webhook: ignoring non-message event");
        return None;
    };
    let content = match message {
        WireMessage::Text { text } => InboundContent::Text { text },
        WireMessage::Image { id } => InboundContent::Image { media_id: id },
        WireMessage::Unsupported => {
            log::debug!("webhook: ignoring unsupported message type");
            return None;
        }
    };
    Some(InboundEvent {
        reply_token: ReplyToken::new(reply_token),
        source_user_id: source.and_then(|s| s.user_id),
        timestamp: timestamp.and_then(DateTime::from_timestamp_millis),
        webhook_event_id,
        content,
    })
}

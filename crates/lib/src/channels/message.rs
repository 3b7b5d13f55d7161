//! Outbound LINE message objects (the `messages` array of reply/push calls).

use serde::Serialize;

/// Max messages accepted by one reply or push call.
pub const MAX_MESSAGES_PER_CALL: usize = 5;

/// Max characters of a flex message `altText`.
pub const MAX_ALT_TEXT_CHARS: usize = 400;

/// One message object as sent to the Messaging API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SendMessage {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: FlexContainer,
    },
}

impl SendMessage {
    pub fn text(text: impl Into<String>) -> Self {
        SendMessage::Text { text: text.into() }
    }

    /// Number of bubbles for flex carousels, 1 otherwise.
    pub fn item_count(&self) -> usize {
        match self {
            SendMessage::Text { .. } => 1,
            SendMessage::Flex { contents, .. } => match contents {
                FlexContainer::Bubble { .. } => 1,
                FlexContainer::Carousel { contents } => contents.len(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlexContainer {
    Bubble { body: FlexComponent },
    Carousel { contents: Vec<FlexContainer> },
}

impl FlexContainer {
    /// A bubble whose body is a single wrapped text block.
    pub fn text_bubble(text: impl Into<String>) -> Self {
        FlexContainer::Bubble {
            body: FlexComponent::Box {
                layout: "vertical".to_string(),
                contents: vec![FlexComponent::Text {
                    text: text.into(),
                    wrap: true,
                }],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlexComponent {
    Box {
        layout: String,
        contents: Vec<FlexComponent>,
    },
    Text {
        text: String,
        wrap: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_message_wire_shape() {
        let v = serde_json::to_value(SendMessage::text("hi")).unwrap();
        assert_eq!(v, json!({ "type": "text", "text": "hi" }));
    }

    #[test]
    fn carousel_wire_shape() {
        let msg = SendMessage::Flex {
            alt_text: "alt".to_string(),
            contents: FlexContainer::Carousel {
                contents: vec![FlexContainer::text_bubble("a")],
            },
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "flex",
                "altText": "alt",
                "contents": {
                    "type": "carousel",
                    "contents": [{
                        "type": "bubble",
                        "body": {
                            "type": "box",
                            "layout": "vertical",
                            "contents": [{ "type": "text", "text": "a", "wrap": true }]
                        }
                    }]
                }
            })
        );
        assert_eq!(msg.item_count(), 1);
    }
}

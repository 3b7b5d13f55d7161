//! Turns chunked units into one send call's worth of LINE message objects.

use crate::channels::{FlexContainer, SendMessage, MAX_ALT_TEXT_CHARS, MAX_MESSAGES_PER_CALL};
use crate::config::MessageStyle;

/// Bubbles grouped into one carousel message.
pub const BUBBLES_PER_CAROUSEL: usize = 3;

/// Ordered messages for a single reply or push call (never more than [`MAX_MESSAGES_PER_CALL`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageBatch {
    messages: Vec<SendMessage>,
}

impl MessageBatch {
    /// A batch holding one plain text message.
    pub fn single_text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![SendMessage::text(text)],
        }
    }

    pub fn messages(&self) -> &[SendMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Build the batch for `units` in the configured style. Content past the caps is dropped.
pub fn build_batch(units: &[String], style: MessageStyle) -> MessageBatch {
    let messages = match style {
        MessageStyle::Text => text_messages(units),
        MessageStyle::Carousel => carousel_messages(units),
    };
    MessageBatch { messages }
}

fn text_messages(units: &[String]) -> Vec<SendMessage> {
    if units.len() > MAX_MESSAGES_PER_CALL {
        log::debug!(
            "builder: dropping {} text unit(s) past the per-call limit",
            units.len() - MAX_MESSAGES_PER_CALL
        );
    }
    units
        .iter()
        .take(MAX_MESSAGES_PER_CALL)
        .map(|u| SendMessage::text(u.as_str()))
        .collect()
}

fn carousel_messages(units: &[String]) -> Vec<SendMessage> {
    let capacity = BUBBLES_PER_CAROUSEL * MAX_MESSAGES_PER_CALL;
    if units.len() > capacity {
        log::debug!(
            "builder: dropping {} bubble(s) past the carousel limit",
            units.len() - capacity
        );
    }
    units
        .chunks(BUBBLES_PER_CAROUSEL)
        .take(MAX_MESSAGES_PER_CALL)
        .map(|group| SendMessage::Flex {
            alt_text: alt_text(&group[0]),
            contents: FlexContainer::Carousel {
                contents: group
                    .iter()
                    .map(|u| FlexContainer::text_bubble(u.as_str()))
                    .collect(),
            },
        })
        .collect()
}

fn alt_text(unit: &str) -> String {
    unit.chars().take(MAX_ALT_TEXT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("unit {}", i)).collect()
    }

    fn texts(batch: &MessageBatch) -> Vec<String> {
        batch
            .messages()
            .iter()
            .map(|m| match m {
                SendMessage::Text { text } => text.clone(),
                other => panic!("expected text, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn text_style_one_message_per_unit() {
        let batch = build_batch(&units(3), MessageStyle::Text);
        assert_eq!(texts(&batch), units(3));
    }

    #[test]
    fn text_style_truncates_to_five() {
        let batch = build_batch(&units(8), MessageStyle::Text);
        assert_eq!(batch.len(), 5);
        assert_eq!(texts(&batch), units(5));
    }

    #[test]
    fn empty_units_give_empty_batch() {
        assert!(build_batch(&[], MessageStyle::Text).is_empty());
        assert!(build_batch(&[], MessageStyle::Carousel).is_empty());
    }

    #[test]
    fn carousel_groups_three_bubbles() {
        let batch = build_batch(&units(7), MessageStyle::Carousel);
        let counts: Vec<usize> = batch.messages().iter().map(|m| m.item_count()).collect();
        assert_eq!(counts, vec![3, 3, 1]);
        match &batch.messages()[1] {
            SendMessage::Flex { alt_text, contents } => {
                assert_eq!(alt_text, "unit 4");
                assert_eq!(
                    contents,
                    &FlexContainer::Carousel {
                        contents: vec![
                            FlexContainer::text_bubble("unit 4"),
                            FlexContainer::text_bubble("unit 5"),
                            FlexContainer::text_bubble("unit 6"),
                        ]
                    }
                );
            }
            other => panic!("expected flex, got {:?}", other),
        }
    }

    #[test]
    fn carousel_caps_at_five_groups() {
        let batch = build_batch(&units(20), MessageStyle::Carousel);
        assert_eq!(batch.len(), 5);
        let bubbles: usize = batch.messages().iter().map(|m| m.item_count()).sum();
        assert_eq!(bubbles, 15);
    }

    #[test]
    fn alt_text_is_limited() {
        let long = "あ".repeat(1000);
        let batch = build_batch(&[long], MessageStyle::Carousel);
        match &batch.messages()[0] {
            SendMessage::Flex { alt_text, .. } => {
                assert_eq!(alt_text.chars().count(), MAX_ALT_TEXT_CHARS)
            }
            other => panic!("expected flex, got {:?}", other),
        }
    }
}

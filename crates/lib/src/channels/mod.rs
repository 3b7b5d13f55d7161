//! LINE channel: webhook payload model, signature check, outbound message objects and the
//! Messaging API client.
//!
//! Handlers only see [`MessagingApi`]; the delivery coordinator is the one caller of its send
//! operations.

mod line;
mod message;
mod signature;
mod webhook;

pub use line::{LineClient, LineError, MediaContent, MessagingApi};
pub use message::{
    FlexComponent, FlexContainer, SendMessage, MAX_ALT_TEXT_CHARS, MAX_MESSAGES_PER_CALL,
};
pub use signature::{sign_body, verify_signature, SIGNATURE_HEADER};
pub use webhook::{InboundContent, InboundEvent, ReplyToken, WebhookEnvelope};

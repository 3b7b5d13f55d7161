//! Delivery coordinator: the only caller of the platform's send operations.
//!
//! State per event: `Pending → ImmediateReplySent | ImmediateReplyFailed → PushAttempted →
//! PushSucceeded | PushFailed`. The reply token is taken by value, so it can reach at most one
//! send call; everything after that goes to the user id via push.

use crate::channels::{MessagingApi, ReplyToken};
use crate::delivery::MessageBatch;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    ImmediateReplySent,
    ImmediateReplyFailed,
    PushAttempted,
    PushSucceeded,
    PushFailed,
}

impl DeliveryState {
    fn can_move_to(self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Pending, ImmediateReplySent)
                | (Pending, ImmediateReplyFailed)
                | (Pending, PushAttempted)
                | (ImmediateReplySent, PushAttempted)
                | (ImmediateReplyFailed, PushAttempted)
                | (PushAttempted, PushSucceeded)
                | (PushAttempted, PushFailed)
        )
    }
}

/// Terminal result of delivering one event's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    RepliedWithToken,
    Pushed,
    PartiallyDelivered { delivered: usize, total: usize },
    Failed,
}

/// Tracks one event's delivery state; logs every transition.
struct Progress {
    event: String,
    state: DeliveryState,
}

impl Progress {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            state: DeliveryState::Pending,
        }
    }

    fn advance(&mut self, next: DeliveryState) {
        debug_assert!(
            self.state.can_move_to(next),
            "invalid delivery transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("delivery[{}]: {:?} -> {:?}", self.event, self.state, next);
        self.state = next;
    }
}

/// Sends batches for handlers. Cheap to clone; shares the platform client.
#[derive(Clone)]
pub struct DeliveryCoordinator {
    api: Arc<dyn MessagingApi>,
    push_fallback: bool,
}

impl DeliveryCoordinator {
    pub fn new(api: Arc<dyn MessagingApi>, push_fallback: bool) -> Self {
        Self { api, push_fallback }
    }

    /// Direct reply: one reply call with the whole batch. On rejection the token is abandoned and,
    /// when fallback is on and a user id is known, each message is pushed in order until the first
    /// failure.
    pub async fn reply_or_push(
        &self,
        event: &str,
        reply_token: ReplyToken,
        user_id: Option<&str>,
        batch: &MessageBatch,
    ) -> DeliveryOutcome {
        if batch.is_empty() {
            log::warn!("delivery[{}]: nothing to send", event);
            return DeliveryOutcome::Failed;
        }
        let mut progress = Progress::new(event);
        let token = reply_token.into_inner();
        match self.api.reply(&token, batch.messages()).await {
            Ok(()) => {
                progress.advance(DeliveryState::ImmediateReplySent);
                return DeliveryOutcome::RepliedWithToken;
            }
            Err(e) => {
                log::warn!("delivery[{}]: reply failed: {}", event, e);
                progress.advance(DeliveryState::ImmediateReplyFailed);
            }
        }
        if !self.push_fallback {
            return DeliveryOutcome::Failed;
        }
        let Some(user_id) = user_id else {
            log::warn!("delivery[{}]: no user id, cannot fall back to push", event);
            return DeliveryOutcome::Failed;
        };
        self.push_each(&mut progress, user_id, batch).await
    }

    /// Spend the reply token on a short acknowledgement. Best effort: failure is logged only.
    pub async fn acknowledge(&self, event: &str, reply_token: ReplyToken, text: &str) -> bool {
        let mut progress = Progress::new(event);
        let ack = MessageBatch::single_text(text);
        match self.api.reply(&reply_token.into_inner(), ack.messages()).await {
            Ok(()) => {
                progress.advance(DeliveryState::ImmediateReplySent);
                true
            }
            Err(e) => {
                log::warn!("delivery[{}]: acknowledgement failed: {}", event, e);
                progress.advance(DeliveryState::ImmediateReplyFailed);
                false
            }
        }
    }

    /// Deliver the whole batch with one push call (after the token was spent on an acknowledgement).
    pub async fn push(&self, event: &str, user_id: &str, batch: &MessageBatch) -> DeliveryOutcome {
        if batch.is_empty() {
            log::warn!("delivery[{}]: nothing to push", event);
            return DeliveryOutcome::Failed;
        }
        // the token was handled by acknowledge(), possibly on another task
        let mut progress = Progress::new(event);
        progress.advance(DeliveryState::PushAttempted);
        match self.api.push(user_id, batch.messages()).await {
            Ok(()) => {
                progress.advance(DeliveryState::PushSucceeded);
                DeliveryOutcome::Pushed
            }
            Err(e) => {
                log::warn!("delivery[{}]: push failed: {}", event, e);
                progress.advance(DeliveryState::PushFailed);
                DeliveryOutcome::Failed
            }
        }
    }

    async fn push_each(
        &self,
        progress: &mut Progress,
        user_id: &str,
        batch: &MessageBatch,
    ) -> DeliveryOutcome {
        progress.advance(DeliveryState::PushAttempted);
        let total = batch.len();
        let mut delivered = 0;
        for message in batch.messages() {
            if let Err(e) = self.api.push(user_id, std::slice::from_ref(message)).await {
                log::warn!(
                    "delivery[{}]: push {} of {} failed, stopping: {}",
                    progress.event,
                    delivered + 1,
                    total,
                    e
                );
                break;
            }
            delivered += 1;
        }
        if delivered == total {
            progress.advance(DeliveryState::PushSucceeded);
            DeliveryOutcome::Pushed
        } else {
            progress.advance(DeliveryState::PushFailed);
            if delivered == 0 {
                DeliveryOutcome::Failed
            } else {
                DeliveryOutcome::PartiallyDelivered { delivered, total }
            }
        }
    }
}

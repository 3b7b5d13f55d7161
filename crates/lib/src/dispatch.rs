//! Routes verified webhook events to the recipe handlers.

use crate::channels::{InboundContent, InboundEvent, WebhookEnvelope};
use crate::recipe::{Handled, RecipeService};

/// Parse a verified body and handle its events. Only a body that is not an envelope at all is
/// an error; unsupported or malformed events inside it are skipped.
pub async fn dispatch_body(
    service: &RecipeService,
    body: &[u8],
) -> Result<Vec<Handled>, serde_json::Error> {
    let envelope = WebhookEnvelope::parse(body)?;
    let events = envelope.into_events();
    log::debug!("dispatch: {} supported event(s)", events.len());
    Ok(dispatch(service, events).await)
}

/// Handle each event in order. Handlers never fail outward, so one event cannot stop the next.
/// Deferred work keeps running on its own task whether or not the caller keeps the handles.
pub async fn dispatch(service: &RecipeService, events: Vec<InboundEvent>) -> Vec<Handled> {
    let mut handled = Vec::with_capacity(events.len());
    for (i, event) in events.into_iter().enumerate() {
        let label = event
            .webhook_event_id
            .clone()
            .unwrap_or_else(|| format!("#{}", i));
        let InboundEvent {
            reply_token,
            source_user_id,
            content,
            ..
        } = event;
        let result = match content {
            InboundContent::Text { text } => {
                log::info!("dispatch[{}]: text message", label);
                service
                    .handle_text(&label, reply_token, source_user_id, &text)
                    .await
            }
            InboundContent::Image { media_id } => {
                log::info!("dispatch[{}]: image message {}", label, media_id);
                service
                    .handle_image(&label, reply_token, source_user_id, &media_id)
                    .await
            }
        };
        match &result {
            Handled::Delivered(outcome) => {
                log::info!("dispatch[{}]: delivered: {:?}", label, outcome)
            }
            Handled::Deferred(_) => {
                log::info!("dispatch[{}]: acknowledged, result deferred", label)
            }
        }
        handled.push(result);
    }
    handled
}

//! Recipe handlers: turn a text or photo of ingredients into recipe text and hand it to the
//! delivery coordinator.
//!
//! Text events use the configured strategy. Photo events always acknowledge first, since they
//! need two generation calls (vision, then recipe) which outlast the reply token.

use crate::channels::{LineError, MediaContent, MessagingApi, ReplyToken};
use crate::config::{MessageStyle, RelaySettings, ReplyStrategy};
use crate::delivery::{
    build_batch, chunk_text, ChunkOptions, DeliveryCoordinator, DeliveryOutcome, MessageBatch,
};
use crate::llm::{
    generate_within, ChatMessage, ContentPart, GenerationRequest, Generator, LlmError,
};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sent instead of the recipe when generation fails.
pub const GENERATION_APOLOGY: &str = "ごめんなさい、レシピの生成中にエラーが発生しちゃった…";

/// Sent when a photo cannot be downloaded or read.
pub const IMAGE_APOLOGY: &str = "ごめんなさい、画像の読み込み中にエラーが発生しちゃった…";

const SYSTEM_PROMPT: &str = "あなたは料理の達人で、かわいくレシピを紹介するガイドです。";

const INGREDIENT_SYSTEM_PROMPT: &str = "あなたは写真から食材を見分ける料理アシスタントです。";

const INGREDIENT_PROMPT: &str =
    "この写真に写っている食材を「、」区切りの一行で列挙してください。食材以外は書かないでください。";

fn recipe_prompt(ingredients: &str) -> String {
    format!(
        "以下の材料で作れるレシピを3つ考えてください:\n材料: {}\nかわいく説明してね💕",
        ingredients
    )
}

#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error("fetching image content failed: {0}")]
    ContentFetch(#[from] LineError),
    #[error("reading image content failed: {0}")]
    ContentIo(#[from] std::io::Error),
}

/// Handler settings derived once from the resolved config.
#[derive(Debug, Clone)]
pub struct RecipeSettings {
    pub model: String,
    pub vision_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Option<Duration>,
    pub chunk: ChunkOptions,
    pub style: MessageStyle,
    pub text_strategy: ReplyStrategy,
    pub push_fallback: bool,
    pub acknowledgement: String,
}

impl RecipeSettings {
    pub fn from_settings(settings: &RelaySettings) -> Self {
        let generation = &settings.config.generation;
        let delivery = &settings.config.delivery;
        Self {
            model: generation.model.clone(),
            vision_model: generation.vision_model.clone(),
            max_tokens: generation.max_tokens,
            temperature: generation.temperature,
            timeout: settings.generation_timeout(),
            chunk: ChunkOptions::from_config(delivery),
            style: delivery.style,
            text_strategy: delivery.text_strategy,
            push_fallback: delivery.push_fallback,
            acknowledgement: delivery.acknowledgement.clone(),
        }
    }
}

/// How a handler finished on the request path.
#[derive(Debug)]
pub enum Handled {
    /// Delivery completed before returning.
    Delivered(DeliveryOutcome),
    /// Acknowledged; the rest runs on a detached task. Dropping the handle does not cancel it.
    Deferred(JoinHandle<DeliveryOutcome>),
}

/// Shared handler context: clients, coordinator, and settings. Cheap to clone.
#[derive(Clone)]
pub struct RecipeService {
    generator: Arc<dyn Generator>,
    /// Content downloads only; sends go through `coordinator`.
    messaging: Arc<dyn MessagingApi>,
    coordinator: DeliveryCoordinator,
    settings: Arc<RecipeSettings>,
}

impl RecipeService {
    pub fn new(
        generator: Arc<dyn Generator>,
        messaging: Arc<dyn MessagingApi>,
        settings: RecipeSettings,
    ) -> Self {
        let coordinator = DeliveryCoordinator::new(messaging.clone(), settings.push_fallback);
        Self {
            generator,
            messaging,
            coordinator,
            settings: Arc::new(settings),
        }
    }

    /// Text event: the message is the ingredient list.
    pub async fn handle_text(
        &self,
        event: &str,
        reply_token: ReplyToken,
        user_id: Option<String>,
        text: &str,
    ) -> Handled {
        let ingredients = text.trim().to_string();
        match (self.settings.text_strategy, user_id) {
            (ReplyStrategy::Acknowledge, Some(user_id)) => {
                self.acknowledge_then(event, reply_token, user_id, move |svc| async move {
                    svc.reply_text(svc.recipe_text(&ingredients).await)
                })
                .await
            }
            (_, user_id) => {
                let text = self.reply_text(self.recipe_text(&ingredients).await);
                let batch = self.batch_for(&text);
                let outcome = self
                    .coordinator
                    .reply_or_push(event, reply_token, user_id.as_deref(), &batch)
                    .await;
                Handled::Delivered(outcome)
            }
        }
    }

    /// Image event: detect ingredients in the photo, then generate recipes from them.
    /// Without a user id nothing can be pushed later, so the reply token waits for the result.
    pub async fn handle_image(
        &self,
        event: &str,
        reply_token: ReplyToken,
        user_id: Option<String>,
        media_id: &str,
    ) -> Handled {
        let media_id = media_id.to_string();
        match user_id {
            Some(user_id) => {
                self.acknowledge_then(event, reply_token, user_id, move |svc| async move {
                    svc.image_reply_text(&media_id).await
                })
                .await
            }
            None => {
                log::info!(
                    "recipe[{}]: image from source without user id, replying directly",
                    event
                );
                let text = self.image_reply_text(&media_id).await;
                let batch = self.batch_for(&text);
                let outcome = self
                    .coordinator
                    .reply_or_push(event, reply_token, None, &batch)
                    .await;
                Handled::Delivered(outcome)
            }
        }
    }

    /// Spend the token on the acknowledgement, then produce and push the reply on a detached task.
    async fn acknowledge_then<F, Fut>(
        &self,
        event: &str,
        reply_token: ReplyToken,
        user_id: String,
        produce: F,
    ) -> Handled
    where
        F: FnOnce(RecipeService) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = String> + Send + 'static,
    {
        self.coordinator
            .acknowledge(event, reply_token, &self.settings.acknowledgement)
            .await;
        let svc = self.clone();
        let event = event.to_string();
        let handle = tokio::spawn(async move {
            let text = produce(svc.clone()).await;
            let batch = svc.batch_for(&text);
            let outcome = svc.coordinator.push(&event, &user_id, &batch).await;
            log::info!("recipe[{}]: deferred delivery finished: {:?}", event, outcome);
            outcome
        });
        Handled::Deferred(handle)
    }

    /// Generated text, or the fixed apology when generation failed.
    fn reply_text(&self, result: Result<String, RecipeError>) -> String {
        match result {
            Ok(text) => text,
            Err(e) => {
                log::error!("recipe: {}", e);
                GENERATION_APOLOGY.to_string()
            }
        }
    }

    fn batch_for(&self, text: &str) -> MessageBatch {
        let units = chunk_text(text, &self.settings.chunk);
        if units.is_empty() {
            log::warn!("recipe: reply text produced no units, sending apology");
            return MessageBatch::single_text(GENERATION_APOLOGY);
        }
        build_batch(&units, self.settings.style)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, RecipeError> {
        let text =
            generate_within(self.generator.as_ref(), &request, self.settings.timeout).await?;
        Ok(text)
    }

    async fn recipe_text(&self, ingredients: &str) -> Result<String, RecipeError> {
        self.generate(GenerationRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(recipe_prompt(ingredients)),
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        })
        .await
    }

    async fn ingredients_from_image(&self, data_uri: String) -> Result<String, RecipeError> {
        self.generate(GenerationRequest {
            model: self.settings.vision_model.clone(),
            messages: vec![
                ChatMessage::system(INGREDIENT_SYSTEM_PROMPT),
                ChatMessage::user_parts(vec![
                    ContentPart::text(INGREDIENT_PROMPT),
                    ContentPart::image_url(data_uri),
                ]),
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        })
        .await
    }

    /// Full photo pipeline. A failed download yields the image apology without any generation call.
    async fn image_reply_text(&self, media_id: &str) -> String {
        let data_uri = match self.load_image(media_id).await {
            Ok(uri) => uri,
            Err(e) => {
                log::error!("recipe: {}", e);
                return IMAGE_APOLOGY.to_string();
            }
        };
        let recipe = match self.ingredients_from_image(data_uri).await {
            Ok(ingredients) => {
                log::debug!("recipe: detected ingredients: {}", ingredients);
                self.recipe_text(&ingredients).await
            }
            Err(e) => Err(e),
        };
        self.reply_text(recipe)
    }

    /// Download into a temp file and encode it; the file is gone when this returns.
    async fn load_image(&self, media_id: &str) -> Result<String, RecipeError> {
        let media = self.messaging.fetch_content(media_id).await?;
        let uri = data_uri(&media).await?;
        Ok(uri)
    }
}

async fn data_uri(media: &MediaContent) -> std::io::Result<String> {
    let bytes = media.read_bytes().await?;
    let mime = media
        .content_type
        .as_deref()
        .filter(|t| t.starts_with("image/"))
        .unwrap_or("image/jpeg");
    Ok(format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

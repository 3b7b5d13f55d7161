//! LINE Messaging API client: reply, push, and message content download.

use crate::channels::message::SendMessage;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("line content io: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloaded message content, held in a temp file that is removed when this value drops.
#[derive(Debug)]
pub struct MediaContent {
    pub file: NamedTempFile,
    pub content_type: Option<String>,
}

impl MediaContent {
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    /// Write `stream` into `file` and take ownership of it. On any error `file` is dropped, which
    /// removes it from disk.
    pub async fn spool<S, B, E>(
        file: NamedTempFile,
        stream: S,
        content_type: Option<String>,
    ) -> Result<Self, LineError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        LineError: From<E>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut out = tokio::fs::File::from_std(file.reopen()?);
        while let Some(chunk) = stream.next().await {
            out.write_all(chunk?.as_ref()).await?;
        }
        out.flush().await?;
        Ok(Self { file, content_type })
    }
}

/// Outbound operations against the messaging platform. Shared read-only by all handlers.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Reply with a single-use token. Fails if the token is expired, reused or invalid.
    async fn reply(&self, reply_token: &str, messages: &[SendMessage]) -> Result<(), LineError>;
    /// Push to a user id. Not token-gated.
    async fn push(&self, user_id: &str, messages: &[SendMessage]) -> Result<(), LineError>;
    /// Download the binary content of a message (e.g. an image) into a temp file.
    async fn fetch_content(&self, message_id: &str) -> Result<MediaContent, LineError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [SendMessage],
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: &'a [SendMessage],
}

/// HTTP client for the Messaging API, authenticated with the channel access token.
#[derive(Clone)]
pub struct LineClient {
    api_base: String,
    data_api_base: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineClient {
    pub fn new(access_token: String, api_base: &str, data_api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            data_api_base: data_api_base.trim_end_matches('/').to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), LineError> {
        let res = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingApi for LineClient {
    /// POST /v2/bot/message/reply
    async fn reply(&self, reply_token: &str, messages: &[SendMessage]) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        self.post_json(
            &url,
            &ReplyRequest {
                reply_token,
                messages,
            },
        )
        .await
    }

    /// POST /v2/bot/message/push
    async fn push(&self, user_id: &str, messages: &[SendMessage]) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/push", self.api_base);
        self.post_json(
            &url,
            &PushRequest {
                to: user_id,
                messages,
            },
        )
        .await
    }

    /// GET /v2/bot/message/{id}/content on the data host, streamed into a temp file.
    async fn fetch_content(&self, message_id: &str) -> Result<MediaContent, LineError> {
        let url = format!(
            "{}/v2/bot/message/{}/content",
            self.data_api_base, message_id
        );
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api { status, body });
        }
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let file = NamedTempFile::new()?;
        MediaContent::spool(file, res.bytes_stream(), content_type).await
    }
}

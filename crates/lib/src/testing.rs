//! In-memory fakes for the platform and generation clients (unit tests only).

use crate::channels::{LineError, MediaContent, MessagingApi, SendMessage};
use crate::llm::{GenerationRequest, Generator, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// One recorded send attempt (successful or not).
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Reply {
        token: String,
        messages: Vec<SendMessage>,
    },
    Push {
        to: String,
        messages: Vec<SendMessage>,
    },
}

#[derive(Default)]
pub struct FakeMessaging {
    sent: Mutex<Vec<Sent>>,
    reject_replies: bool,
    fail_push_at: Option<usize>,
    push_attempts: AtomicUsize,
    content: Option<(Vec<u8>, String)>,
    fetches: AtomicUsize,
    content_paths: Mutex<Vec<PathBuf>>,
}

impl FakeMessaging {
    /// Every reply call fails as if the token were invalid.
    pub fn reject_replies(mut self) -> Self {
        self.reject_replies = true;
        self
    }

    /// The push attempt with this zero-based index (and every later one) fails.
    pub fn fail_push_at(mut self, index: usize) -> Self {
        self.fail_push_at = Some(index);
        self
    }

    /// Content returned by fetch_content. Without it, fetches fail with 404.
    pub fn with_content(mut self, bytes: &[u8], content_type: &str) -> Self {
        self.content = Some((bytes.to_vec(), content_type.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn reply_tokens(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Reply { token, .. } => Some(token),
                Sent::Push { .. } => None,
            })
            .collect()
    }

    pub fn push_attempts(&self) -> usize {
        self.push_attempts.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Temp file paths handed out by fetch_content.
    pub fn content_paths(&self) -> Vec<PathBuf> {
        self.content_paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingApi for FakeMessaging {
    async fn reply(&self, reply_token: &str, messages: &[SendMessage]) -> Result<(), LineError> {
        self.sent.lock().unwrap().push(Sent::Reply {
            token: reply_token.to_string(),
            messages: messages.to_vec(),
        });
        if self.reject_replies {
            return Err(LineError::Api {
                status: 400,
                body: r#"{"message":"Invalid reply token"}"#.to_string(),
            });
        }
        Ok(())
    }

    async fn push(&self, user_id: &str, messages: &[SendMessage]) -> Result<(), LineError> {
        self.sent.lock().unwrap().push(Sent::Push {
            to: user_id.to_string(),
            messages: messages.to_vec(),
        });
        let attempt = self.push_attempts.fetch_add(1, Ordering::SeqCst);
        match self.fail_push_at {
            Some(index) if attempt >= index => Err(LineError::Api {
                status: 500,
                body: "push failed".to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn fetch_content(&self, _message_id: &str) -> Result<MediaContent, LineError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let Some((bytes, content_type)) = &self.content else {
            return Err(LineError::Api {
                status: 404,
                body: "not found".to_string(),
            });
        };
        let file = tempfile::NamedTempFile::new()?;
        self.content_paths
            .lock()
            .unwrap()
            .push(file.path().to_path_buf());
        let chunks = [Ok::<_, std::io::Error>(bytes.as_slice())];
        MediaContent::spool(
            file,
            futures_util::stream::iter(chunks),
            Some(content_type.clone()),
        )
        .await
    }
}

/// Scripted generator: answers calls in order, records every request.
#[derive(Default)]
pub struct FakeGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn replying(texts: &[&str]) -> Self {
        let g = Self::default();
        g.responses
            .lock()
            .unwrap()
            .extend(texts.iter().map(|t| Ok(t.to_string())));
        g
    }

    pub fn failing() -> Self {
        let g = Self::default();
        g.responses
            .lock()
            .unwrap()
            .push_back(Err("service unavailable".to_string()));
        g
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(LlmError::Api(e)),
            None => Err(LlmError::Api("no scripted response".to_string())),
        }
    }
}

/// Poll `done` until it holds; detached tasks finish on their own schedule.
pub async fn eventually(done: impl Fn() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

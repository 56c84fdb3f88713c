use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{core::{Document, LowLevelClient}, error::AIError};

/// Scripted outcome of one mock call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Text(String),
    Error(AIError),
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn error(error: impl Into<AIError>) -> Self {
        Self::Error(error.into())
    }
}

/// A call observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt_len: usize,
    pub document: Document,
}

/// Shared control surface for a `MockClient` and all of its clones.
#[derive(Debug, Default)]
pub struct MockHandle {
    queue: Mutex<VecDeque<MockResponse>>,
    fallback: Mutex<Option<MockResponse>>,
    calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHandle {
    /// Queue a response; queued responses are served first, in order.
    pub fn push(&self, response: MockResponse) {
        lock(&self.queue).push_back(response);
    }

    /// Served whenever the queue is empty.
    pub fn set_fallback(&self, response: MockResponse) {
        *lock(&self.fallback) = Some(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.recorded).clone()
    }

    fn next(&self, prompt_len: usize, document: Document) -> MockResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded).push(RecordedCall { prompt_len, document });
        if let Some(response) = lock(&self.queue).pop_front() {
            return response;
        }
        lock(&self.fallback)
            .clone()
            .unwrap_or_else(|| MockResponse::Error(AIError::Mock("no scripted response left".to_string())))
    }
}

/// Mock client for testing that serves scripted responses.
#[derive(Debug, Clone)]
pub struct MockClient {
    handle: Arc<MockHandle>,
}

impl MockClient {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone() }, handle)
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let (client, handle) = Self::new();
        for response in responses {
            handle.push(response);
        }
        (client, handle)
    }

    /// A client that fails every call with `error`.
    pub fn always_failing(error: AIError) -> (Self, Arc<MockHandle>) {
        let (client, handle) = Self::new();
        handle.set_fallback(MockResponse::Error(error));
        (client, handle)
    }
}

#[async_trait]
impl LowLevelClient for MockClient {
    async fn ask_raw(&self, prompt: String, document: Document) -> Result<String, AIError> {
        match self.handle.next(prompt.len(), document) {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Error(e) => Err(e),
        }
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_queue_then_fallback() {
        let (client, handle) = MockClient::with_responses(vec![MockResponse::text("first")]);
        handle.set_fallback(MockResponse::text("again"));

        let doc = Document::pdf(vec![1, 2, 3]);
        assert_eq!(client.ask_raw("p".into(), doc.clone()).await.unwrap(), "first");
        assert_eq!(client.ask_raw("p".into(), doc.clone()).await.unwrap(), "again");
        assert_eq!(client.clone_box().ask_raw("p".into(), doc).await.unwrap(), "again");
        assert_eq!(handle.call_count(), 3);
        assert_eq!(handle.calls()[0].document.len(), 3);
    }

    #[tokio::test]
    async fn empty_script_is_an_error() {
        let (client, _handle) = MockClient::new();
        let err = client.ask_raw("p".into(), Document::pdf(Vec::new())).await.unwrap_err();
        assert!(matches!(err, AIError::Mock(_)));
    }
}

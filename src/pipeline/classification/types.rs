use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::ClassificationError;
use crate::pipeline::media::MediaType;

/// Remote service that reads a file and describes the sensitive data in it.
///
/// Returns the raw text reply; interpreting it is the parser's job.
pub trait RemoteClassifier {
    fn classify(&self, content: &[u8], media: &MediaType) -> Result<String, ClassificationError>;
}

impl<T: RemoteClassifier + ?Sized> RemoteClassifier for std::sync::Arc<T> {
    fn classify(&self, content: &[u8], media: &MediaType) -> Result<String, ClassificationError> {
        (**self).classify(content, media)
    }
}

/// One scripted reply of a [`MockClassifier`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
}

/// Mock classifier for testing: plays back scripted replies in order and
/// repeats the last one once the script runs out.
pub struct MockClassifier {
    replies: Mutex<Vec<MockReply>>,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers with `response`.
    pub fn responding(response: &str) -> Self {
        Self::new(vec![MockReply::Text(response.to_string())])
    }

    /// Always fails with an HTTP error.
    pub fn failing() -> Self {
        Self::new(vec![MockReply::Fail("connection refused".to_string())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteClassifier for MockClassifier {
    fn classify(&self, _content: &[u8], _media: &MediaType) -> Result<String, ClassificationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let replies = self
            .replies
            .lock()
            .map_err(|_| ClassificationError::Http("mock state poisoned".into()))?;
        let reply = replies
            .get(n)
            .or_else(|| replies.last())
            .cloned()
            .ok_or(ClassificationError::EmptyResponse)?;

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(message) => Err(ClassificationError::Http(message)),
        }
    }
}

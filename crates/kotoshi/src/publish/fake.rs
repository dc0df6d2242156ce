//! テスト用のチャンネル。

use std::sync::Mutex;

use tokio::time::Instant;

use super::{Channel, ChannelKind, PostedStatus, PublishError};
use crate::message::StatusMessage;

pub struct FakeChannel {
    kind: ChannelKind,
    /// 最初の何回の投稿を失敗させるか
    failures: u32,
    error: fn() -> PublishError,
    auth_calls: u32,
    posts: Mutex<Vec<(Instant, String)>>,
}

impl FakeChannel {
    pub fn failing_times(kind: ChannelKind, failures: u32) -> Self {
        Self {
            kind,
            failures,
            error: || PublishError::MalformedResponse("connection reset".to_string()),
            auth_calls: 0,
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(kind: ChannelKind) -> Self {
        Self::failing_times(kind, 0)
    }

    pub fn always_failing(kind: ChannelKind) -> Self {
        Self::failing_times(kind, u32::MAX)
    }

    pub fn with_error(mut self, error: fn() -> PublishError) -> Self {
        self.error = error;
        self
    }

    pub fn auth_calls(&self) -> u32 {
        self.auth_calls
    }

    pub fn post_times(&self) -> Vec<Instant> {
        self.posts.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn posted_texts(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Channel for FakeChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn authenticate(&mut self) -> Result<(), PublishError> {
        self.auth_calls += 1;
        Ok(())
    }

    async fn post(&self, message: &StatusMessage) -> Result<PostedStatus, PublishError> {
        let mut posts = self.posts.lock().unwrap();
        posts.push((Instant::now(), message.to_string()));

        if posts.len() as u64 <= u64::from(self.failures) {
            return Err((self.error)());
        }

        Ok(PostedStatus {
            id: posts.len().to_string(),
            url: None,
        })
    }
}

//! 投稿本文を Mastodon と Bluesky に配信する。
//!
//! チャンネルごとに独立した再試行ループを持ち、2 つのループは並行して実行する。
//! 一方のチャンネルが失敗し続けても、もう一方の投稿は待たされない。

mod bluesky;
mod error;
mod mastodon;
mod retry;

#[cfg(test)]
mod fake;

use std::fmt;

pub use bluesky::BlueskyClient;
pub use error::PublishError;
pub use mastodon::MastodonClient;
pub use retry::{RetryMode, RetryPolicy, publish_with_retry};

use crate::message::StatusMessage;

/// 投稿先。Mastodon がプライマリ、Bluesky がセカンダリ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Mastodon,
    Bluesky,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Mastodon => f.write_str("mastodon"),
            ChannelKind::Bluesky => f.write_str("bluesky"),
        }
    }
}

/// 作成された投稿。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedStatus {
    /// Mastodon のステータス ID、または Bluesky の at:// URI
    pub id: String,
    /// ブラウザで開ける URL
    pub url: Option<String>,
}

/// 投稿先のクライアントが実装する操作。
pub trait Channel {
    fn kind(&self) -> ChannelKind;

    /// 投稿の前に毎回呼ばれる。
    async fn authenticate(&mut self) -> Result<(), PublishError>;

    async fn post(&self, message: &StatusMessage) -> Result<PostedStatus, PublishError>;
}

/// チャンネルごとの最終結果。
#[derive(Debug)]
pub enum Outcome {
    Posted(PostedStatus),
    /// 試行回数を使い切った
    Exhausted(PublishError),
    /// 再試行しないエラーで打ち切った
    Rejected(PublishError),
}

/// 1 回の実行における、あるチャンネルへの配信結果。
#[derive(Debug)]
pub struct PublishAttempt {
    pub channel: ChannelKind,
    pub outcome: Outcome,
    /// 実際に試行した回数
    pub attempts: u32,
}

impl PublishAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Posted(_))
    }
}

/// 同じ本文を 2 つのチャンネルへ並行して配信し、両方が終わるまで待つ。
pub async fn publish_all<P, S>(
    primary: &mut P,
    secondary: &mut S,
    message: &StatusMessage,
    policy: &RetryPolicy,
) -> (PublishAttempt, PublishAttempt)
where
    P: Channel,
    S: Channel,
{
    tokio::join!(
        publish_with_retry(primary, message, policy),
        publish_with_retry(secondary, message, policy),
    )
}

//! 固定間隔での再試行。
//!
//! チャンネルごとの状態遷移は次のとおり。
//!
//! - 試行して成功したら終了する。
//! - 失敗して試行回数が残っていれば `interval` だけ待って再試行する。
//! - 失敗して試行回数を使い切ったら諦める (`Exhausted`)。
//! - [`RetryMode::TransientOnly`] では、再試行しても無駄なエラーで即座に諦める (`Rejected`)。
//!
//! 諦めた結果は呼び出し元に返すだけで、エラーとして伝播させない。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{Channel, Outcome, PostedStatus, PublishAttempt, PublishError};
use crate::message::StatusMessage;

/// どのエラーを再試行の対象にするか。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryMode {
    /// エラーの種類を問わず再試行する
    #[default]
    AllErrors,
    /// [`PublishError::is_transient`] なエラーだけ再試行する
    TransientOnly,
}

impl RetryMode {
    fn should_retry(self, error: &PublishError) -> bool {
        match self {
            RetryMode::AllErrors => true,
            RetryMode::TransientOnly => error.is_transient(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 初回を含む試行回数の上限
    pub max_attempts: u32,
    /// 失敗から次の試行までの待ち時間
    pub interval: Duration,
    pub mode: RetryMode,
}

impl RetryPolicy {
    /// 16 回まで、15 分おき。最悪で 4 時間弱かかる。
    pub const DEFAULT: Self = Self {
        max_attempts: 16,
        interval: Duration::from_secs(15 * 60),
        mode: RetryMode::AllErrors,
    };

    pub fn new(max_attempts: u32, interval: Duration, mode: RetryMode) -> Self {
        Self {
            max_attempts,
            interval,
            mode,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// 成功するか諦めるまで `channel` に投稿を試みる。
pub async fn publish_with_retry<C: Channel>(
    channel: &mut C,
    message: &StatusMessage,
    policy: &RetryPolicy,
) -> PublishAttempt {
    let kind = channel.kind();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match attempt_once(channel, message).await {
            Ok(posted) => {
                info!(
                    channel = %kind,
                    attempt,
                    id = %posted.id,
                    url = posted.url.as_deref().unwrap_or_default(),
                    "Posted status"
                );
                return PublishAttempt {
                    channel: kind,
                    outcome: Outcome::Posted(posted),
                    attempts: attempt,
                };
            }
            Err(e) => e,
        };

        if !policy.mode.should_retry(&error) {
            error!(channel = %kind, attempt, error = %error, "Giving up on non-retryable error");
            return PublishAttempt {
                channel: kind,
                outcome: Outcome::Rejected(error),
                attempts: attempt,
            };
        }

        if attempt >= max_attempts {
            error!(channel = %kind, attempt, error = %error, "Giving up after exhausting attempts");
            return PublishAttempt {
                channel: kind,
                outcome: Outcome::Exhausted(error),
                attempts: attempt,
            };
        }

        warn!(
            channel = %kind,
            attempt,
            max_attempts,
            error = %error,
            retry_in = %humantime::format_duration(policy.interval),
            "Publish failed, retrying"
        );
        tokio::time::sleep(policy.interval).await;
    }
}

async fn attempt_once<C: Channel>(
    channel: &mut C,
    message: &StatusMessage,
) -> Result<PostedStatus, PublishError> {
    channel.authenticate().await?;
    channel.post(message).await
}

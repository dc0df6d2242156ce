//! 投稿時のエラー。
//!
//! 再試行で回復する見込みがあるもの (transient) と、
//! 何度送っても同じ結果になるもの (permanent) を区別する。

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    /// 環境変数に認証情報が設定されていない
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// セッションを作らずに投稿しようとした
    #[error("Not authenticated")]
    NotAuthenticated,

    /// 接続失敗・タイムアウトなど
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 2xx 以外のレスポンス
    #[error("Unexpected response (HTTP {status}): {body}")]
    Status { status: StatusCode, body: String },

    /// レスポンスボディを解釈できない
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl PublishError {
    /// 時間をおいて再送すれば成功しうるエラーかどうか。
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::MissingCredential(_) | PublishError::NotAuthenticated => false,
            // URL が不正なときはリクエストの組み立て段階で失敗する
            PublishError::Request(e) => !e.is_builder(),
            PublishError::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            PublishError::MalformedResponse(_) => true,
        }
    }
}

/// 2xx 以外のレスポンスを [`PublishError::Status`] にする。
pub(super) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(PublishError::Status { status, body })
}

//! Mastodon への投稿。アクセストークンは長期間有効なものを使う。

use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::Deserialize;

use super::error::ensure_success;
use super::{Channel, ChannelKind, PostedStatus, PublishError};
use crate::config::{MastodonConfig, MastodonCredentials};
use crate::message::StatusMessage;
use crate::version::user_agent;

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
    url: Option<String>,
}

pub struct MastodonClient {
    http_client: reqwest::Client,
    credentials: MastodonCredentials,
    visibility: String,
    /// 同じキーの投稿はサーバー側で重複が除かれる
    idempotency_key: Option<String>,
}

impl MastodonClient {
    pub fn new(credentials: MastodonCredentials, config: &MastodonConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent())
            .build()
            .context("Failed to create HTTP client for Mastodon")?;

        Ok(Self {
            http_client,
            credentials,
            visibility: config.visibility.clone(),
            idempotency_key: None,
        })
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    fn access_token(&self) -> Result<&str, PublishError> {
        self.credentials
            .access_token
            .as_deref()
            .ok_or(PublishError::MissingCredential("PRIMARY_ACCESS_TOKEN"))
    }

    fn api_base_url(&self) -> Result<&str, PublishError> {
        self.credentials
            .api_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or(PublishError::MissingCredential("PRIMARY_API_BASE_URL"))
    }
}

impl Channel for MastodonClient {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Mastodon
    }

    /// トークン方式なのでログイン処理はなく、認証情報が揃っているかだけ確認する。
    async fn authenticate(&mut self) -> Result<(), PublishError> {
        self.access_token()?;
        self.api_base_url()?;
        Ok(())
    }

    async fn post(&self, message: &StatusMessage) -> Result<PostedStatus, PublishError> {
        let url = format!("{}/api/v1/statuses", self.api_base_url()?);
        let body = serde_json::json!({
            "status": message.as_str(),
            "visibility": self.visibility,
        });

        let mut request = self
            .http_client
            .post(url)
            .bearer_auth(self.access_token()?)
            .json(&body);
        if let Some(key) = &self.idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = ensure_success(request.send().await?).await?;
        let status: Status = response
            .json()
            .await
            .map_err(|e| PublishError::MalformedResponse(e.to_string()))?;

        Ok(PostedStatus {
            id: status.id,
            url: status.url,
        })
    }
}

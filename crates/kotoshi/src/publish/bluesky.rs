//! Bluesky (AT Protocol) への投稿。
//!
//! アプリパスワードでセッションを作成し、`app.bsky.feed.post` レコードを作成する。

use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use super::error::ensure_success;
use super::{Channel, ChannelKind, PostedStatus, PublishError};
use crate::config::{BlueskyConfig, BlueskyCredentials};
use crate::message::StatusMessage;
use crate::version::user_agent;

const POST_COLLECTION: &str = "app.bsky.feed.post";

/// `com.atproto.server.createSession` のレスポンス（必要な項目のみ）。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

/// `com.atproto.repo.createRecord` のレスポンス。
#[derive(Debug, Deserialize)]
struct CreatedRecord {
    uri: String,
}

pub struct BlueskyClient {
    http_client: reqwest::Client,
    service: String,
    credentials: BlueskyCredentials,
    langs: Vec<String>,
    session: Option<Session>,
}

impl BlueskyClient {
    pub fn new(credentials: BlueskyCredentials, config: &BlueskyConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent())
            .build()
            .context("Failed to create HTTP client for Bluesky")?;

        Ok(Self {
            http_client,
            service: config.service.trim_end_matches('/').to_string(),
            credentials,
            langs: config.langs.clone(),
            session: None,
        })
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }
}

impl Channel for BlueskyClient {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Bluesky
    }

    /// 試行のたびにセッションを作り直す。
    async fn authenticate(&mut self) -> Result<(), PublishError> {
        self.session = None;

        let identifier = self
            .credentials
            .identifier
            .as_deref()
            .ok_or(PublishError::MissingCredential("SECONDARY_ID"))?;
        let password = self
            .credentials
            .app_password
            .as_deref()
            .ok_or(PublishError::MissingCredential("SECONDARY_APP_PASSWORD"))?;

        let response = self
            .http_client
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&serde_json::json!({
                "identifier": identifier,
                "password": password,
            }))
            .send()
            .await?;
        let session: Session = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| PublishError::MalformedResponse(e.to_string()))?;

        tracing::debug!(did = %session.did, "Bluesky session created");
        self.session = Some(session);
        Ok(())
    }

    async fn post(&self, message: &StatusMessage) -> Result<PostedStatus, PublishError> {
        let session = self.session.as_ref().ok_or(PublishError::NotAuthenticated)?;

        let body = serde_json::json!({
            "repo": session.did,
            "collection": POST_COLLECTION,
            "record": {
                "$type": POST_COLLECTION,
                "text": message.as_str(),
                "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                "langs": self.langs,
            },
        });

        let response = self
            .http_client
            .post(self.xrpc_url("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&body)
            .send()
            .await?;
        let record: CreatedRecord = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| PublishError::MalformedResponse(e.to_string()))?;

        let url = web_url(&record.uri);
        Ok(PostedStatus {
            id: record.uri,
            url,
        })
    }
}

/// `at://{did}/app.bsky.feed.post/{rkey}` を bsky.app の URL にする。
fn web_url(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix("at://")?;
    let (did, rest) = rest.split_once('/')?;
    let rkey = rest.strip_prefix(POST_COLLECTION)?.strip_prefix('/')?;
    if did.is_empty() || rkey.is_empty() {
        return None;
    }
    Some(format!("https://bsky.app/profile/{did}/post/{rkey}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const SESSION_BODY: &str = r#"{
        "did": "did:plc:kotoshi",
        "handle": "kotoshi.bsky.social",
        "accessJwt": "access-jwt",
        "refreshJwt": "refresh-jwt"
    }"#;

    fn client(server: &mockito::Server) -> BlueskyClient {
        let credentials = BlueskyCredentials {
            identifier: Some("kotoshi.bsky.social".to_string()),
            app_password: Some("xxxx-xxxx-xxxx-xxxx".to_string()),
        };
        let config = BlueskyConfig {
            service: server.url(),
            ..Default::default()
        };
        BlueskyClient::new(credentials, &config).unwrap()
    }

    #[tokio::test]
    async fn create_session_and_post() {
        let mut server = mockito::Server::new_async().await;
        let session_mock = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .match_body(Matcher::Json(serde_json::json!({
                "identifier": "kotoshi.bsky.social",
                "password": "xxxx-xxxx-xxxx-xxxx",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SESSION_BODY)
            .create_async()
            .await;
        let record_mock = server
            .mock("POST", "/xrpc/com.atproto.repo.createRecord")
            .match_header("authorization", "Bearer access-jwt")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "repo": "did:plc:kotoshi",
                "collection": "app.bsky.feed.post",
                "record": {
                    "$type": "app.bsky.feed.post",
                    "text": "今年は残り200日です。",
                    "langs": ["ja"],
                },
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"uri":"at://did:plc:kotoshi/app.bsky.feed.post/3kabc","cid":"bafyrei"}"#)
            .create_async()
            .await;

        let mut bluesky = client(&server);
        bluesky.authenticate().await.unwrap();
        let posted = bluesky
            .post(&StatusMessage::new("今年は残り200日です。"))
            .await
            .unwrap();

        session_mock.assert_async().await;
        record_mock.assert_async().await;
        assert_eq!(posted.id, "at://did:plc:kotoshi/app.bsky.feed.post/3kabc");
        assert_eq!(
            posted.url.as_deref(),
            Some("https://bsky.app/profile/did:plc:kotoshi/post/3kabc")
        );
    }

    #[tokio::test]
    async fn post_without_session_fails() {
        let server = mockito::Server::new_async().await;
        let err = client(&server)
            .post(&StatusMessage::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NotAuthenticated));
    }

    #[tokio::test]
    async fn missing_app_password_fails_authentication() {
        let credentials = BlueskyCredentials {
            identifier: Some("kotoshi.bsky.social".to_string()),
            app_password: None,
        };
        let mut bluesky = BlueskyClient::new(credentials, &BlueskyConfig::default()).unwrap();

        let err = bluesky.authenticate().await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::MissingCredential("SECONDARY_APP_PASSWORD")
        ));
    }

    #[tokio::test]
    async fn rejected_login_is_permanent_and_clears_session() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(401)
            .with_body(r#"{"error":"AuthenticationRequired","message":"Invalid identifier or password"}"#)
            .create_async()
            .await;

        let mut bluesky = client(&server);
        let err = bluesky.authenticate().await.unwrap_err();

        assert!(!err.is_transient());
        assert!(bluesky.session.is_none());
    }

    #[tokio::test]
    async fn rate_limited_post_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(200)
            .with_body(SESSION_BODY)
            .create_async()
            .await;
        let _mock = server
            .mock("POST", "/xrpc/com.atproto.repo.createRecord")
            .with_status(429)
            .with_body(r#"{"error":"RateLimitExceeded"}"#)
            .create_async()
            .await;

        let mut bluesky = client(&server);
        bluesky.authenticate().await.unwrap();
        let err = bluesky
            .post(&StatusMessage::new("hello"))
            .await
            .unwrap_err();

        assert!(err.is_transient());
    }

    #[test]
    fn web_url_from_at_uri() {
        assert_eq!(
            web_url("at://did:plc:abc/app.bsky.feed.post/3k2").as_deref(),
            Some("https://bsky.app/profile/did:plc:abc/post/3k2")
        );
        assert_eq!(web_url("at://did:plc:abc/app.bsky.feed.like/3k2"), None);
        assert_eq!(web_url("https://bsky.app"), None);
        assert_eq!(web_url("at://did:plc:abc/app.bsky.feed.post/"), None);
    }
}

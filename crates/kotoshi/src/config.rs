use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::publish::{RetryMode, RetryPolicy};

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub holidays: HolidaysConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub mastodon: MastodonConfig,
    #[serde(default)]
    pub bluesky: BlueskyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            holidays: HolidaysConfig::default(),
            retry: RetryConfig::default(),
            mastodon: MastodonConfig::default(),
            bluesky: BlueskyConfig::default(),
        }
    }
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Tokyo
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HolidaysConfig {
    /// 内閣府の syukujitsu.csv のパス（作業ディレクトリからの相対パス）
    pub path: PathBuf,
    /// 投稿に載せる祝日の件数
    #[serde(default = "default_holiday_count")]
    pub count: usize,
}

impl Default for HolidaysConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("syukujitsu.csv"),
            count: default_holiday_count(),
        }
    }
}

fn default_holiday_count() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(with = "humantime_serde", default = "default_retry_interval")]
    pub interval: Duration,
    #[serde(default)]
    pub mode: RetryMode,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval: default_retry_interval(),
            mode: RetryMode::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    16
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.max_attempts, config.interval, config.mode)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MastodonConfig {
    /// public / unlisted / private / direct
    #[serde(default = "default_visibility")]
    pub visibility: String,
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            visibility: default_visibility(),
        }
    }
}

fn default_visibility() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_bluesky_service")]
    pub service: String,
    #[serde(default = "default_langs")]
    pub langs: Vec<String>,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: default_bluesky_service(),
            langs: default_langs(),
        }
    }
}

fn default_bluesky_service() -> String {
    "https://bsky.social".to_string()
}

fn default_langs() -> Vec<String> {
    vec!["ja".to_string()]
}

/// 設定ファイルを読み込む。ファイルが存在しない場合はデフォルト設定を返す。
pub fn open_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = ?path, "Configuration file not found, using defaults");
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).context("Failed to read configuration file")?;
    let config: Config = toml::from_str(&content).context("Failed to parse configuration file")?;
    Ok(config)
}

pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let content =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize configuration")?;
    fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
    Ok(())
}

/// Mastodon の認証情報。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MastodonCredentials {
    pub access_token: Option<String>,
    pub api_base_url: Option<String>,
}

/// Bluesky の認証情報。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlueskyCredentials {
    pub identifier: Option<String>,
    pub app_password: Option<String>,
}

/// 環境変数から読み込む秘密情報。設定ファイルには書かない。
///
/// 値が無くてもここではエラーにしない。該当チャンネルの認証が失敗するだけで、
/// もう一方のチャンネルには影響しない。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub mastodon: MastodonCredentials,
    pub bluesky: BlueskyCredentials,
}

impl Credentials {
    /// `.env` を読み込んだうえで環境変数から取得する。
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` で値を引く。空文字列は未設定として扱う。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        Self {
            mastodon: MastodonCredentials {
                access_token: get(&["PRIMARY_ACCESS_TOKEN", "MASTODON_ACCESS_TOKEN"]),
                api_base_url: get(&["PRIMARY_API_BASE_URL", "MASTODON_API_BASE_URL"]),
            },
            bluesky: BlueskyCredentials {
                identifier: get(&["SECONDARY_ID"]),
                app_password: get(&["SECONDARY_APP_PASSWORD"]),
            },
        }
    }
}

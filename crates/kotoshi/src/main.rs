mod calendar;
mod config;
mod holiday;
mod message;
mod publish;
mod version;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};

use crate::{
    calendar::YearProgress,
    config::{Credentials, open_config, write_default_config},
    publish::{BlueskyClient, MastodonClient, Outcome, RetryPolicy},
    version::short_version,
};

#[derive(Parser)]
#[command(version = short_version())]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(long)]
    init: bool,

    /// 今日の日付の代わりに使う日付 (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// 投稿せずに本文を標準出力に書き出す
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.init {
        write_default_config(&args.config)?;
        info!(path = ?args.config, "Created default configuration");
        return Ok(());
    }

    info!(version = short_version(), "kotoshi version");

    let config = open_config(&args.config).context("Failed to load configuration")?;
    let today = args
        .date
        .unwrap_or_else(|| calendar::today_in(config.timezone));

    // 祝日表が読めなければ何も投稿せずに終了する
    let holidays = holiday::load_holidays(&config.holidays.path)?;
    let upcoming = holiday::upcoming(&holidays, today, config.holidays.count);

    let progress = YearProgress::on(today);
    let message = message::compose(&progress, &upcoming);
    info!(
        %today,
        remaining_days = progress.remaining_days,
        total_days = progress.total_days,
        holidays = upcoming.len(),
        "Message composed"
    );

    if args.dry_run {
        println!("{message}");
        return Ok(());
    }

    let credentials = Credentials::from_env();
    let mut mastodon = MastodonClient::new(credentials.mastodon, &config.mastodon)?
        .with_idempotency_key(format!("kotoshi-{today}"));
    let mut bluesky = BlueskyClient::new(credentials.bluesky, &config.bluesky)?;
    let policy = RetryPolicy::from(&config.retry);

    let (primary, secondary) =
        publish::publish_all(&mut mastodon, &mut bluesky, &message, &policy).await;

    for result in [&primary, &secondary] {
        match &result.outcome {
            Outcome::Posted(status) => info!(
                channel = %result.channel,
                attempts = result.attempts,
                url = status.url.as_deref().unwrap_or(&status.id),
                "Published"
            ),
            Outcome::Exhausted(e) | Outcome::Rejected(e) => warn!(
                channel = %result.channel,
                attempts = result.attempts,
                error = %e,
                "Not published"
            ),
        }
    }

    let posted = [&primary, &secondary]
        .iter()
        .filter(|result| result.is_success())
        .count();
    info!(posted, channels = 2, "Run finished");

    Ok(())
}

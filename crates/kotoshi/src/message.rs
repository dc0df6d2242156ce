//! 投稿本文の組み立て。

use std::{fmt, sync::Arc};

use chrono::Datelike;

use crate::calendar::YearProgress;
use crate::holiday::Holiday;

/// プログレスバーの幅（文字数）。
pub const PROGRESS_BAR_WIDTH: usize = 20;

const FILLED: char = '▓';
const UNFILLED: char = '░';

/// 投稿本文。一度組み立てたら変更せず、全チャンネルで同じ内容を共有する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage(Arc<str>);

impl StatusMessage {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `percentage` (0–100) を 20 文字のバーにする。
pub fn progress_bar(percentage: f64) -> String {
    let width = PROGRESS_BAR_WIDTH as f64;
    let filled = (width * percentage / 100.0).round().clamp(0.0, width) as usize;

    let mut bar = String::with_capacity(PROGRESS_BAR_WIDTH * FILLED.len_utf8());
    bar.extend(std::iter::repeat_n(FILLED, filled));
    bar.extend(std::iter::repeat_n(UNFILLED, PROGRESS_BAR_WIDTH - filled));
    bar
}

/// 今日の進捗と直近の祝日から投稿本文を組み立てる。
pub fn compose(progress: &YearProgress, holidays: &[Holiday]) -> StatusMessage {
    let today = progress.today;

    let mut lines = vec![
        format!(
            "{}年{}月{}日になりました。",
            today.year(),
            today.month(),
            today.day()
        ),
        format!(
            "今年は残り{}日です。あと{:.1}%です。",
            progress.remaining_days, progress.remaining_percentage
        ),
        format!(
            "{} {:.1}%",
            progress_bar(progress.elapsed_percentage),
            progress.elapsed_percentage
        ),
        String::new(),
    ];

    if holidays.is_empty() {
        lines.push("次の祝日: なし".to_string());
    } else {
        lines.push("次の祝日:".to_string());
        lines.extend(holidays.iter().map(|h| {
            format!(
                "{}: {} (残り{}日)",
                h.date.format("%Y年%m月%d日"),
                h.name,
                h.days_from(today)
            )
        }));
    }

    StatusMessage::new(lines.join("\n"))
}

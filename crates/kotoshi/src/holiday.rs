//! 内閣府が配布する「国民の祝日」CSV (syukujitsu.csv) の読み込み。
//!
//! 配布ファイルは Shift_JIS で、1 行目がヘッダー、以降が `日付,名称` の行になっている。
//! 日付は `1955/1/1` のようにゼロ埋めされていないことがある。

use std::{fs, path::Path};

use anyhow::{Context as _, Result, bail};
use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y/%m/%d";

/// 祝日 1 件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}

impl Holiday {
    /// `today` から祝日までの日数。
    pub fn days_from(&self, today: NaiveDate) -> i64 {
        (self.date - today).num_days()
    }
}

/// 祝日 CSV を読み込む。
pub fn load_holidays(path: impl AsRef<Path>) -> Result<Vec<Holiday>> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read holiday table: {}", path.display()))?;
    parse_holidays(&bytes)
        .with_context(|| format!("Failed to parse holiday table: {}", path.display()))
}

/// Shift_JIS の CSV バイト列をパースする。BOM 付き UTF-8 も受け付ける。
pub fn parse_holidays(bytes: &[u8]) -> Result<Vec<Holiday>> {
    let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if had_errors {
        bail!("Holiday table contains bytes that are not valid Shift_JIS");
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut holidays = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed CSV record")?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let (Some(date), Some(name)) = (record.get(0), record.get(1)) else {
            bail!("Line {line}: expected `date,name`");
        };
        if name.is_empty() {
            bail!("Line {line}: holiday name is empty");
        }
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .with_context(|| format!("Line {line}: invalid date `{date}`"))?;

        holidays.push(Holiday {
            date,
            name: name.to_string(),
        });
    }

    Ok(holidays)
}

/// `today` 以降の祝日を日付順に最大 `count` 件返す。
pub fn upcoming(holidays: &[Holiday], today: NaiveDate, count: usize) -> Vec<Holiday> {
    let mut upcoming: Vec<Holiday> = holidays
        .iter()
        .filter(|h| h.date >= today)
        .cloned()
        .collect();
    upcoming.sort_by_key(|h| h.date);
    upcoming.truncate(count);
    upcoming
}

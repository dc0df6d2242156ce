//! 年末までの残り日数と進捗率の計算。

use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

/// 指定したタイムゾーンでの今日の日付を取得する。
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// その年の日数（365 または 366）。
pub fn days_in_year(year: i32) -> i64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// 翌年の元日までの日数。元日当日はその年の日数、大晦日は 1 になる。
pub fn remaining_days_new_year(today: NaiveDate) -> i64 {
    days_in_year(today.year()) - i64::from(today.ordinal0())
}

/// 年の残りの割合 (%)。
pub fn remaining_percentage(today: NaiveDate) -> f64 {
    remaining_days_new_year(today) as f64 / days_in_year(today.year()) as f64 * 100.0
}

/// 年の経過した割合 (%)。
pub fn elapsed_percentage(today: NaiveDate) -> f64 {
    100.0 - remaining_percentage(today)
}

/// ある日付時点での年の進み具合。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearProgress {
    pub today: NaiveDate,
    pub total_days: i64,
    pub remaining_days: i64,
    pub remaining_percentage: f64,
    pub elapsed_percentage: f64,
}

impl YearProgress {
    pub fn on(today: NaiveDate) -> Self {
        Self {
            today,
            total_days: days_in_year(today.year()),
            remaining_days: remaining_days_new_year(today),
            remaining_percentage: remaining_percentage(today),
            elapsed_percentage: elapsed_percentage(today),
        }
    }
}

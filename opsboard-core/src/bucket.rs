//! Chia bản ghi theo ngày / tháng và dựng chuỗi thời gian không có khoảng trống.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Khoá tháng, hiển thị dạng `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    /// Lùi `months` tháng.
    pub fn minus(self, months: u32) -> Self {
        Self::from_ordinal(self.ordinal() - i64::from(months))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Một điểm của chuỗi thời gian.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint<T> {
    pub bucket: String,
    pub value: T,
}

/// Chuỗi các bucket liên tục, tăng dần theo thời gian.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSeries<T> {
    pub points: Vec<SeriesPoint<T>>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

impl<T> TimeSeries<T> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.points.iter().map(|point| &point.value)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|point| point.bucket.as_str())
    }
}

/// `n` ngày liên tiếp, kết thúc ở `today`.
pub fn last_n_days(today: NaiveDate, n: usize) -> Vec<NaiveDate> {
    (0..n)
        .rev()
        .filter_map(|offset| today.checked_sub_signed(Duration::days(offset as i64)))
        .collect()
}

/// `n` tháng liên tiếp, kết thúc ở tháng chứa `today`.
pub fn last_n_months(today: NaiveDate, n: usize) -> Vec<MonthKey> {
    month_window(MonthKey::of(today), n).collect()
}

fn month_window(
    current: MonthKey,
    n: usize,
) -> impl ExactSizeIterator<Item = MonthKey> + DoubleEndedIterator {
    let end = current.ordinal();
    (0..n).rev().map(move |back| {
        let back = i64::try_from(back).unwrap_or(i64::MAX);
        MonthKey::from_ordinal(end.saturating_sub(back))
    })
}

/// Nhóm theo ngày; bản ghi không có ngày bị bỏ qua.
pub fn group_by_date<'a, T, F>(records: &'a [T], date_of: F) -> BTreeMap<NaiveDate, Vec<&'a T>>
where
    F: Fn(&T) -> Option<NaiveDate>,
{
    let mut groups: BTreeMap<NaiveDate, Vec<&'a T>> = BTreeMap::new();
    for record in records {
        if let Some(date) = date_of(record) {
            groups.entry(date).or_default().push(record);
        }
    }
    groups
}

pub fn group_by_month<'a, T, F>(records: &'a [T], date_of: F) -> BTreeMap<MonthKey, Vec<&'a T>>
where
    F: Fn(&T) -> Option<NaiveDate>,
{
    let mut groups: BTreeMap<MonthKey, Vec<&'a T>> = BTreeMap::new();
    for record in records {
        if let Some(date) = date_of(record) {
            groups.entry(MonthKey::of(date)).or_default().push(record);
        }
    }
    groups
}

/// Chuỗi theo ngày, bucket không có bản ghi nhận `value(&[])`.
pub fn daily_series<T, V, F, G>(
    records: &[T],
    today: NaiveDate,
    n: usize,
    date_of: F,
    value: G,
) -> TimeSeries<V>
where
    F: Fn(&T) -> Option<NaiveDate>,
    G: Fn(&[&T]) -> V,
{
    let groups = group_by_date(records, date_of);
    let points = last_n_days(today, n)
        .into_iter()
        .map(|day| SeriesPoint {
            bucket: day.format("%Y-%m-%d").to_string(),
            value: value(groups.get(&day).map(Vec::as_slice).unwrap_or(&[])),
        })
        .collect();
    TimeSeries { points }
}

pub fn monthly_series<T, V, F, G>(
    records: &[T],
    today: NaiveDate,
    n: usize,
    date_of: F,
    value: G,
) -> TimeSeries<V>
where
    F: Fn(&T) -> Option<NaiveDate>,
    G: Fn(&[&T]) -> V,
{
    let groups = group_by_month(records, date_of);
    let points = last_n_months(today, n)
        .into_iter()
        .map(|month| SeriesPoint {
            bucket: month.to_string(),
            value: value(groups.get(&month).map(Vec::as_slice).unwrap_or(&[])),
        })
        .collect();
    TimeSeries { points }
}

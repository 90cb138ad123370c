//! Gắn admission vào ward và suy ra tuổi bệnh nhân.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{AdmissionRecord, Ward};

/// Chiến lược đã khớp admission với ward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    WardId,
    ExactName,
    NameContainment,
    NumericSuffix,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WardMatch<'a> {
    pub ward: &'a Ward,
    pub strategy: MatchStrategy,
}

type WardMatcher = fn(&AdmissionRecord, &Ward) -> bool;

/// Thứ tự thử; chiến lược mạnh hơn trên bất kỳ ward nào thắng chiến lược yếu hơn.
const WARD_MATCHERS: [(MatchStrategy, WardMatcher); 4] = [
    (MatchStrategy::WardId, match_by_id),
    (MatchStrategy::ExactName, match_by_exact_name),
    (MatchStrategy::NameContainment, match_by_containment),
    (MatchStrategy::NumericSuffix, match_by_numeric_suffix),
];

/// Tìm ward sở hữu admission, `None` khi hết chuỗi fallback.
pub fn resolve_ward_for_admission<'a>(
    admission: &AdmissionRecord,
    wards: &'a [Ward],
) -> Option<&'a Ward> {
    resolve_ward_match(admission, wards).map(|found| found.ward)
}

pub fn resolve_ward_match<'a>(
    admission: &AdmissionRecord,
    wards: &'a [Ward],
) -> Option<WardMatch<'a>> {
    WARD_MATCHERS.iter().find_map(|(strategy, matcher)| {
        wards
            .iter()
            .find(|ward| matcher(admission, ward))
            .map(|ward| WardMatch {
                ward,
                strategy: *strategy,
            })
    })
}

fn match_by_id(admission: &AdmissionRecord, ward: &Ward) -> bool {
    match (non_empty(&admission.ward_id), non_empty(&ward.ward_id)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn match_by_exact_name(admission: &AdmissionRecord, ward: &Ward) -> bool {
    match normalized_pair(admission, ward) {
        Some((left, right)) => left == right,
        None => false,
    }
}

fn match_by_containment(admission: &AdmissionRecord, ward: &Ward) -> bool {
    match normalized_pair(admission, ward) {
        Some((left, right)) => left.contains(&right) || right.contains(&left),
        None => false,
    }
}

fn match_by_numeric_suffix(admission: &AdmissionRecord, ward: &Ward) -> bool {
    let Some((left, right)) = normalized_pair(admission, ward) else {
        return false;
    };
    match (numeric_suffix(&left), numeric_suffix(&right)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn normalized_pair(admission: &AdmissionRecord, ward: &Ward) -> Option<(String, String)> {
    let left = normalize_name(admission.ward_name.as_deref()?)?;
    let right = normalize_name(ward.ward_name.as_deref()?)?;
    Some((left, right))
}

/// Chuẩn hoá tên ward: trim + lowercase; chuỗi rỗng coi như không có tên.
pub fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Số nguyên ở cuối tên ("ward 1" -> 1, "ward12" -> 12).
pub fn numeric_suffix(name: &str) -> Option<u64> {
    let trimmed = name.trim_end();
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    trimmed[digits_start..].parse().ok()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Tuổi tròn năm tại `as_of`; `None` nếu ngày sinh nằm sau `as_of`.
pub fn derive_age(date_of_birth: NaiveDate, as_of: NaiveDate) -> Option<u32> {
    if date_of_birth > as_of {
        return None;
    }
    let mut years = as_of.year() - date_of_birth.year();
    if (as_of.month(), as_of.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Bộ ngưỡng nhóm tuổi.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroupScheme {
    /// 0-17, 18-34, 35-54, 55-69, 70+
    #[default]
    Clinical,
    /// 0-17, 18-34, 35-49, 50-64, 65+
    Census,
}

impl AgeGroupScheme {
    /// Cận dưới của mỗi nhóm, tăng dần.
    fn lower_bounds(self) -> [u32; 5] {
        match self {
            Self::Clinical => [0, 18, 35, 55, 70],
            Self::Census => [0, 18, 35, 50, 65],
        }
    }

    pub fn labels(self) -> [&'static str; 5] {
        match self {
            Self::Clinical => ["0-17", "18-34", "35-54", "55-69", "70+"],
            Self::Census => ["0-17", "18-34", "35-49", "50-64", "65+"],
        }
    }
}

/// Chỉ số nhóm tuổi trong `scheme.labels()`.
pub fn age_group_index(age: u32, scheme: AgeGroupScheme) -> usize {
    scheme
        .lower_bounds()
        .iter()
        .rposition(|bound| age >= *bound)
        .unwrap_or(0)
}

pub fn age_group(age: u32, scheme: AgeGroupScheme) -> &'static str {
    scheme.labels()[age_group_index(age, scheme)]
}

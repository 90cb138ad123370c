//! Logic lõi tổng hợp số liệu vận hành bệnh viện.
//!
//! Dữ liệu nguồn (ward, admission, appointment, doctor, patient) được fetch
//! độc lập và không chia sẻ khoá ngoại sạch; crate này gắn chúng lại với nhau
//! và tính các chỉ số theo bucket thời gian.

pub mod bucket;
pub mod metrics;
pub mod model;
pub mod resolver;
pub mod stats;
pub mod store;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use bucket::{last_n_days, last_n_months, MonthKey, SeriesPoint, TimeSeries};
pub use metrics::{
    percentage, AppointmentRates, DoctorWorkloadSummary, WardOccupancy, WorkloadBalance,
};
pub use model::{
    AdmissionRecord, AdmissionStatus, AppointmentRecord, AppointmentStatus, DoctorRecord, Gender,
    PatientRecord, Ward, WARD_BED_CAPACITY,
};
pub use resolver::{resolve_ward_for_admission, AgeGroupScheme, MatchStrategy};
pub use stats::{compute_stats, DashboardSection, OperationalStats};
pub use store::{RecordStore, SourceKind, SourcePayload, SourceStatus, StoreView};

/// Cấu hình cửa sổ thời gian và các ngưỡng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsConfig {
    /// Số ngày của các biểu đồ theo ngày.
    pub trend_days: usize,
    /// Số tháng của các biểu đồ theo tháng.
    pub trend_months: usize,
    /// Số bác sĩ trong bảng xếp hạng.
    pub top_doctors: usize,
    /// Số lịch hẹn trong ngày để coi một bác sĩ là "bận".
    pub busy_doctor_threshold: usize,
    /// Chu kỳ tự động làm mới (giây).
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub age_scheme: AgeGroupScheme,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trend_days: 7,
            trend_months: 6,
            top_doctors: 5,
            busy_doctor_threshold: 5,
            refresh_interval_secs: 300,
            age_scheme: AgeGroupScheme::Clinical,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.trend_days == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "trend_days must be greater than 0".to_string(),
            ));
        }
        if self.trend_months == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "trend_months must be greater than 0".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "refresh_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Lỗi khi fetch một nguồn; mọi biến thể đều được xử lý như "nguồn không khả dụng".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Phiên đăng nhập đã hết hạn")]
    AuthExpired,
    #[error("Không có quyền truy cập")]
    Forbidden,
    #[error("Lỗi máy chủ: {0}")]
    Server(String),
    #[error("Lỗi mạng: {0}")]
    Network(String),
    #[error("Dữ liệu trả về không hợp lệ: {0}")]
    Malformed(String),
}

/// Lỗi chung của engine.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Cấu hình không hợp lệ: {0}")]
    InvalidConfig(String),
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Nguồn {kind} không khả dụng: {error}")]
    Source {
        kind: SourceKind,
        #[source]
        error: FetchError,
    },
}

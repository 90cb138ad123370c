//! Snapshot gần nhất của từng nguồn dữ liệu.
//!
//! Mỗi lần fetch thành công thay thế toàn bộ snapshot của nguồn đó; lần fetch
//! lỗi giữ lại dữ liệu cũ nhưng nguồn đóng góp tập rỗng cho chu kỳ hiện tại.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AdmissionRecord, AppointmentRecord, DoctorRecord, PatientRecord, Ward};
use crate::FetchError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Wards,
    ActiveAdmissions,
    AllAdmissions,
    Appointments,
    Doctors,
    Patients,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        Self::Wards,
        Self::ActiveAdmissions,
        Self::AllAdmissions,
        Self::Appointments,
        Self::Doctors,
        Self::Patients,
    ];

    /// Đường dẫn REST tương ứng phía backend.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Wards => "wards",
            Self::ActiveAdmissions => "admissions/active",
            Self::AllAdmissions => "admissions/all",
            Self::Appointments => "appointments/all",
            Self::Doctors => "doctors",
            Self::Patients => "patients",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Một tập bản ghi vừa fetch xong.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    Wards(Vec<Ward>),
    ActiveAdmissions(Vec<AdmissionRecord>),
    AllAdmissions(Vec<AdmissionRecord>),
    Appointments(Vec<AppointmentRecord>),
    Doctors(Vec<DoctorRecord>),
    Patients(Vec<PatientRecord>),
}

impl SourcePayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Wards(_) => SourceKind::Wards,
            Self::ActiveAdmissions(_) => SourceKind::ActiveAdmissions,
            Self::AllAdmissions(_) => SourceKind::AllAdmissions,
            Self::Appointments(_) => SourceKind::Appointments,
            Self::Doctors(_) => SourceKind::Doctors,
            Self::Patients(_) => SourceKind::Patients,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Wards(records) => records.len(),
            Self::ActiveAdmissions(records) | Self::AllAdmissions(records) => records.len(),
            Self::Appointments(records) => records.len(),
            Self::Doctors(records) => records.len(),
            Self::Patients(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trạng thái hiển thị cho từng widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceStatus {
    pub source: SourceKind,
    pub last_updated: Option<DateTime<Utc>>,
    pub ok: bool,
    /// Lỗi ở lượt này, hoặc snapshot cũ hơn thời điểm bắt đầu lượt.
    pub stale: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct SourceSlot<T> {
    records: Vec<T>,
    last_updated: Option<DateTime<Utc>>,
    last_error: Option<FetchError>,
}

impl<T> Default for SourceSlot<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            last_updated: None,
            last_error: None,
        }
    }
}

impl<T> SourceSlot<T> {
    fn replace(&mut self, records: Vec<T>, at: DateTime<Utc>) {
        self.records = records;
        self.last_updated = Some(at);
        self.last_error = None;
    }

    fn fail(&mut self, error: FetchError) {
        self.last_error = Some(error);
    }

    /// Chưa từng fetch thành công cũng coi là không khả dụng.
    fn ok(&self) -> bool {
        self.last_error.is_none() && self.last_updated.is_some()
    }

    fn for_cycle(&self) -> &[T] {
        if self.ok() {
            &self.records
        } else {
            &[]
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    wards: SourceSlot<Ward>,
    active_admissions: SourceSlot<AdmissionRecord>,
    all_admissions: SourceSlot<AdmissionRecord>,
    appointments: SourceSlot<AppointmentRecord>,
    doctors: SourceSlot<DoctorRecord>,
    patients: SourceSlot<PatientRecord>,
    cycle_started_at: Option<DateTime<Utc>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Đánh dấu đầu một lượt làm mới; `stale` trong `status()` so với mốc này.
    pub fn begin_cycle(&mut self, started_at: DateTime<Utc>) {
        self.cycle_started_at = Some(started_at);
    }

    /// Ghi kết quả fetch của một nguồn.
    pub fn apply(&mut self, kind: SourceKind, result: Result<SourcePayload, FetchError>, at: DateTime<Utc>) {
        match result {
            Ok(payload) if payload.kind() == kind => self.replace(payload, at),
            Ok(payload) => self.fail(
                kind,
                FetchError::Malformed(format!(
                    "expected {kind} payload, received {}",
                    payload.kind()
                )),
            ),
            Err(error) => self.fail(kind, error),
        }
    }

    fn replace(&mut self, payload: SourcePayload, at: DateTime<Utc>) {
        match payload {
            SourcePayload::Wards(records) => self.wards.replace(records, at),
            SourcePayload::ActiveAdmissions(records) => self.active_admissions.replace(records, at),
            SourcePayload::AllAdmissions(records) => self.all_admissions.replace(records, at),
            SourcePayload::Appointments(records) => self.appointments.replace(records, at),
            SourcePayload::Doctors(records) => self.doctors.replace(records, at),
            SourcePayload::Patients(records) => self.patients.replace(records, at),
        }
    }

    fn fail(&mut self, kind: SourceKind, error: FetchError) {
        match kind {
            SourceKind::Wards => self.wards.fail(error),
            SourceKind::ActiveAdmissions => self.active_admissions.fail(error),
            SourceKind::AllAdmissions => self.all_admissions.fail(error),
            SourceKind::Appointments => self.appointments.fail(error),
            SourceKind::Doctors => self.doctors.fail(error),
            SourceKind::Patients => self.patients.fail(error),
        }
    }

    pub fn is_ok(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Wards => self.wards.ok(),
            SourceKind::ActiveAdmissions => self.active_admissions.ok(),
            SourceKind::AllAdmissions => self.all_admissions.ok(),
            SourceKind::Appointments => self.appointments.ok(),
            SourceKind::Doctors => self.doctors.ok(),
            SourceKind::Patients => self.patients.ok(),
        }
    }

    fn last_updated(&self, kind: SourceKind) -> Option<DateTime<Utc>> {
        match kind {
            SourceKind::Wards => self.wards.last_updated,
            SourceKind::ActiveAdmissions => self.active_admissions.last_updated,
            SourceKind::AllAdmissions => self.all_admissions.last_updated,
            SourceKind::Appointments => self.appointments.last_updated,
            SourceKind::Doctors => self.doctors.last_updated,
            SourceKind::Patients => self.patients.last_updated,
        }
    }

    fn last_error(&self, kind: SourceKind) -> Option<&FetchError> {
        match kind {
            SourceKind::Wards => self.wards.last_error.as_ref(),
            SourceKind::ActiveAdmissions => self.active_admissions.last_error.as_ref(),
            SourceKind::AllAdmissions => self.all_admissions.last_error.as_ref(),
            SourceKind::Appointments => self.appointments.last_error.as_ref(),
            SourceKind::Doctors => self.doctors.last_error.as_ref(),
            SourceKind::Patients => self.patients.last_error.as_ref(),
        }
    }

    /// Trạng thái `{ last_updated, ok }` của cả sáu nguồn.
    pub fn status(&self) -> Vec<SourceStatus> {
        SourceKind::ALL
            .iter()
            .map(|&kind| SourceStatus {
                source: kind,
                last_updated: self.last_updated(kind),
                ok: self.is_ok(kind),
                stale: match self.cycle_started_at {
                    Some(started_at) => self.is_stale(kind, started_at),
                    None => !self.is_ok(kind),
                },
                error: self.last_error(kind).map(ToString::to_string),
            })
            .collect()
    }

    /// Nguồn lỗi hoặc có snapshot cũ hơn thời điểm bắt đầu chu kỳ.
    pub fn is_stale(&self, kind: SourceKind, cycle_started_at: DateTime<Utc>) -> bool {
        !self.is_ok(kind)
            || self
                .last_updated(kind)
                .map_or(true, |updated| updated < cycle_started_at)
    }

    /// Dữ liệu đầu vào cho một lượt tính; nguồn lỗi cho tập rỗng.
    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            wards: self.wards.for_cycle(),
            active_admissions: self.active_admissions.for_cycle(),
            all_admissions: self.all_admissions.for_cycle(),
            appointments: self.appointments.for_cycle(),
            doctors: self.doctors.for_cycle(),
            patients: self.patients.for_cycle(),
            status: self.status(),
        }
    }
}

/// Ảnh chụp nhất quán dùng cho đúng một lượt tính.
#[derive(Debug, Clone)]
pub struct StoreView<'a> {
    pub wards: &'a [Ward],
    pub active_admissions: &'a [AdmissionRecord],
    pub all_admissions: &'a [AdmissionRecord],
    pub appointments: &'a [AppointmentRecord],
    pub doctors: &'a [DoctorRecord],
    pub patients: &'a [PatientRecord],
    pub status: Vec<SourceStatus>,
}

impl StoreView<'_> {
    pub fn is_ok(&self, kind: SourceKind) -> bool {
        self.status
            .iter()
            .any(|status| status.source == kind && status.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, hour, 0, 0).unwrap()
    }

    fn ward(name: &str) -> Ward {
        Ward {
            ward_name: Some(name.to_string()),
            ..Ward::default()
        }
    }

    #[test]
    fn successful_fetch_replaces_snapshot_wholesale() {
        let mut store = RecordStore::new();
        store.apply(
            SourceKind::Wards,
            Ok(SourcePayload::Wards(vec![ward("A"), ward("B")])),
            at(8),
        );
        store.apply(SourceKind::Wards, Ok(SourcePayload::Wards(vec![ward("C")])), at(9));

        let view = store.view();
        assert_eq!(view.wards.len(), 1);
        assert_eq!(view.wards[0].ward_name.as_deref(), Some("C"));
        assert!(view.is_ok(SourceKind::Wards));
    }

    #[test]
    fn failed_source_contributes_empty_collection_but_keeps_timestamp() {
        let mut store = RecordStore::new();
        store.apply(SourceKind::Wards, Ok(SourcePayload::Wards(vec![ward("A")])), at(8));
        store.apply(SourceKind::Wards, Err(FetchError::Network("timeout".into())), at(9));

        let view = store.view();
        assert!(view.wards.is_empty());
        let status = &store.status()[0];
        assert_eq!(status.source, SourceKind::Wards);
        assert!(!status.ok);
        assert_eq!(status.last_updated, Some(at(8)));
        assert!(status.error.as_deref().unwrap().contains("timeout"));
        assert!(store.is_stale(SourceKind::Wards, at(9)));
    }

    #[test]
    fn never_fetched_source_is_not_ok() {
        let store = RecordStore::new();
        assert!(store.status().iter().all(|status| !status.ok));
        assert!(store.is_stale(SourceKind::Doctors, at(0)));
    }

    #[test]
    fn mismatched_payload_is_a_failure() {
        let mut store = RecordStore::new();
        store.apply(SourceKind::Doctors, Ok(SourcePayload::Wards(vec![ward("A")])), at(8));
        assert!(!store.is_ok(SourceKind::Doctors));
        assert!(store.view().wards.is_empty());
    }

    #[test]
    fn fresh_snapshot_is_not_stale() {
        let mut store = RecordStore::new();
        store.apply(SourceKind::Patients, Ok(SourcePayload::Patients(Vec::new())), at(10));
        assert!(!store.is_stale(SourceKind::Patients, at(10)));
        assert!(store.is_stale(SourceKind::Patients, at(11)));
    }

    #[test]
    fn status_flags_sources_not_refreshed_this_cycle() {
        let mut store = RecordStore::new();
        store.begin_cycle(at(8));
        store.apply(SourceKind::Wards, Ok(SourcePayload::Wards(vec![ward("A")])), at(8));
        store.apply(SourceKind::Doctors, Ok(SourcePayload::Doctors(Vec::new())), at(8));

        store.begin_cycle(at(9));
        store.apply(SourceKind::Wards, Ok(SourcePayload::Wards(vec![ward("B")])), at(9));
        store.apply(SourceKind::Doctors, Err(FetchError::Forbidden), at(9));

        let status = store.status();
        let of = |kind| status.iter().find(|s| s.source == kind).unwrap();
        assert!(!of(SourceKind::Wards).stale);
        assert!(of(SourceKind::Doctors).stale);
        assert_eq!(of(SourceKind::Doctors).last_updated, Some(at(8)));
        assert!(of(SourceKind::Patients).stale);
    }
}

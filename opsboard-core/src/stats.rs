//! Lượt tổng hợp đồng bộ: từ một `StoreView` ra `OperationalStats`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::{daily_series, monthly_series, TimeSeries};
use crate::metrics::{
    average_length_of_stay, count_by_label, doctor_workloads, percentage, top_n, ward_occupancy,
    workload_balance, AppointmentRates, DoctorWorkloadSummary, WardOccupancy, WorkloadBalance,
};
use crate::model::{AdmissionRecord, AdmissionStatus, AppointmentRecord, AppointmentStatus};
use crate::resolver::{age_group_index, derive_age, AgeGroupScheme};
use crate::store::{SourceKind, SourceStatus, StoreView};
use crate::AnalyticsConfig;

/// Nhãn dùng cho bản ghi thiếu/không đọc được giá trị phân loại.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramBucket {
    pub label: String,
    pub count: usize,
}

impl HistogramBucket {
    fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

fn total_count(buckets: &[HistogramBucket]) -> usize {
    buckets.iter().map(|bucket| bucket.count).sum()
}

/// Các khu vực trên dashboard, mỗi khu vực phụ thuộc một số nguồn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DashboardSection {
    WardOccupancy,
    AdmissionTrends,
    AdmissionStatus,
    AppointmentAnalytics,
    DoctorWorkload,
    PatientDemographics,
}

impl DashboardSection {
    pub const ALL: [DashboardSection; 6] = [
        Self::WardOccupancy,
        Self::AdmissionTrends,
        Self::AdmissionStatus,
        Self::AppointmentAnalytics,
        Self::DoctorWorkload,
        Self::PatientDemographics,
    ];

    pub fn depends_on(self) -> &'static [SourceKind] {
        match self {
            Self::WardOccupancy => &[SourceKind::Wards, SourceKind::ActiveAdmissions],
            Self::AdmissionTrends => &[SourceKind::AllAdmissions],
            Self::AdmissionStatus => &[SourceKind::ActiveAdmissions, SourceKind::AllAdmissions],
            Self::AppointmentAnalytics => &[SourceKind::Appointments],
            Self::DoctorWorkload => &[SourceKind::Doctors, SourceKind::Appointments],
            Self::PatientDemographics => &[SourceKind::Patients],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WardTypeSummary {
    pub ward_type: String,
    pub wards: usize,
    pub bed_capacity: u32,
    pub occupied_beds: u32,
    pub occupancy_rate: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WardStats {
    pub occupancy: Vec<WardOccupancy>,
    pub total_beds: u32,
    pub occupied_beds: u32,
    pub available_beds: u32,
    pub occupancy_rate: u8,
    pub by_type: Vec<WardTypeSummary>,
    /// Admission ACTIVE không gắn được vào khoa nào.
    pub unmatched_admissions: usize,
}

/// Phân bố trạng thái trong ngày: đang nằm viện + ra viện / chuyển khoa hôm nay.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyStatusDistribution {
    pub active: usize,
    pub discharged_today: usize,
    pub transferred_today: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdmissionStats {
    pub daily_admissions: TimeSeries<usize>,
    pub daily_discharges: TimeSeries<usize>,
    pub monthly_admissions: TimeSeries<usize>,
    pub status_today: DailyStatusDistribution,
    /// Toàn bộ lịch sử, kể cả nhãn `unknown`.
    pub status_breakdown: Vec<HistogramBucket>,
    pub admitted_today: usize,
    pub average_length_of_stay: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentStats {
    pub overall: AppointmentRates,
    pub today: AppointmentRates,
    pub status_distribution: Vec<HistogramBucket>,
    pub daily_volume: TimeSeries<usize>,
    pub monthly_completion_rate: TimeSeries<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorStats {
    pub workloads: Vec<DoctorWorkloadSummary>,
    pub top_doctors: Vec<DoctorWorkloadSummary>,
    pub total_doctors: usize,
    pub busy_doctors: usize,
    pub workload_balance: WorkloadBalance,
    pub by_specialization: Vec<HistogramBucket>,
}

impl Default for DoctorStats {
    fn default() -> Self {
        Self {
            workloads: Vec::new(),
            top_doctors: Vec::new(),
            total_doctors: 0,
            busy_doctors: 0,
            workload_balance: WorkloadBalance::WellBalanced,
            by_specialization: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgeGroupHistogram {
    pub scheme: AgeGroupScheme,
    pub buckets: Vec<HistogramBucket>,
}

impl AgeGroupHistogram {
    pub fn empty(scheme: AgeGroupScheme) -> Self {
        Self {
            scheme,
            buckets: scheme
                .labels()
                .iter()
                .map(|label| HistogramBucket::new(*label, 0))
                .collect(),
        }
    }

    pub fn total(&self) -> usize {
        total_count(&self.buckets)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientStats {
    pub total_patients: usize,
    pub age_groups: AgeGroupHistogram,
    /// Bệnh nhân thiếu ngày sinh hợp lệ, không có trong `age_groups`.
    pub excluded_from_age_groups: usize,
    pub gender_distribution: Vec<HistogramBucket>,
    pub registered_this_month: usize,
    pub monthly_registrations: TimeSeries<usize>,
}

/// Kết quả tổng hợp của một chu kỳ; không bao giờ bị sửa sau khi tạo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationalStats {
    pub generated_at: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub sources: Vec<SourceStatus>,
    pub wards: WardStats,
    pub admissions: AdmissionStats,
    pub appointments: AppointmentStats,
    pub doctors: DoctorStats,
    pub patients: PatientStats,
}

impl OperationalStats {
    pub fn source_ok(&self, kind: SourceKind) -> bool {
        self.sources
            .iter()
            .any(|status| status.source == kind && status.ok)
    }

    /// Khu vực hiển thị được khi mọi nguồn phụ thuộc đều khả dụng.
    pub fn is_section_available(&self, section: DashboardSection) -> bool {
        section
            .depends_on()
            .iter()
            .all(|kind| self.source_ok(*kind))
    }

    pub fn unavailable_sections(&self) -> Vec<DashboardSection> {
        DashboardSection::ALL
            .into_iter()
            .filter(|section| !self.is_section_available(*section))
            .collect()
    }
}

/// Tính toàn bộ thống kê từ một snapshot. `as_of` cố định cho cả lượt.
pub fn compute_stats(
    view: &StoreView<'_>,
    config: &AnalyticsConfig,
    as_of: NaiveDate,
    generated_at: DateTime<Utc>,
) -> OperationalStats {
    OperationalStats {
        generated_at,
        as_of,
        sources: view.status.clone(),
        wards: ward_stats(view),
        admissions: admission_stats(view, config, as_of),
        appointments: appointment_stats(view.appointments, config, as_of),
        doctors: doctor_stats(view, config, as_of),
        patients: patient_stats(view, config, as_of),
    }
}

fn ward_stats(view: &StoreView<'_>) -> WardStats {
    let breakdown = ward_occupancy(view.wards, view.active_admissions);

    let total_beds: u32 = breakdown.wards.iter().map(|ward| ward.bed_capacity).sum();
    let occupied_beds: u32 = breakdown.wards.iter().map(|ward| ward.occupied_beds).sum();

    let mut by_type: Vec<WardTypeSummary> = Vec::new();
    for ward in &breakdown.wards {
        let ward_type = ward
            .ward_type
            .clone()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        let index = match by_type.iter().position(|entry| entry.ward_type == ward_type) {
            Some(index) => index,
            None => {
                by_type.push(WardTypeSummary {
                    ward_type,
                    ..WardTypeSummary::default()
                });
                by_type.len() - 1
            }
        };
        let entry = &mut by_type[index];
        entry.wards += 1;
        entry.bed_capacity += ward.bed_capacity;
        entry.occupied_beds += ward.occupied_beds;
    }
    for entry in &mut by_type {
        entry.occupancy_rate =
            percentage(entry.occupied_beds as usize, entry.bed_capacity as usize);
    }

    WardStats {
        total_beds,
        occupied_beds,
        available_beds: total_beds - occupied_beds,
        occupancy_rate: percentage(occupied_beds as usize, total_beds as usize),
        by_type,
        unmatched_admissions: breakdown.unmatched.len(),
        occupancy: breakdown.wards,
    }
}

fn admission_stats(view: &StoreView<'_>, config: &AnalyticsConfig, as_of: NaiveDate) -> AdmissionStats {
    let history = view.all_admissions;
    let count = |group: &[&AdmissionRecord]| group.len();

    let daily_admissions = daily_series(history, as_of, config.trend_days, AdmissionRecord::admitted_on, count);
    let daily_discharges = daily_series(
        history,
        as_of,
        config.trend_days,
        |record: &AdmissionRecord| {
            if record.is_active() {
                None
            } else {
                record.discharged_on()
            }
        },
        count,
    );
    let monthly_admissions =
        monthly_series(history, as_of, config.trend_months, AdmissionRecord::admitted_on, count);

    let left_today = |status: AdmissionStatus| {
        history
            .iter()
            .filter(|record| record.status == Some(status) && record.discharged_on() == Some(as_of))
            .count()
    };
    let status_today = DailyStatusDistribution {
        active: view.active_admissions.iter().filter(|record| record.is_active()).count(),
        discharged_today: left_today(AdmissionStatus::Discharged),
        transferred_today: left_today(AdmissionStatus::Transferred),
    };

    let mut status_breakdown: Vec<HistogramBucket> = AdmissionStatus::ALL
        .iter()
        .map(|status| {
            let count = history.iter().filter(|record| record.status == Some(*status)).count();
            HistogramBucket::new(status.label(), count)
        })
        .collect();
    let unknown = history.len() - total_count(&status_breakdown);
    status_breakdown.push(HistogramBucket::new(UNKNOWN_LABEL, unknown));

    let discharged: Vec<AdmissionRecord> = history
        .iter()
        .filter(|record| matches!(record.status, Some(AdmissionStatus::Discharged)))
        .cloned()
        .collect();

    AdmissionStats {
        daily_admissions,
        daily_discharges,
        monthly_admissions,
        status_today,
        status_breakdown,
        admitted_today: history
            .iter()
            .filter(|record| record.admitted_on() == Some(as_of))
            .count(),
        average_length_of_stay: average_length_of_stay(&discharged),
    }
}

fn appointment_stats(
    appointments: &[AppointmentRecord],
    config: &AnalyticsConfig,
    as_of: NaiveDate,
) -> AppointmentStats {
    let date_of = |record: &AppointmentRecord| record.appointment_date;

    let mut status_distribution: Vec<HistogramBucket> = AppointmentStatus::ALL
        .iter()
        .map(|status| {
            let count = appointments
                .iter()
                .filter(|record| record.status == Some(*status))
                .count();
            HistogramBucket::new(status.label(), count)
        })
        .collect();
    let unknown = appointments.len() - total_count(&status_distribution);
    status_distribution.push(HistogramBucket::new(UNKNOWN_LABEL, unknown));

    AppointmentStats {
        overall: AppointmentRates::from_appointments(appointments),
        today: AppointmentRates::from_appointments(
            appointments
                .iter()
                .filter(|record| record.appointment_date == Some(as_of)),
        ),
        status_distribution,
        daily_volume: daily_series(appointments, as_of, config.trend_days, date_of, |group| group.len()),
        monthly_completion_rate: monthly_series(
            appointments,
            as_of,
            config.trend_months,
            date_of,
            |group| AppointmentRates::from_appointments(group.iter().copied()).completion_rate,
        ),
    }
}

fn doctor_stats(view: &StoreView<'_>, config: &AnalyticsConfig, as_of: NaiveDate) -> DoctorStats {
    let workloads = doctor_workloads(view.doctors, view.appointments);

    let todays: Vec<AppointmentRecord> = view
        .appointments
        .iter()
        .filter(|record| record.appointment_date == Some(as_of))
        .filter(|record| {
            !matches!(
                record.status,
                Some(AppointmentStatus::Cancelled) | Some(AppointmentStatus::NoShow)
            )
        })
        .cloned()
        .collect();
    let busy_doctors = doctor_workloads(view.doctors, &todays)
        .iter()
        .filter(|row| row.total >= config.busy_doctor_threshold)
        .count();

    let by_specialization = count_by_label(view.doctors.iter().map(|doctor| {
        doctor
            .specialization
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(UNKNOWN_LABEL)
    }))
    .into_iter()
    .map(|(label, count)| HistogramBucket::new(label, count))
    .collect();

    DoctorStats {
        top_doctors: top_n(workloads.clone(), config.top_doctors, |row| row.total),
        total_doctors: workloads.len(),
        busy_doctors,
        workload_balance: workload_balance(busy_doctors, workloads.len()),
        by_specialization,
        workloads,
    }
}

fn patient_stats(view: &StoreView<'_>, config: &AnalyticsConfig, as_of: NaiveDate) -> PatientStats {
    let patients = view.patients;

    let mut age_groups = AgeGroupHistogram::empty(config.age_scheme);
    let mut excluded = 0;
    for patient in patients {
        match patient.date_of_birth.and_then(|dob| derive_age(dob, as_of)) {
            Some(age) => age_groups.buckets[age_group_index(age, config.age_scheme)].count += 1,
            None => {
                log::debug!(
                    "patient {:?} excluded from age groups: no usable date of birth",
                    patient.patient_id
                );
                excluded += 1;
            }
        }
    }

    let gender_distribution = ["male", "female", "other", UNKNOWN_LABEL]
        .iter()
        .map(|label| {
            let count = patients
                .iter()
                .filter(|patient| patient.gender.map_or(UNKNOWN_LABEL, |g| g.label()) == *label)
                .count();
            HistogramBucket::new(*label, count)
        })
        .collect();

    let monthly_registrations = monthly_series(
        patients,
        as_of,
        config.trend_months,
        |patient| patient.registration_date,
        |group| group.len(),
    );
    let registered_this_month = monthly_registrations.values().last().copied().unwrap_or(0);

    PatientStats {
        total_patients: patients.len(),
        age_groups,
        excluded_from_age_groups: excluded,
        gender_distribution,
        registered_this_month,
        monthly_registrations,
    }
}

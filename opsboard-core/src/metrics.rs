//! Các hàm tính tỉ lệ, xếp hạng và phân loại trên tập bản ghi đã lọc.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{AdmissionRecord, AppointmentRecord, AppointmentStatus, DoctorRecord, Ward};
use crate::resolver::resolve_ward_match;

/// Phần trăm nguyên, làm tròn half-away-from-zero; `total == 0` cho 0.
pub fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let part = part.min(total) as u128;
    let total = total as u128;
    ((200 * part + total) / (2 * total)) as u8
}

/// Trung bình số ngày nằm viện (làm tròn lên theo từng bản ghi).
pub fn average_length_of_stay(admissions: &[AdmissionRecord]) -> f64 {
    let stays: Vec<i64> = admissions.iter().filter_map(length_of_stay_days).collect();
    if stays.is_empty() {
        return 0.0;
    }
    stays.iter().sum::<i64>() as f64 / stays.len() as f64
}

/// Số ngày nằm viện; `None` khi thiếu ngày hoặc ngày ra viện trước ngày nhập viện.
pub fn length_of_stay_days(admission: &AdmissionRecord) -> Option<i64> {
    let admitted = admission.admission_date?;
    let discharged = admission.discharge_date?;
    let seconds = (discharged - admitted).num_seconds();
    if seconds < 0 {
        return None;
    }
    Some((seconds + 86_399) / 86_400)
}

/// `n` phần tử lớn nhất theo `key`, giữ thứ tự gốc khi bằng nhau.
pub fn top_n<T, K, F>(mut items: Vec<T>, n: usize, key: F) -> Vec<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items.truncate(n);
    items
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadBalance {
    WellBalanced,
    HighLoad,
}

impl WorkloadBalance {
    pub fn label(self) -> &'static str {
        match self {
            Self::WellBalanced => "well balanced",
            Self::HighLoad => "high load",
        }
    }
}

/// Ngưỡng cố định 50% số bác sĩ bận.
pub fn workload_balance(busy_count: usize, total_count: usize) -> WorkloadBalance {
    if busy_count * 2 < total_count || total_count == 0 {
        WorkloadBalance::WellBalanced
    } else {
        WorkloadBalance::HighLoad
    }
}

/// Có thể âm; không kẹp về 0.
pub fn efficiency_score(completion_rate: u8, cancellation_rate: u8, no_show_rate: u8) -> i32 {
    i32::from(completion_rate) - i32::from(cancellation_rate) - i32::from(no_show_rate)
}

/// Tổng hợp trạng thái của một nhóm lịch hẹn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRates {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub cancelled: usize,
    pub no_show: usize,
    pub completion_rate: u8,
    pub cancellation_rate: u8,
    pub no_show_rate: u8,
    pub efficiency_score: i32,
}

impl AppointmentRates {
    /// Lịch hẹn không đọc được trạng thái bị loại khỏi mẫu số.
    pub fn from_appointments<'a, I>(appointments: I) -> Self
    where
        I: IntoIterator<Item = &'a AppointmentRecord>,
    {
        let mut rates = Self::default();
        for status in appointments.into_iter().filter_map(|appt| appt.status) {
            rates.total += 1;
            match status {
                AppointmentStatus::Completed => rates.completed += 1,
                AppointmentStatus::Cancelled => rates.cancelled += 1,
                AppointmentStatus::NoShow => rates.no_show += 1,
                other if other.is_pending() => rates.pending += 1,
                _ => {}
            }
        }
        rates.completion_rate = percentage(rates.completed, rates.total);
        rates.cancellation_rate = percentage(rates.cancelled, rates.total);
        rates.no_show_rate = percentage(rates.no_show, rates.total);
        rates.efficiency_score = efficiency_score(
            rates.completion_rate,
            rates.cancellation_rate,
            rates.no_show_rate,
        );
        rates
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorWorkloadSummary {
    pub doctor_id: Option<String>,
    pub name: String,
    pub specialization: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub scheduled: usize,
    pub cancelled: usize,
    pub completion_rate: u8,
    /// (completed + scheduled) / total
    pub efficiency: u8,
    pub efficiency_score: i32,
}

/// Một dòng cho mỗi bác sĩ, theo thứ tự đầu vào.
pub fn doctor_workloads(
    doctors: &[DoctorRecord],
    appointments: &[AppointmentRecord],
) -> Vec<DoctorWorkloadSummary> {
    let mut by_doctor: HashMap<&str, Vec<&AppointmentRecord>> = HashMap::new();
    for appointment in appointments {
        if let Some(doctor_id) = appointment.doctor_id.as_deref() {
            by_doctor.entry(doctor_id.trim()).or_default().push(appointment);
        }
    }

    doctors
        .iter()
        .map(|doctor| {
            let own = doctor
                .doctor_id
                .as_deref()
                .and_then(|id| by_doctor.get(id.trim()))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let rates = AppointmentRates::from_appointments(own.iter().copied());
            DoctorWorkloadSummary {
                doctor_id: doctor.doctor_id.clone(),
                name: doctor
                    .name
                    .clone()
                    .unwrap_or_else(|| "Unknown doctor".to_string()),
                specialization: doctor.specialization.clone(),
                total: rates.total,
                completed: rates.completed,
                scheduled: rates.pending,
                cancelled: rates.cancelled,
                completion_rate: rates.completion_rate,
                efficiency: percentage(rates.completed + rates.pending, rates.total),
                efficiency_score: rates.efficiency_score,
            }
        })
        .collect()
}

/// Công suất giường của một khoa.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WardOccupancy {
    pub ward_id: Option<String>,
    pub ward_name: String,
    pub ward_type: Option<String>,
    pub bed_capacity: u32,
    pub occupied_beds: u32,
    pub available_beds: u32,
    pub occupancy_rate: u8,
    /// Số admission vượt quá sức chứa (không tính vào `occupied_beds`).
    pub overflow: u32,
    pub admissions: Vec<AdmissionRecord>,
}

/// Kết quả gắn admission đang nằm viện vào các khoa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccupancyBreakdown {
    pub wards: Vec<WardOccupancy>,
    pub unmatched: Vec<AdmissionRecord>,
}

/// Chỉ admission ACTIVE được tính; mỗi admission thuộc tối đa một khoa.
pub fn ward_occupancy(wards: &[Ward], admissions: &[AdmissionRecord]) -> OccupancyBreakdown {
    let mut matched: Vec<Vec<AdmissionRecord>> = vec![Vec::new(); wards.len()];
    let mut unmatched = Vec::new();

    for admission in admissions.iter().filter(|a| a.is_active()) {
        let slot = resolve_ward_match(admission, wards)
            .and_then(|found| wards.iter().position(|ward| std::ptr::eq(ward, found.ward)));
        match slot {
            Some(index) => matched[index].push(admission.clone()),
            None => {
                log::debug!(
                    "admission {:?} did not match any ward (ward_id={:?}, ward_name={:?})",
                    admission.admission_id,
                    admission.ward_id,
                    admission.ward_name
                );
                unmatched.push(admission.clone());
            }
        }
    }

    let wards = wards
        .iter()
        .zip(matched)
        .map(|(ward, admissions)| {
            let count = u32::try_from(admissions.len()).unwrap_or(u32::MAX);
            let occupied_beds = count.min(ward.bed_capacity);
            WardOccupancy {
                ward_id: ward.ward_id.clone(),
                ward_name: ward.display_name(),
                ward_type: ward.ward_type.clone(),
                bed_capacity: ward.bed_capacity,
                occupied_beds,
                available_beds: ward.bed_capacity - occupied_beds,
                occupancy_rate: percentage(occupied_beds as usize, ward.bed_capacity as usize),
                overflow: count - occupied_beds,
                admissions,
            }
        })
        .collect();

    OccupancyBreakdown { wards, unmatched }
}

/// Đếm theo nhãn, giữ thứ tự xuất hiện đầu tiên.
pub fn count_by_label<'a, I>(labels: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(existing, _)| existing.as_str() == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }
    counts
}

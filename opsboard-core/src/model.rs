//! Bản ghi đầu vào (ward, admission, appointment, doctor, patient).
//!
//! Mọi trường có thể thiếu hoặc sai định dạng ở nguồn đều là `Option`;
//! việc loại bản ghi khỏi một thống kê cụ thể do các bước tính toán quyết định.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Số giường cố định của mỗi khoa.
pub const WARD_BED_CAPACITY: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ward {
    pub ward_id: Option<String>,
    pub ward_name: Option<String>,
    pub ward_type: Option<String>,
    pub bed_capacity: u32,
}

impl Default for Ward {
    fn default() -> Self {
        Self {
            ward_id: None,
            ward_name: None,
            ward_type: None,
            bed_capacity: WARD_BED_CAPACITY,
        }
    }
}

impl Ward {
    /// Nhãn hiển thị: tên khoa, nếu không có thì dùng id.
    pub fn display_name(&self) -> String {
        self.ward_name
            .clone()
            .or_else(|| self.ward_id.as_ref().map(|id| format!("Ward {id}")))
            .unwrap_or_else(|| "Unnamed ward".to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionStatus {
    Active,
    Discharged,
    Transferred,
}

impl AdmissionStatus {
    pub const ALL: [AdmissionStatus; 3] = [Self::Active, Self::Discharged, Self::Transferred];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" | "ADMITTED" => Some(Self::Active),
            "DISCHARGED" => Some(Self::Discharged),
            "TRANSFERRED" => Some(Self::Transferred),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Discharged => "DISCHARGED",
            Self::Transferred => "TRANSFERRED",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdmissionRecord {
    pub admission_id: Option<String>,
    pub patient_id: Option<String>,
    pub ward_id: Option<String>,
    pub ward_name: Option<String>,
    pub status: Option<AdmissionStatus>,
    pub admission_date: Option<NaiveDateTime>,
    pub discharge_date: Option<NaiveDateTime>,
}

impl AdmissionRecord {
    pub fn admitted_on(&self) -> Option<NaiveDate> {
        self.admission_date.map(|at| at.date())
    }

    pub fn discharged_on(&self) -> Option<NaiveDate> {
        self.discharge_date.map(|at| at.date())
    }

    pub fn is_active(&self) -> bool {
        self.status == Some(AdmissionStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
    Confirmed,
    InProgress,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        Self::Scheduled,
        Self::Completed,
        Self::Cancelled,
        Self::NoShow,
        Self::Confirmed,
        Self::InProgress,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "SCHEDULED" => Some(Self::Scheduled),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" | "CANCELED" => Some(Self::Cancelled),
            "NO_SHOW" | "NOSHOW" => Some(Self::NoShow),
            "CONFIRMED" => Some(Self::Confirmed),
            "IN_PROGRESS" => Some(Self::InProgress),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
            Self::Confirmed => "CONFIRMED",
            Self::InProgress => "IN_PROGRESS",
        }
    }

    /// Lịch hẹn chưa kết thúc (được tính là "scheduled" trong workload).
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed | Self::InProgress)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    pub appointment_id: Option<String>,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DoctorRecord {
    pub doctor_id: Option<String>,
    pub name: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            "other" | "o" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    pub patient_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub registration_date: Option<NaiveDate>,
}

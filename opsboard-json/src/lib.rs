//! JSON collections from the hospital REST backend into typed records.
//!
//! Parsing is tolerant at the record level: a missing or malformed field
//! becomes `None` and never rejects the record. Only a document that is not a
//! collection at all is an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use opsboard_core::{
    AdmissionRecord, AdmissionStatus, AnalyticsError, AppointmentRecord, AppointmentStatus,
    DoctorRecord, FetchError, Gender, PatientRecord, RecordStore, SourceKind, SourcePayload, Ward,
    WARD_BED_CAPACITY,
};

/// Parse one source collection from a JSON string.
pub fn parse_source_str(kind: SourceKind, json: &str) -> Result<SourcePayload, AnalyticsError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| AnalyticsError::Parse(err.to_string()))?;
    parse_source_value(kind, &value)
}

/// Parse one source collection from a `serde_json::Value`.
pub fn parse_source_value(kind: SourceKind, value: &Value) -> Result<SourcePayload, AnalyticsError> {
    Ok(match kind {
        SourceKind::Wards => SourcePayload::Wards(parse_wards(value)?),
        SourceKind::ActiveAdmissions => SourcePayload::ActiveAdmissions(parse_admissions(value)?),
        SourceKind::AllAdmissions => SourcePayload::AllAdmissions(parse_admissions(value)?),
        SourceKind::Appointments => SourcePayload::Appointments(parse_appointments(value)?),
        SourceKind::Doctors => SourcePayload::Doctors(parse_doctors(value)?),
        SourceKind::Patients => SourcePayload::Patients(parse_patients(value)?),
    })
}

pub fn parse_wards(value: &Value) -> Result<Vec<Ward>, AnalyticsError> {
    Ok(collection(value)?.iter().filter_map(parse_ward).collect())
}

pub fn parse_admissions(value: &Value) -> Result<Vec<AdmissionRecord>, AnalyticsError> {
    Ok(collection(value)?.iter().filter_map(parse_admission).collect())
}

pub fn parse_appointments(value: &Value) -> Result<Vec<AppointmentRecord>, AnalyticsError> {
    Ok(collection(value)?
        .iter()
        .filter_map(parse_appointment)
        .collect())
}

pub fn parse_doctors(value: &Value) -> Result<Vec<DoctorRecord>, AnalyticsError> {
    Ok(collection(value)?.iter().filter_map(parse_doctor).collect())
}

pub fn parse_patients(value: &Value) -> Result<Vec<PatientRecord>, AnalyticsError> {
    Ok(collection(value)?.iter().filter_map(parse_patient).collect())
}

/// Accepts a bare array or a `{ "data": [...] }` envelope.
fn collection(value: &Value) -> Result<&Vec<Value>, AnalyticsError> {
    if let Some(items) = value.as_array() {
        return Ok(items);
    }
    for key in ["data", "content", "items"] {
        if let Some(items) = value.get(key).and_then(Value::as_array) {
            return Ok(items);
        }
    }
    Err(AnalyticsError::Parse(format!(
        "expected a JSON array of records, received {}",
        value_kind(value)
    )))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_ward(record: &Value) -> Option<Ward> {
    if !record.is_object() {
        log::debug!("skipping non-object ward entry");
        return None;
    }
    Some(Ward {
        ward_id: extract_id(record, &["wardId", "ward_id", "id"]),
        ward_name: extract_text(record, &["wardName", "ward_name", "name"]),
        ward_type: extract_text(record, &["wardType", "ward_type", "type"]),
        bed_capacity: WARD_BED_CAPACITY,
    })
}

fn parse_admission(record: &Value) -> Option<AdmissionRecord> {
    if !record.is_object() {
        log::debug!("skipping non-object admission entry");
        return None;
    }
    let ward = record.get("ward");
    let patient = record.get("patient");

    let status_raw = extract_text(record, &["status", "admissionStatus"]);
    let status = status_raw.as_deref().and_then(AdmissionStatus::parse);
    if status.is_none() {
        log::debug!("admission has unrecognised status {status_raw:?}");
    }

    let discharge_date = extract_datetime(record, &["dischargeDate", "discharge_date", "dischargedAt"]);

    Some(AdmissionRecord {
        admission_id: extract_id(record, &["admissionId", "admission_id", "id"]),
        patient_id: extract_id(record, &["patientId", "patient_id"])
            .or_else(|| patient.and_then(|p| extract_id(p, &["patientId", "id"]))),
        ward_id: extract_id(record, &["wardId", "ward_id"])
            .or_else(|| ward.and_then(|w| extract_id(w, &["wardId", "id"]))),
        ward_name: extract_text(record, &["wardName", "ward_name"])
            .or_else(|| ward.and_then(|w| extract_text(w, &["wardName", "name"])))
            .or_else(|| ward.and_then(Value::as_str).map(str::to_string)),
        status,
        admission_date: extract_datetime(record, &["admissionDate", "admission_date", "admittedAt"]),
        discharge_date: match status {
            Some(AdmissionStatus::Active) => None,
            _ => discharge_date,
        },
    })
}

fn parse_appointment(record: &Value) -> Option<AppointmentRecord> {
    if !record.is_object() {
        log::debug!("skipping non-object appointment entry");
        return None;
    }
    let doctor = record.get("doctor");
    let patient = record.get("patient");

    let scheduled_at = extract_local_datetime(record, &["appointmentDateTime", "scheduledAt"]);

    Some(AppointmentRecord {
        appointment_id: extract_id(record, &["appointmentId", "appointment_id", "id"]),
        doctor_id: extract_id(record, &["doctorId", "doctor_id"])
            .or_else(|| doctor.and_then(|d| extract_id(d, &["doctorId", "id"]))),
        patient_id: extract_id(record, &["patientId", "patient_id"])
            .or_else(|| patient.and_then(|p| extract_id(p, &["patientId", "id"]))),
        status: extract_text(record, &["status", "appointmentStatus"])
            .as_deref()
            .and_then(AppointmentStatus::parse),
        appointment_date: extract_date(record, &["appointmentDate", "appointment_date", "date"])
            .or_else(|| scheduled_at.map(|at| at.date())),
        appointment_time: extract_text(record, &["appointmentTime", "appointment_time", "time"])
            .as_deref()
            .and_then(parse_time)
            .or_else(|| scheduled_at.map(|at| at.time())),
    })
}

fn parse_doctor(record: &Value) -> Option<DoctorRecord> {
    if !record.is_object() {
        log::debug!("skipping non-object doctor entry");
        return None;
    }
    let name = extract_text(record, &["name", "fullName", "doctorName"]).or_else(|| {
        let parts: Vec<String> = ["firstName", "lastName"]
            .iter()
            .filter_map(|key| extract_text(record, &[*key]))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    });

    Some(DoctorRecord {
        doctor_id: extract_id(record, &["doctorId", "doctor_id", "id"]),
        name,
        specialization: extract_text(record, &["specialization", "specialty", "department"]),
    })
}

fn parse_patient(record: &Value) -> Option<PatientRecord> {
    if !record.is_object() {
        log::debug!("skipping non-object patient entry");
        return None;
    }
    Some(PatientRecord {
        patient_id: extract_id(record, &["patientId", "patient_id", "id"]),
        date_of_birth: extract_date(record, &["dateOfBirth", "date_of_birth", "dob", "birthDate"]),
        gender: extract_text(record, &["gender", "sex"])
            .as_deref()
            .and_then(Gender::parse),
        registration_date: extract_date(
            record,
            &["registrationDate", "registration_date", "registeredAt", "createdAt"],
        ),
    })
}

/// Ids arrive as strings or numbers depending on the endpoint.
fn extract_id(record: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match record.get(*field)? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn extract_text(record: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        record
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

fn extract_datetime(record: &Value, fields: &[&str]) -> Option<NaiveDateTime> {
    fields.iter().find_map(|field| {
        record
            .get(*field)
            .and_then(Value::as_str)
            .and_then(parse_datetime)
    })
}

fn extract_local_datetime(record: &Value, fields: &[&str]) -> Option<NaiveDateTime> {
    fields.iter().find_map(|field| {
        record
            .get(*field)
            .and_then(Value::as_str)
            .and_then(parse_local_datetime)
    })
}

fn extract_date(record: &Value, fields: &[&str]) -> Option<NaiveDate> {
    extract_local_datetime(record, fields).map(|at| at.date())
}

/// `YYYY-MM-DD`, RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` timestamp.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    parse_date(value).and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Like [`parse_datetime`] but keeps the wall clock of an explicit offset.
/// Calendar fields (birth date, appointment day) must not move across midnight.
pub fn parse_local_datetime(value: &str) -> Option<NaiveDateTime> {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(parsed) => Some(parsed.naive_local()),
        Err(_) => parse_datetime(value),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value.trim(), format).ok())
}

/// JSON key of each source inside a combined dashboard document.
pub fn bundle_key(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Wards => "wards",
        SourceKind::ActiveAdmissions => "activeAdmissions",
        SourceKind::AllAdmissions => "admissions",
        SourceKind::Appointments => "appointments",
        SourceKind::Doctors => "doctors",
        SourceKind::Patients => "patients",
    }
}

/// All six collections captured in one JSON object.
///
/// A key that is absent (or not a collection) marks that source as
/// unavailable instead of failing the whole document.
#[derive(Debug, Clone)]
pub struct DashboardBundle {
    pub sources: Vec<(SourceKind, Result<SourcePayload, FetchError>)>,
}

impl DashboardBundle {
    pub fn from_json(json: &str) -> Result<Self, AnalyticsError> {
        let value: Value =
            serde_json::from_str(json).map_err(|err| AnalyticsError::Parse(err.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, AnalyticsError> {
        if !value.is_object() {
            return Err(AnalyticsError::Parse(format!(
                "expected a dashboard object, received {}",
                value_kind(value)
            )));
        }

        let sources = SourceKind::ALL
            .iter()
            .map(|&kind| {
                let result = match value.get(bundle_key(kind)) {
                    Some(section) => parse_source_value(kind, section)
                        .map_err(|err| FetchError::Malformed(err.to_string())),
                    None => Err(FetchError::Malformed(format!(
                        "missing `{}` collection",
                        bundle_key(kind)
                    ))),
                };
                (kind, result)
            })
            .collect();

        Ok(Self { sources })
    }

    /// Load every source into a fresh store stamped with `at`.
    pub fn into_store(self, at: DateTime<Utc>) -> RecordStore {
        let mut store = RecordStore::new();
        store.begin_cycle(at);
        for (kind, result) in self.sources {
            store.apply(kind, result, at);
        }
        store
    }
}

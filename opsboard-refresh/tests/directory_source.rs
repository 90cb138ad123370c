use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use opsboard_core::{AnalyticsConfig, DashboardSection, FetchError, SourceKind, SourcePayload};
use opsboard_refresh::{AnalyticsOrchestrator, CycleOutcome, DirectorySource, RecordSource};

fn clinic_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/clinic")
}

#[tokio::test]
async fn reads_each_collection_file() {
    let source = DirectorySource::new(clinic_dir());

    match source.fetch(SourceKind::ActiveAdmissions).await {
        Ok(SourcePayload::ActiveAdmissions(records)) => assert_eq!(records.len(), 2),
        other => panic!("unexpected payload: {other:?}"),
    }
    match source.fetch(SourceKind::Doctors).await {
        Ok(SourcePayload::Doctors(records)) => {
            assert_eq!(records[0].doctor_id.as_deref(), Some("7"));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn error_body_is_malformed_and_missing_dir_is_network() {
    let source = DirectorySource::new(clinic_dir());
    assert!(matches!(
        source.fetch(SourceKind::Patients).await,
        Err(FetchError::Malformed(_))
    ));

    let missing = DirectorySource::new(clinic_dir().join("does-not-exist"));
    assert!(matches!(
        missing.fetch(SourceKind::Wards).await,
        Err(FetchError::Network(_))
    ));
}

#[tokio::test]
async fn directory_cycle_reports_partial_failure() {
    let orchestrator = Arc::new(
        AnalyticsOrchestrator::new(DirectorySource::new(clinic_dir()), AnalyticsConfig::default())
            .unwrap()
            .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap())),
    );

    let report = orchestrator.refresh().await.unwrap();
    assert_eq!(
        report.outcome,
        CycleOutcome::PartialFailure {
            failed: vec![SourceKind::Patients]
        }
    );

    let stats = &report.stats;
    assert!(!stats.is_section_available(DashboardSection::PatientDemographics));
    assert!(stats.is_section_available(DashboardSection::WardOccupancy));
    assert_eq!(stats.wards.occupied_beds, 2);
    assert_eq!(stats.wards.unmatched_admissions, 0);
    assert_eq!(stats.admissions.average_length_of_stay, 3.0);
    assert_eq!(stats.doctors.workloads[0].efficiency, 100);
    assert_eq!(stats.patients.total_patients, 0);
}

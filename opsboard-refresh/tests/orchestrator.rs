use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Semaphore;

use opsboard_core::{
    AdmissionRecord, AdmissionStatus, AnalyticsConfig, AppointmentRecord, AppointmentStatus,
    DashboardSection, DoctorRecord, FetchError, SourceKind, SourcePayload, Ward,
};
use opsboard_refresh::{
    AnalyticsOrchestrator, Clock, CycleOutcome, RecordSource, RefreshError, RefreshPhase,
};

#[derive(Clone, Default)]
struct FakeSource {
    calls: Arc<AtomicUsize>,
    failing: Arc<Mutex<HashSet<SourceKind>>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSource {
    fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    fn fail(&self, kind: SourceKind) {
        self.failing.lock().unwrap().insert(kind);
    }

    fn recover(&self, kind: SourceKind) {
        self.failing.lock().unwrap().remove(&kind);
    }

    fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(SourceKind::ALL.len());
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch(&self, kind: SourceKind) -> Result<SourcePayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.failing.lock().unwrap().contains(&kind) {
            return Err(FetchError::Server("503 Service Unavailable".into()));
        }
        Ok(payload(kind))
    }
}

fn payload(kind: SourceKind) -> SourcePayload {
    let active = || {
        vec![
            AdmissionRecord {
                ward_id: Some("1".into()),
                status: Some(AdmissionStatus::Active),
                ..AdmissionRecord::default()
            },
            AdmissionRecord {
                ward_name: Some("ward1".into()),
                status: Some(AdmissionStatus::Active),
                ..AdmissionRecord::default()
            },
        ]
    };
    match kind {
        SourceKind::Wards => SourcePayload::Wards(vec![Ward {
            ward_id: Some("1".into()),
            ward_name: Some("Ward 1".into()),
            ..Ward::default()
        }]),
        SourceKind::ActiveAdmissions => SourcePayload::ActiveAdmissions(active()),
        SourceKind::AllAdmissions => SourcePayload::AllAdmissions(active()),
        SourceKind::Appointments => SourcePayload::Appointments(
            [
                AppointmentStatus::Completed,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ]
            .into_iter()
            .map(|status| AppointmentRecord {
                doctor_id: Some("d1".into()),
                status: Some(status),
                ..AppointmentRecord::default()
            })
            .collect(),
        ),
        SourceKind::Doctors => SourcePayload::Doctors(vec![DoctorRecord {
            doctor_id: Some("d1".into()),
            name: Some("Dr. An".into()),
            specialization: None,
        }]),
        SourceKind::Patients => SourcePayload::Patients(Vec::new()),
    }
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
}

fn fixed_clock() -> Clock {
    Arc::new(fixed_time)
}

fn orchestrator(source: FakeSource) -> Arc<AnalyticsOrchestrator<FakeSource>> {
    Arc::new(
        AnalyticsOrchestrator::new(source, AnalyticsConfig::default())
            .unwrap()
            .with_clock(fixed_clock()),
    )
}

#[tokio::test]
async fn nothing_is_published_before_first_cycle() {
    let orchestrator = orchestrator(FakeSource::default());
    assert!(orchestrator.latest().is_none());
    assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
}

#[tokio::test]
async fn healthy_cycle_is_ready() {
    let source = FakeSource::default();
    let orchestrator = orchestrator(source.clone());

    let report = orchestrator.refresh().await.unwrap();
    assert_eq!(report.cycle, 1);
    assert_eq!(report.outcome, CycleOutcome::Ready);
    assert_eq!(source.calls(), SourceKind::ALL.len());
    assert_eq!(report.stats.wards.occupancy[0].occupied_beds, 2);
    assert_eq!(report.stats.wards.occupancy[0].occupancy_rate, 10);
    assert_eq!(report.stats.as_of, fixed_time().date_naive());
    assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
    assert_eq!(orchestrator.latest().unwrap().cycle, 1);
}

#[tokio::test]
async fn failed_source_only_blanks_its_sections() {
    let source = FakeSource::default();
    source.fail(SourceKind::Wards);
    let orchestrator = orchestrator(source.clone());

    let report = orchestrator.refresh().await.unwrap();
    assert_eq!(
        report.outcome,
        CycleOutcome::PartialFailure {
            failed: vec![SourceKind::Wards]
        }
    );

    let stats = &report.stats;
    assert!(!stats.is_section_available(DashboardSection::WardOccupancy));
    assert!(stats.wards.occupancy.is_empty());
    assert!(stats.is_section_available(DashboardSection::DoctorWorkload));
    assert!(stats.is_section_available(DashboardSection::AppointmentAnalytics));
    assert_eq!(stats.doctors.workloads[0].total, 4);
    assert_eq!(stats.appointments.overall.completion_rate, 50);
}

#[tokio::test]
async fn recovered_source_comes_back_and_failure_keeps_last_timestamp() {
    let source = FakeSource::default();
    let orchestrator = orchestrator(source.clone());
    orchestrator.refresh().await.unwrap();

    source.fail(SourceKind::Doctors);
    let report = orchestrator.refresh().await.unwrap();
    let doctors = report
        .stats
        .sources
        .iter()
        .find(|status| status.source == SourceKind::Doctors)
        .unwrap();
    assert!(!doctors.ok);
    assert_eq!(doctors.last_updated, Some(fixed_time()));
    assert!(report.stats.doctors.workloads.is_empty());

    source.recover(SourceKind::Doctors);
    let report = orchestrator.refresh().await.unwrap();
    assert_eq!(report.cycle, 3);
    assert_eq!(report.outcome, CycleOutcome::Ready);
    assert_eq!(report.stats.doctors.workloads.len(), 1);
}

#[tokio::test]
async fn refresh_during_fetch_is_coalesced() {
    let source = FakeSource::gated();
    let orchestrator = orchestrator(source.clone());

    let first = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.refresh().await }
    });
    while orchestrator.phase() != RefreshPhase::Fetching {
        tokio::task::yield_now().await;
    }

    let second = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.refresh().await }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(orchestrator.latest().is_none());

    source.release();
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(first.cycle, 1);
    assert_eq!(second.cycle, 1);
    assert_eq!(source.calls(), SourceKind::ALL.len());
    assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
}

#[tokio::test]
async fn joined_caller_is_released_when_leading_cycle_is_dropped() {
    let source = FakeSource::gated();
    let orchestrator = orchestrator(source.clone());

    let leader = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.refresh().await }
    });
    while orchestrator.phase() != RefreshPhase::Fetching {
        tokio::task::yield_now().await;
    }
    let joiner = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.refresh().await }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    let joined = tokio::time::timeout(Duration::from_secs(2), joiner)
        .await
        .expect("joined refresh must not hang")
        .unwrap();
    assert!(matches!(joined, Err(RefreshError::Abandoned { cycle: 1 })));
    assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
    assert!(orchestrator.latest().is_none());

    source.release();
    let report = orchestrator.refresh().await.unwrap();
    assert_eq!(report.cycle, 2);
    assert_eq!(report.outcome, CycleOutcome::Ready);
}

#[tokio::test]
async fn status_marks_only_failed_sources_stale() {
    let source = FakeSource::default();
    let orchestrator = orchestrator(source.clone());
    orchestrator.refresh().await.unwrap();

    source.fail(SourceKind::Appointments);
    let report = orchestrator.refresh().await.unwrap();
    for status in &report.stats.sources {
        assert_eq!(status.stale, status.source == SourceKind::Appointments);
    }
}

#[tokio::test(start_paused = true)]
async fn auto_refresh_runs_on_interval() {
    let source = FakeSource::default();
    let orchestrator = orchestrator(source.clone());

    let handle = orchestrator.spawn_auto_refresh();
    tokio::time::sleep(Duration::from_secs(601)).await;
    handle.abort();

    // ticks at 0s, 300s and 600s
    assert_eq!(orchestrator.latest().unwrap().cycle, 3);
    assert_eq!(source.calls(), 3 * SourceKind::ALL.len());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = AnalyticsConfig {
        refresh_interval_secs: 0,
        ..AnalyticsConfig::default()
    };
    assert!(AnalyticsOrchestrator::new(FakeSource::default(), config).is_err());
}

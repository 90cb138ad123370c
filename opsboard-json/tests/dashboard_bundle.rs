use std::fs;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use opsboard_core::{compute_stats, AnalyticsConfig, DashboardSection, OperationalStats};
use opsboard_json::DashboardBundle;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn fixture_stats() -> OperationalStats {
    let bundle = fs::read_to_string(fixture_path("dashboard_bundle.json"))
        .expect("Không đọc được bundle mẫu");
    let store = DashboardBundle::from_json(&bundle)
        .expect("Bundle không hợp lệ")
        .into_store(Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap());

    compute_stats(
        &store.view(),
        &AnalyticsConfig::default(),
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 1).unwrap(),
    )
}

#[test]
fn admission_trend_matches_golden() {
    let stats = fixture_stats();
    let actual = serde_json::to_value(&stats.admissions.daily_admissions).expect("Không serialize series");

    let expected = fs::read_to_string(fixture_path("expected_admission_trend.json"))
        .expect("Không đọc được golden trend");
    let expected: Value = serde_json::from_str(&expected).expect("Golden không hợp lệ");

    assert_eq!(actual, expected);
}

#[test]
fn ward_occupancy_uses_fallback_chain() {
    let stats = fixture_stats();
    let wards = &stats.wards;

    let occupied: Vec<(String, u32, u8)> = wards
        .occupancy
        .iter()
        .map(|ward| (ward.ward_name.clone(), ward.occupied_beds, ward.occupancy_rate))
        .collect();
    assert_eq!(
        occupied,
        vec![
            ("Ward 1".to_string(), 2, 10),
            ("Ward 2".to_string(), 0, 0),
            ("ICU".to_string(), 1, 5),
        ]
    );
    for ward in &wards.occupancy {
        assert_eq!(ward.occupied_beds + ward.available_beds, 20);
    }
    assert_eq!(wards.total_beds, 60);
    assert_eq!(wards.occupancy_rate, 5);
    assert_eq!(wards.unmatched_admissions, 1);
    assert_eq!(wards.by_type.len(), 2);
    assert_eq!(wards.by_type[0].wards, 2);
}

#[test]
fn admission_history_aggregates() {
    let admissions = fixture_stats().admissions;

    assert_eq!(admissions.status_today.active, 4);
    assert_eq!(admissions.status_today.discharged_today, 1);
    assert_eq!(admissions.status_today.transferred_today, 1);
    assert_eq!(admissions.admitted_today, 2);
    assert_eq!(admissions.average_length_of_stay, 5.0);

    let breakdown: Vec<usize> = admissions.status_breakdown.iter().map(|b| b.count).collect();
    assert_eq!(breakdown, vec![4, 2, 1, 1]);

    let discharges: Vec<usize> = admissions.daily_discharges.values().copied().collect();
    assert_eq!(discharges, vec![0, 0, 0, 0, 0, 0, 2]);

    let monthly: Vec<usize> = admissions.monthly_admissions.values().copied().collect();
    assert_eq!(monthly, vec![0, 0, 0, 0, 1, 6]);
}

#[test]
fn appointment_and_doctor_analytics() {
    let stats = fixture_stats();
    let overall = &stats.appointments.overall;
    assert_eq!(overall.total, 10);
    assert_eq!(overall.completion_rate, 60);
    assert_eq!(overall.cancellation_rate, 20);
    assert_eq!(overall.no_show_rate, 10);
    assert_eq!(overall.efficiency_score, 30);

    let today = &stats.appointments.today;
    assert_eq!(today.total, 5);
    assert_eq!(today.completion_rate, 40);
    assert_eq!(today.efficiency_score, 0);

    let distribution_total: usize = stats.appointments.status_distribution.iter().map(|b| b.count).sum();
    assert_eq!(distribution_total, 11);

    let doctors = &stats.doctors;
    assert_eq!(doctors.total_doctors, 3);
    let d1 = &doctors.workloads[0];
    assert_eq!((d1.total, d1.completed, d1.scheduled, d1.cancelled), (6, 4, 1, 1));
    assert_eq!(d1.completion_rate, 67);
    assert_eq!(d1.efficiency, 83);
    assert_eq!(d1.efficiency_score, 50);
    assert_eq!(doctors.workloads[1].name, "Lan Pham");
    assert_eq!(doctors.workloads[1].efficiency_score, 0);

    let ranking: Vec<Option<&str>> = doctors
        .top_doctors
        .iter()
        .map(|row| row.doctor_id.as_deref())
        .collect();
    assert_eq!(ranking, vec![Some("d1"), Some("d2"), Some("d4")]);
    assert_eq!(doctors.busy_doctors, 0);
    assert_eq!(doctors.by_specialization[0].label, "Cardiology");
    assert_eq!(doctors.by_specialization[0].count, 2);
}

#[test]
fn patient_demographics() {
    let patients = fixture_stats().patients;
    let ages: Vec<usize> = patients.age_groups.buckets.iter().map(|b| b.count).collect();
    assert_eq!(ages, vec![1, 0, 1, 0, 1]);
    assert_eq!(patients.excluded_from_age_groups, 2);
    assert_eq!(patients.age_groups.total() + patients.excluded_from_age_groups, patients.total_patients);

    let genders: Vec<(String, usize)> = patients
        .gender_distribution
        .iter()
        .map(|b| (b.label.clone(), b.count))
        .collect();
    assert_eq!(
        genders,
        vec![
            ("male".to_string(), 2),
            ("female".to_string(), 2),
            ("other".to_string(), 0),
            ("unknown".to_string(), 1),
        ]
    );
    assert_eq!(patients.registered_this_month, 2);
}

#[test]
fn all_sections_available_for_complete_bundle() {
    let stats = fixture_stats();
    for section in DashboardSection::ALL {
        assert!(stats.is_section_available(section), "{section:?}");
    }
}

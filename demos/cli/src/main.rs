use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use opsboard_core::{compute_stats, AnalyticsConfig, DashboardSection, OperationalStats};
use opsboard_json::DashboardBundle;
use opsboard_refresh::{AnalyticsOrchestrator, Clock, DirectorySource};

#[derive(Parser, Debug)]
#[command(
    name = "opsboard-cli",
    about = "Tổng hợp số liệu vận hành bệnh viện từ dữ liệu JSON."
)]
struct Args {
    /// Thư mục chứa wards.json, admissions_active.json, admissions.json, ...
    #[arg(short, long, required_unless_present = "bundle", conflicts_with = "bundle")]
    input: Option<PathBuf>,

    /// File JSON gộp cả sáu nguồn.
    #[arg(short, long)]
    bundle: Option<PathBuf>,

    /// Ngày chốt số liệu (YYYY-MM-DD), mặc định là hôm nay.
    #[arg(long)]
    as_of: Option<NaiveDate>,

    #[arg(long)]
    trend_days: Option<usize>,

    #[arg(long)]
    trend_months: Option<usize>,

    #[arg(long)]
    top_doctors: Option<usize>,

    /// Chu kỳ làm mới khi chạy `--watch` (giây).
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Làm mới định kỳ cho tới khi nhấn Ctrl-C.
    #[arg(long, requires = "input")]
    watch: bool,

    /// In toàn bộ thống kê dạng JSON.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn config(&self) -> AnalyticsConfig {
        let mut config = AnalyticsConfig::default();
        if let Some(days) = self.trend_days {
            config.trend_days = days;
        }
        if let Some(months) = self.trend_months {
            config.trend_months = months;
        }
        if let Some(top) = self.top_doctors {
            config.top_doctors = top;
        }
        if let Some(secs) = self.interval_secs {
            config.refresh_interval_secs = secs;
        }
        config
    }

    fn clock(&self) -> Option<Clock> {
        let noon = self.as_of?.and_hms_opt(12, 0, 0)?.and_utc();
        Some(Arc::new(move || noon))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    if let Some(path) = &args.bundle {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Không đọc được file {path:?}"))?;
        let now = Utc::now();
        let store = DashboardBundle::from_json(&data)?.into_store(now);
        let as_of = args.as_of.unwrap_or_else(|| now.date_naive());
        let stats = compute_stats(&store.view(), &config, as_of, now);
        return print_stats(&stats, args.json);
    }

    let input = args
        .input
        .clone()
        .context("Cần --input hoặc --bundle")?;
    let mut orchestrator = AnalyticsOrchestrator::new(DirectorySource::new(input), config)?;
    if let Some(clock) = args.clock() {
        orchestrator = orchestrator.with_clock(clock);
    }
    let orchestrator = Arc::new(orchestrator);

    if !args.watch {
        let report = orchestrator.refresh().await?;
        return print_stats(&report.stats, args.json);
    }

    let mut updates = orchestrator.subscribe();
    let auto_refresh = orchestrator.spawn_auto_refresh();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                changed.context("Luồng làm mới đã dừng")?;
                let report = updates.borrow_and_update().clone();
                if let Some(report) = report {
                    log::info!("cycle {}: {:?}", report.cycle, report.outcome);
                    print_stats(&report.stats, args.json)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("stopping");
                auto_refresh.abort();
                return Ok(());
            }
        }
    }
}

fn print_stats(stats: &OperationalStats, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("Generated at: {} (as of {})", stats.generated_at, stats.as_of);
    println!(
        "Beds: {}/{} occupied ({}%), {} unmatched admissions",
        stats.wards.occupied_beds,
        stats.wards.total_beds,
        stats.wards.occupancy_rate,
        stats.wards.unmatched_admissions
    );
    println!(
        "Appointments: {} total, completion {}%, cancellation {}%, no-show {}%, efficiency {}",
        stats.appointments.overall.total,
        stats.appointments.overall.completion_rate,
        stats.appointments.overall.cancellation_rate,
        stats.appointments.overall.no_show_rate,
        stats.appointments.overall.efficiency_score
    );
    println!(
        "Doctors: {} ({} busy, {})",
        stats.doctors.total_doctors,
        stats.doctors.busy_doctors,
        stats.doctors.workload_balance.label()
    );
    println!(
        "Patients: {} (average stay {:.1} days)",
        stats.patients.total_patients, stats.admissions.average_length_of_stay
    );
    for section in DashboardSection::ALL {
        if !stats.is_section_available(section) {
            println!("Unavailable: {section:?}");
        }
    }
    Ok(())
}

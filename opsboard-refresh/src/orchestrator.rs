//! Refresh cycle: concurrent fetch, one aggregation pass, atomic publish.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use opsboard_core::{
    compute_stats, AnalyticsConfig, AnalyticsError, OperationalStats, RecordStore, SourceKind,
    SourceStatus,
};

use crate::source::RecordSource;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Fetching,
    Aggregating,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CycleOutcome {
    Ready,
    PartialFailure { failed: Vec<SourceKind> },
}

/// Result of one completed cycle, shared by every caller coalesced into it.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub cycle: u64,
    pub outcome: CycleOutcome,
    pub stats: Arc<OperationalStats>,
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh publisher is gone")]
    Closed,
    #[error("refresh cycle {cycle} was abandoned before publishing")]
    Abandoned { cycle: u64 },
}

#[derive(Debug)]
struct Control {
    phase: RefreshPhase,
    started: u64,
}

enum Ticket {
    Lead(u64),
    Join(u64),
}

pub struct AnalyticsOrchestrator<S> {
    source: S,
    config: AnalyticsConfig,
    clock: Clock,
    store: Mutex<RecordStore>,
    control: Mutex<Control>,
    published: watch::Sender<Option<RefreshReport>>,
    /// Last cycle that ended, whether it published or was dropped.
    settled: watch::Sender<u64>,
}

impl<S: RecordSource> AnalyticsOrchestrator<S> {
    pub fn new(source: S, config: AnalyticsConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let (published, _) = watch::channel(None);
        let (settled, _) = watch::channel(0);
        Ok(Self {
            source,
            config,
            clock: Arc::new(Utc::now),
            store: Mutex::new(RecordStore::new()),
            control: Mutex::new(Control {
                phase: RefreshPhase::Idle,
                started: 0,
            }),
            published,
            settled,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn phase(&self) -> RefreshPhase {
        self.control().phase
    }

    /// Statistics of the most recently completed cycle.
    pub fn latest(&self) -> Option<RefreshReport> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RefreshReport>> {
        self.published.subscribe()
    }

    pub fn source_status(&self) -> Vec<SourceStatus> {
        self.store().status()
    }

    /// Run a refresh cycle, or join the one already in flight.
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let ticket = {
            let mut control = self.control();
            if control.phase == RefreshPhase::Idle {
                control.started += 1;
                control.phase = RefreshPhase::Fetching;
                Ticket::Lead(control.started)
            } else {
                Ticket::Join(control.started)
            }
        };

        match ticket {
            Ticket::Lead(cycle) => Ok(self.run_cycle(cycle).await),
            Ticket::Join(cycle) => {
                log::debug!("refresh requested during cycle {cycle}; coalescing");
                let mut settled = self.settled.subscribe();
                settled
                    .wait_for(|&last| last >= cycle)
                    .await
                    .map_err(|_| RefreshError::Closed)?;
                self.latest()
                    .filter(|report| report.cycle >= cycle)
                    .ok_or(RefreshError::Abandoned { cycle })
            }
        }
    }

    async fn run_cycle(&self, cycle: u64) -> RefreshReport {
        let _reset = PhaseReset {
            control: &self.control,
            settled: &self.settled,
            cycle,
        };
        let started = Instant::now();
        log::debug!("refresh cycle {cycle}: fetching {} sources", SourceKind::ALL.len());

        self.store().begin_cycle((self.clock)());
        let fetches = SourceKind::ALL.into_iter().map(|kind| async move {
            let result = self.source.fetch(kind).await;
            (kind, result, (self.clock)())
        });
        let results = join_all(fetches).await;

        self.control().phase = RefreshPhase::Aggregating;

        let now = (self.clock)();
        let mut failed = Vec::new();
        let stats = {
            let mut store = self.store();
            for (kind, result, fetched_at) in results {
                match &result {
                    Ok(payload) => log::debug!("source {kind}: {} records", payload.len()),
                    Err(err) => {
                        let err = AnalyticsError::Source {
                            kind,
                            error: err.clone(),
                        };
                        log::warn!("cycle {cycle}: {err}");
                        failed.push(kind);
                    }
                }
                store.apply(kind, result, fetched_at);
            }
            compute_stats(&store.view(), &self.config, now.date_naive(), now)
        };

        let outcome = if failed.is_empty() {
            CycleOutcome::Ready
        } else {
            CycleOutcome::PartialFailure { failed }
        };
        log::info!(
            "refresh cycle {cycle} finished in {} ms: {outcome:?}",
            started.elapsed().as_millis()
        );

        let report = RefreshReport {
            cycle,
            outcome,
            stats: Arc::new(stats),
        };
        self.published.send_replace(Some(report.clone()));
        report
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self) -> MutexGuard<'_, RecordStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: RecordSource + 'static> AnalyticsOrchestrator<S> {
    /// Re-trigger a refresh every `refresh_interval_secs`, starting now.
    pub fn spawn_auto_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(orchestrator.config.refresh_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = orchestrator.refresh().await {
                    log::error!("automatic refresh stopped: {err}");
                    break;
                }
            }
        })
    }
}

/// Returns the phase to `Idle` and releases joined callers, even if the
/// leading future is dropped mid-cycle.
struct PhaseReset<'a> {
    control: &'a Mutex<Control>,
    settled: &'a watch::Sender<u64>,
    cycle: u64,
}

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .phase = RefreshPhase::Idle;
        let cycle = self.cycle;
        self.settled.send_if_modified(|last| {
            let advanced = cycle > *last;
            if advanced {
                *last = cycle;
            }
            advanced
        });
    }
}

//! Periodic fetch → normalize → upsert driver.
//!
//! Every timer tick spawns an independent cycle task, so a slow cycle does not
//! delay the next one and two cycles may overlap. Overlap only produces
//! redundant writes: upserts are keyed and idempotent, and same-key races are
//! last-write-wins.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::db::MatchStore;
use crate::error::SyncResult;
use crate::feed::{normalize, FeedClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Outcome of one completed cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Records returned by the feed
    pub fetched: usize,
    pub upserted: usize,
    /// Records the normalizer refused (no usable id)
    pub rejected: usize,
    /// Records the store refused
    pub failed: usize,
}

pub struct Scheduler {
    feed: Arc<dyn FeedClient>,
    store: Arc<dyn MatchStore>,
    period: Duration,
    in_flight: Arc<AtomicUsize>,
    stop_tx: Option<oneshot::Sender<()>>,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(feed: Arc<dyn FeedClient>, store: Arc<dyn MatchStore>, period: Duration) -> Self {
        Scheduler {
            feed,
            store,
            period,
            in_flight: Arc::new(AtomicUsize::new(0)),
            stop_tx: None,
            timer: None,
        }
    }

    /// Arm the timer. The first cycle fires immediately. No-op if already armed.
    pub fn start(&mut self) {
        if self.is_armed() {
            return;
        }
        let feed = Arc::clone(&self.feed);
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let period = self.period;

        info!(
            "Sync scheduler started (feed={}, interval={:?})",
            feed.name(),
            period
        );

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        self.stop_tx = Some(stop_tx);
        self.timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut cycles = JoinSet::new();
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let feed = Arc::clone(&feed);
                        let store = Arc::clone(&store);
                        let guard = InFlight::enter(&in_flight);
                        cycles.spawn(async move {
                            let _guard = guard;
                            match run_cycle(feed.as_ref(), store.as_ref()).await {
                                Ok(report) => info!(
                                    "Sync cycle done: fetched={} upserted={} rejected={} failed={}",
                                    report.fetched, report.upserted, report.rejected, report.failed
                                ),
                                Err(e) => error!(category = e.category(), "Sync cycle aborted: {}", e),
                            }
                        });
                    }
                    // fires on stop() and when the sender is dropped
                    _ = &mut stop_rx => break,
                    Some(done) = cycles.join_next(), if !cycles.is_empty() => {
                        if let Err(e) = done {
                            error!("Sync cycle task failed: {}", e);
                        }
                    }
                }
            }

            // no new ticks from here; let the running cycles finish their writes
            if !cycles.is_empty() {
                info!("Waiting for {} in-flight sync cycle(s)", cycles.len());
            }
            while let Some(done) = cycles.join_next().await {
                if let Err(e) = done {
                    error!("Sync cycle task failed: {}", e);
                }
            }
        }));
    }

    /// Disarm the timer. Cycles already in flight run to completion in the
    /// background; use [`Scheduler::shutdown`] to wait for them.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
            info!("Sync scheduler stopped");
        }
    }

    /// Disarm the timer and wait until every in-flight cycle has finished.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(timer) = self.timer.take() {
            if let Err(e) = timer.await {
                error!("Sync scheduler task failed: {}", e);
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.stop_tx.is_some() && self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// `Running` while at least one cycle is in flight.
    pub fn state(&self) -> SchedulerState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Run one cycle on the caller's task, outside the timer.
    pub async fn run_cycle(&self) -> SyncResult<CycleReport> {
        let _guard = InFlight::enter(&self.in_flight);
        run_cycle(self.feed.as_ref(), self.store.as_ref()).await
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One full pass. A feed failure aborts before any write; per-record failures
/// are logged and counted without stopping the remaining records.
pub async fn run_cycle(feed: &dyn FeedClient, store: &dyn MatchStore) -> SyncResult<CycleReport> {
    let records = feed.fetch().await?;
    let mut report = CycleReport {
        fetched: records.len(),
        ..CycleReport::default()
    };

    for raw in &records {
        let record = match normalize(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(category = e.category(), "Skipping {} record: {}", feed.name(), e);
                report.rejected += 1;
                continue;
            }
        };
        match store.upsert(&record) {
            Ok(()) => report.upserted += 1,
            Err(e) => {
                warn!(
                    category = e.category(),
                    "Failed to upsert match {}: {}", record.match_id, e
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Counts a cycle as in flight until dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

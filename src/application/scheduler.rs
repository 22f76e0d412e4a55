//! Refresh Scheduler
//!
//! Runs each registered pull on its own timer. A pull is either `Idle` or
//! `Fetching`; a trigger that arrives while it is fetching is dropped, never
//! queued. Manual triggers bypass the timer but respect that guard.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::aggregator::AggregateError;
use crate::ports::source::AdapterError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PullError {
    #[error(transparent)]
    Source(#[from] AdapterError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("No pull named {0:?}")]
    UnknownPull(String),
}

/// What a successful pull produced
#[derive(Debug, Clone, PartialEq)]
pub struct PullReport {
    pub records: usize,
    /// Set when the data is usable but degraded, e.g. served from a fallback
    pub note: Option<String>,
}

impl PullReport {
    pub fn new(records: usize) -> Self {
        Self { records, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// One refreshable unit: fetch, normalize, merge, render
#[async_trait]
pub trait Pull: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<PullReport, PullError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: Duration,
    /// Shorter wait used after a failed run
    pub retry_after: Option<Duration>,
}

impl Cadence {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    fn next_wait(&self, outcome: &TriggerOutcome) -> Duration {
        match outcome {
            TriggerOutcome::Failed(_) => self.retry_after.unwrap_or(self.interval),
            _ => self.interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPhase {
    Idle,
    Fetching,
}

/// Per-pull refresh state
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState {
    pub phase: PullPhase,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for RefreshState {
    fn default() -> Self {
        Self {
            phase: PullPhase::Idle,
            last_success: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Completed(PullReport),
    Failed(String),
    /// The pull was already fetching
    Skipped,
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a pull in `Fetching`. Dropping it returns the pull to `Idle`,
/// including when the run panics or its future is dropped.
struct InFlight {
    state: Arc<Mutex<RefreshState>>,
}

impl InFlight {
    fn acquire(state: &Arc<Mutex<RefreshState>>) -> Option<Self> {
        let mut guard = lock(state);
        if guard.phase == PullPhase::Fetching {
            return None;
        }
        guard.phase = PullPhase::Fetching;
        Some(Self {
            state: Arc::clone(state),
        })
    }

    fn record(&self, result: &Result<PullReport, PullError>) {
        let mut guard = lock(&self.state);
        match result {
            Ok(_) => {
                guard.last_success = Some(Utc::now());
                guard.consecutive_failures = 0;
                guard.last_error = None;
            }
            Err(e) => {
                guard.consecutive_failures += 1;
                guard.last_error = Some(e.to_string());
            }
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.state).phase = PullPhase::Idle;
    }
}

async fn run_guarded(pull: &dyn Pull, state: &Arc<Mutex<RefreshState>>) -> TriggerOutcome {
    let Some(in_flight) = InFlight::acquire(state) else {
        tracing::debug!("{}: already fetching, trigger dropped", pull.name());
        return TriggerOutcome::Skipped;
    };

    let result = pull.run().await;
    in_flight.record(&result);

    match result {
        Ok(report) => {
            match &report.note {
                Some(note) => tracing::info!("{}: {} records ({})", pull.name(), report.records, note),
                None => tracing::info!("{}: {} records", pull.name(), report.records),
            }
            TriggerOutcome::Completed(report)
        }
        Err(e) => {
            tracing::error!("{}: refresh failed: {}", pull.name(), e);
            TriggerOutcome::Failed(e.to_string())
        }
    }
}

#[derive(Clone)]
struct Registration {
    pull: Arc<dyn Pull>,
    cadence: Cadence,
    state: Arc<Mutex<RefreshState>>,
}

/// Owns the pulls and their timers
#[derive(Clone, Default)]
pub struct Scheduler {
    pulls: Vec<Registration>,
    is_running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pull. A later registration with the same name replaces the earlier one.
    pub fn register(&mut self, pull: Arc<dyn Pull>, cadence: Cadence) {
        let registration = Registration {
            pull,
            cadence,
            state: Arc::new(Mutex::new(RefreshState::default())),
        };
        match self.pulls.iter_mut().find(|r| r.pull.name() == registration.pull.name()) {
            Some(existing) => *existing = registration,
            None => self.pulls.push(registration),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.pulls.iter().map(|r| r.pull.name()).collect()
    }

    fn find(&self, name: &str) -> Result<&Registration, SchedulerError> {
        self.pulls
            .iter()
            .find(|r| r.pull.name() == name)
            .ok_or_else(|| SchedulerError::UnknownPull(name.to_string()))
    }

    pub fn state(&self, name: &str) -> Result<RefreshState, SchedulerError> {
        self.find(name).map(|r| lock(&r.state).clone())
    }

    /// Run one pull now, unless it is already fetching
    pub async fn trigger(&self, name: &str) -> Result<TriggerOutcome, SchedulerError> {
        let registration = self.find(name)?;
        Ok(run_guarded(registration.pull.as_ref(), &registration.state).await)
    }

    /// Run every pull once, in registration order
    pub async fn run_once(&self) -> Vec<(&'static str, TriggerOutcome)> {
        let mut outcomes = Vec::with_capacity(self.pulls.len());
        for registration in &self.pulls {
            let outcome = run_guarded(registration.pull.as_ref(), &registration.state).await;
            outcomes.push((registration.pull.name(), outcome));
        }
        outcomes
    }

    /// Start one timer task per pull. The first run of each is immediate.
    pub async fn spawn(&self) -> Vec<JoinHandle<()>> {
        *self.is_running.write().await = true;
        tracing::info!("Starting scheduler with {} pulls", self.pulls.len());

        self.pulls
            .iter()
            .cloned()
            .map(|registration| {
                let is_running = Arc::clone(&self.is_running);
                tokio::spawn(async move {
                    while *is_running.read().await {
                        let outcome =
                            run_guarded(registration.pull.as_ref(), &registration.state).await;
                        tokio::time::sleep(registration.cadence.next_wait(&outcome)).await;
                    }
                    tracing::debug!("{}: timer stopped", registration.pull.name());
                })
            })
            .collect()
    }

    /// Stop the timers after their current sleep
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        tracing::info!("Stop signal sent to scheduler");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Pull that counts runs and optionally blocks until released
    struct CountingPull {
        name: &'static str,
        runs: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl CountingPull {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                runs: AtomicUsize::new(0),
                gate: None,
                fail: false,
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Pull for CountingPull {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self) -> Result<PullReport, PullError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(AdapterError::NoData("scripted failure".into()).into());
            }
            Ok(PullReport::new(3))
        }
    }

    fn scheduler_with(pull: Arc<CountingPull>, cadence: Cadence) -> Scheduler {
        let mut scheduler = Scheduler::new();
        scheduler.register(pull, cadence);
        scheduler
    }

    #[tokio::test]
    async fn test_trigger_completes() {
        let pull = Arc::new(CountingPull::new("crypto"));
        let scheduler = scheduler_with(Arc::clone(&pull), Cadence::every(Duration::from_secs(60)));

        let outcome = scheduler.trigger("crypto").await.unwrap();

        assert_eq!(outcome, TriggerOutcome::Completed(PullReport::new(3)));
        let state = scheduler.state("crypto").unwrap();
        assert_eq!(state.phase, PullPhase::Idle);
        assert!(state.last_success.is_some());
        assert_eq!(state.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_unknown_pull() {
        let scheduler = Scheduler::new();
        assert_eq!(
            scheduler.trigger("nope").await,
            Err(SchedulerError::UnknownPull("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_trigger_while_fetching_is_skipped() {
        let gate = Arc::new(Notify::new());
        let pull = Arc::new(CountingPull::new("movers").gated(Arc::clone(&gate)));
        let scheduler = scheduler_with(Arc::clone(&pull), Cadence::every(Duration::from_secs(60)));

        let (first, second, _) = tokio::join!(
            scheduler.trigger("movers"),
            scheduler.trigger("movers"),
            async { gate.notify_one() },
        );

        assert_eq!(first.unwrap(), TriggerOutcome::Completed(PullReport::new(3)));
        assert_eq!(second.unwrap(), TriggerOutcome::Skipped);
        assert_eq!(pull.runs(), 1);
        assert_eq!(scheduler.state("movers").unwrap().phase, PullPhase::Idle);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_guard_released() {
        let pull = Arc::new(CountingPull::new("equities").failing());
        let scheduler = scheduler_with(Arc::clone(&pull), Cadence::every(Duration::from_secs(60)));

        let first = scheduler.trigger("equities").await.unwrap();
        let second = scheduler.trigger("equities").await.unwrap();

        assert!(matches!(first, TriggerOutcome::Failed(msg) if msg.contains("scripted failure")));
        assert!(matches!(second, TriggerOutcome::Failed(_)));
        let state = scheduler.state("equities").unwrap();
        assert_eq!(state.phase, PullPhase::Idle);
        assert_eq!(state.consecutive_failures, 2);
        assert!(state.last_success.is_none());
        assert_eq!(pull.runs(), 2);
    }

    #[tokio::test]
    async fn test_dropped_run_releases_guard() {
        let gate = Arc::new(Notify::new());
        let pull = Arc::new(CountingPull::new("sentiment").gated(gate));
        let scheduler = scheduler_with(Arc::clone(&pull), Cadence::every(Duration::from_secs(60)));

        // cancelled mid-flight
        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), scheduler.trigger("sentiment")).await;
        assert!(timed_out.is_err());

        assert_eq!(scheduler.state("sentiment").unwrap().phase, PullPhase::Idle);
    }

    #[tokio::test]
    async fn test_run_once_in_order() {
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::new(CountingPull::new("a")), Cadence::every(Duration::from_secs(1)));
        scheduler.register(
            Arc::new(CountingPull::new("b").failing()),
            Cadence::every(Duration::from_secs(1)),
        );

        let outcomes = scheduler.run_once().await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "a");
        assert!(matches!(outcomes[1].1, TriggerOutcome::Failed(_)));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::new(CountingPull::new("a")), Cadence::every(Duration::from_secs(1)));
        scheduler.register(Arc::new(CountingPull::new("a")), Cadence::every(Duration::from_secs(2)));
        assert_eq!(scheduler.names(), vec!["a"]);
    }

    #[test]
    fn test_cadence_retry_after_failure() {
        let cadence = Cadence::every(Duration::from_secs(300))
            .with_retry_after(Some(Duration::from_secs(30)));

        assert_eq!(
            cadence.next_wait(&TriggerOutcome::Failed("x".into())),
            Duration::from_secs(30)
        );
        assert_eq!(
            cadence.next_wait(&TriggerOutcome::Completed(PullReport::new(1))),
            Duration::from_secs(300)
        );
        assert_eq!(
            Cadence::every(Duration::from_secs(300)).next_wait(&TriggerOutcome::Failed("x".into())),
            Duration::from_secs(300)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_timers_follow_cadence() {
        let pull = Arc::new(CountingPull::new("crypto"));
        let scheduler = scheduler_with(Arc::clone(&pull), Cadence::every(Duration::from_secs(60)));

        let handles = scheduler.spawn().await;
        assert!(scheduler.is_running().await);

        // first run is immediate
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pull.runs(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(pull.runs(), 2);

        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(pull.runs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_timer_retries_sooner_after_failure() {
        let pull = Arc::new(CountingPull::new("equities").failing());
        let cadence = Cadence::every(Duration::from_secs(300))
            .with_retry_after(Some(Duration::from_secs(30)));
        let scheduler = scheduler_with(Arc::clone(&pull), cadence);

        let _handles = scheduler.spawn().await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(pull.runs(), 2);

        scheduler.stop().await;
    }
}

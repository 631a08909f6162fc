// ABOUTME: Periodic heart-rate monitoring with persisted state
// ABOUTME: Three-strike circuit breaker disables the loop on repeated fetch failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::constants::limits::MAX_CONSECUTIVE_FAILURES;
use crate::constants::monitoring::DEFAULT_INTERVAL_MS;
use crate::errors::StorageError;
use crate::heart_rate::HeartRateService;
use crate::models::{HeartRateSource, MonitoringState};
use crate::store::RecordStore;

/// Periodic fetch scheduler with a persisted on/off switch
///
/// States: stopped → running → stopped. The enabled flag and interval
/// are persisted on every transition so an enabled loop resumes after a
/// process restart. A fetch only counts as successful when a real source
/// (live device or cloud API) produced the reading; cached and simulated
/// results mean every real source failed, which is what the circuit
/// breaker must count.
pub struct MonitoringScheduler {
    store: Arc<dyn RecordStore>,
    heart_rate: Arc<HeartRateService>,
    running: Arc<AtomicBool>,
    /// Bumped on every start/stop; in-flight fetches from an older
    /// generation discard their results instead of recording them.
    generation: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MonitoringScheduler {
    /// Create a scheduler over the acquisition engine and storage
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, heart_rate: Arc<HeartRateService>) -> Self {
        Self {
            store,
            heart_rate,
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            handle: Mutex::new(None),
        }
    }

    /// Start periodic monitoring
    ///
    /// No-op returning `Ok(false)` when already running. Otherwise
    /// persists the enabled state, performs one immediate fetch, and
    /// schedules repeating fetches at `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the monitoring state cannot be persisted; the
    /// scheduler stays stopped in that case.
    pub async fn start(&self, interval: Duration) -> Result<bool, StorageError> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("monitoring already running; start ignored");
            return Ok(false);
        }

        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        if let Err(e) = self
            .store
            .save_monitoring_state(&MonitoringState::enabled(interval_ms))
            .await
        {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(interval_ms, "monitoring started");

        let task = self.spawn_fetch_loop(interval, interval_ms, generation);
        *self.handle.lock().await = Some(task);
        Ok(true)
    }

    /// Stop monitoring; idempotent
    ///
    /// Cancels the timer task and persists `enabled = false`. Results of
    /// fetches still in flight are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the disabled state cannot be persisted.
    pub async fn stop(&self) -> Result<(), StorageError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let was_running = self.running.swap(false, Ordering::SeqCst);

        if let Some(task) = self.handle.lock().await.take() {
            task.abort();
        }

        let interval_ms = self
            .store
            .load_monitoring_state()
            .await?
            .map_or(DEFAULT_INTERVAL_MS, |state| state.interval_ms);
        self.store
            .save_monitoring_state(&MonitoringState::disabled(interval_ms))
            .await?;

        if was_running {
            info!("monitoring stopped");
        }
        Ok(())
    }

    /// Restart monitoring from persisted state, if it was enabled
    ///
    /// Called once at subsystem initialization so monitoring survives a
    /// process restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted state cannot be read or written.
    pub async fn resume_if_enabled(&self) -> Result<bool, StorageError> {
        match self.store.load_monitoring_state().await? {
            Some(state) if state.enabled => {
                info!(interval_ms = state.interval_ms, "resuming persisted monitoring");
                self.start(Duration::from_millis(state.interval_ms)).await
            }
            _ => Ok(false),
        }
    }

    /// Whether the fetch loop is currently running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_fetch_loop(
        &self,
        interval: Duration,
        interval_ms: u64,
        generation: u64,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let heart_rate = Arc::clone(&self.heart_rate);
        let running = Arc::clone(&self.running);
        let current_generation = Arc::clone(&self.generation);

        tokio::spawn(async move {
            let mut failures: u32 = 0;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // First tick completes immediately: one fetch right away.
                ticker.tick().await;
                if current_generation.load(Ordering::SeqCst) != generation
                    || !running.load(Ordering::SeqCst)
                {
                    break;
                }

                let reading = heart_rate.latest().await;

                // The scheduler may have stopped while the fetch was in
                // flight; its result is then ignored.
                if current_generation.load(Ordering::SeqCst) != generation
                    || !running.load(Ordering::SeqCst)
                {
                    break;
                }

                let success = matches!(
                    reading.source,
                    HeartRateSource::LiveDevice | HeartRateSource::CloudApi
                );

                if success {
                    failures = 0;
                } else {
                    failures += 1;
                    warn!(
                        consecutive_failures = failures,
                        source = %reading.source,
                        "scheduled fetch fell back to a non-live source"
                    );
                }

                if failures > MAX_CONSECUTIVE_FAILURES {
                    warn!(
                        threshold = MAX_CONSECUTIVE_FAILURES,
                        "monitoring auto-disabled after repeated failures"
                    );
                    running.store(false, Ordering::SeqCst);
                    if let Err(e) = store
                        .save_monitoring_state(&MonitoringState::disabled(interval_ms))
                        .await
                    {
                        error!(error = %e, "failed to persist auto-disabled state");
                    }
                    break;
                }

                let state = MonitoringState {
                    enabled: true,
                    interval_ms,
                    consecutive_failure_count: failures,
                };
                if let Err(e) = store.save_monitoring_state(&state).await {
                    error!(error = %e, "failed to persist monitoring state");
                }
            }
        })
    }
}

use crate::page_state::PageStateDetector;
use extperf_core::page::PageState;
use extperf_core::{Error, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Called with `(new_state, previous_state)` whenever the page status changes
pub type StateChangeCallback = Arc<dyn Fn(&PageState, &PageState) + Send + Sync>;

#[derive(Clone)]
pub struct MonitorOptions {
    pub interval: Duration,
    pub auto_handle: bool,
    pub on_state_change: Option<StateChangeCallback>,
}

impl MonitorOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            auto_handle: false,
            on_state_change: None,
        }
    }

    pub fn auto_handle(mut self, enabled: bool) -> Self {
        self.auto_handle = enabled;
        self
    }

    pub fn on_state_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PageState, &PageState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(callback));
        self
    }
}

/// Snapshot of a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub interval_ms: u64,
    pub auto_handle: bool,
    pub last_state: Option<PageState>,
    pub active: bool,
    pub ticks: u64,
    pub remediations: u64,
}

impl MonitoringStatus {
    fn idle() -> Self {
        Self {
            interval_ms: 0,
            auto_handle: false,
            last_state: None,
            active: false,
            ticks: 0,
            remediations: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub was_active: bool,
    pub last_state: Option<PageState>,
}

#[derive(Default)]
struct Progress {
    last_state: Option<PageState>,
    ticks: u64,
    remediations: u64,
}

struct ActiveSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    progress: Arc<StdMutex<Progress>>,
    interval: Duration,
    auto_handle: bool,
}

impl ActiveSession {
    fn status(&self, active: bool) -> MonitoringStatus {
        let progress = lock(&self.progress);
        MonitoringStatus {
            interval_ms: self.interval.as_millis() as u64,
            auto_handle: self.auto_handle,
            last_state: progress.last_state.clone(),
            active,
            ticks: progress.ticks,
            remediations: progress.remediations,
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Periodically classifies the page and optionally clears blocks. At most one loop runs per
/// monitor; starting again replaces the running loop.
pub struct PageStateMonitor {
    detector: Arc<PageStateDetector>,
    session: Mutex<Option<ActiveSession>>,
    last_stopped: StdMutex<Option<MonitoringStatus>>,
}

impl PageStateMonitor {
    pub fn new(detector: Arc<PageStateDetector>) -> Self {
        Self {
            detector,
            session: Mutex::new(None),
            last_stopped: StdMutex::new(None),
        }
    }

    /// Seed the last state with one detection, then start ticking every `options.interval`
    pub async fn start(&self, options: MonitorOptions) -> Result<MonitoringStatus> {
        if options.interval.is_zero() {
            return Err(Error::InvalidInput("monitoring interval must be greater than 0".to_string()));
        }

        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            tracing::info!("Replacing the running page-state monitor");
            self.shutdown(previous).await;
        }

        let initial = self.detector.classify().await;
        tracing::info!(
            "Starting page-state monitor every {:?} (auto-handle: {}), page is {}",
            options.interval,
            options.auto_handle,
            initial.state.as_str()
        );

        let progress = Arc::new(StdMutex::new(Progress {
            last_state: Some(initial),
            ..Default::default()
        }));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            self.detector.clone(),
            options.clone(),
            progress.clone(),
            cancel.clone(),
        ));

        let active = ActiveSession {
            cancel,
            task,
            progress,
            interval: options.interval,
            auto_handle: options.auto_handle,
        };
        let status = active.status(true);
        *session = Some(active);

        Ok(status)
    }

    /// Stop the running loop, letting an in-flight remediation finish. Stopping an idle monitor
    /// is a no-op.
    pub async fn stop(&self) -> StopOutcome {
        let mut session = self.session.lock().await;
        match session.take() {
            Some(active) => {
                let status = self.shutdown(active).await;
                tracing::info!("Page-state monitor stopped after {} tick(s)", status.ticks);
                StopOutcome {
                    was_active: true,
                    last_state: status.last_state,
                }
            }
            None => StopOutcome {
                was_active: false,
                last_state: None,
            },
        }
    }

    pub async fn status(&self) -> MonitoringStatus {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(active) => active.status(!active.task.is_finished()),
            None => lock(&self.last_stopped)
                .clone()
                .unwrap_or_else(MonitoringStatus::idle),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn shutdown(&self, mut active: ActiveSession) -> MonitoringStatus {
        active.cancel.cancel();
        if let Err(e) = (&mut active.task).await {
            tracing::warn!("Page-state monitor task ended abnormally: {}", e);
        }

        let status = active.status(false);
        *lock(&self.last_stopped) = Some(status.clone());
        status
    }
}

async fn run_loop(
    detector: Arc<PageStateDetector>,
    options: MonitorOptions,
    progress: Arc<StdMutex<Progress>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + options.interval, options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        lock(&progress).ticks += 1;

        let detected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = detector.detect() => result,
        };
        let state = match detected {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Page-state tick skipped: {}", e);
                continue;
            }
        };

        let previous = lock(&progress).last_state.replace(state.clone());
        if let Some(previous) = &previous
            && previous.state != state.state
        {
            tracing::info!("Page state changed: {} -> {}", previous.state.as_str(), state.state.as_str());
            if let Some(callback) = &options.on_state_change {
                callback(&state, previous);
            }
        }

        if options.auto_handle && state.can_auto_handle() {
            if cancel.is_cancelled() {
                tracing::debug!("Stop requested, leaving the blocked page as is");
                break;
            }
            match detector.resolve(&state).await {
                Ok(true) => {
                    lock(&progress).remediations += 1;
                    tracing::info!("Cleared blocking element");
                }
                Ok(false) => tracing::debug!("Blocking element was gone before it could be cleared"),
                Err(e) => tracing::warn!("Auto-handling failed: {}", e),
            }
        }
    }

    tracing::debug!("Page-state monitor loop exited");
}

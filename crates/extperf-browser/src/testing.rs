//! In-memory [`BrowserDriver`] whose page behaviour is scripted by the test.

use crate::driver::{BrowserDriver, NetworkEvent, PerformanceCounters, TabInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use extperf_core::page::NativeDialog;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

type EvaluateFn = Box<dyn Fn(&str) -> Result<serde_json::Value> + Send + Sync>;
type CountersFn = Box<dyn Fn(usize) -> Result<PerformanceCounters> + Send + Sync>;

/// A dialog action the driver was asked to perform
#[derive(Debug, Clone, PartialEq)]
pub enum DialogCall {
    Accept(Option<String>),
    Dismiss,
}

pub struct ScriptedDriver {
    evaluate: Mutex<Option<EvaluateFn>>,
    counters: Mutex<Option<CountersFn>>,
    counter_reads: AtomicUsize,
    network: Mutex<Vec<NetworkEvent>>,
    dialog: Mutex<Option<NativeDialog>>,
    navigations: Mutex<Vec<String>>,
    dialog_calls: Mutex<Vec<DialogCall>>,
    evaluations: AtomicUsize,
    fail_navigation: AtomicBool,
    fail_network: AtomicBool,
    evaluate_delay: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            evaluate: Mutex::new(None),
            counters: Mutex::new(None),
            counter_reads: AtomicUsize::new(0),
            network: Mutex::new(Vec::new()),
            dialog: Mutex::new(None),
            navigations: Mutex::new(Vec::new()),
            dialog_calls: Mutex::new(Vec::new()),
            evaluations: AtomicUsize::new(0),
            fail_navigation: AtomicBool::new(false),
            fail_network: AtomicBool::new(false),
            evaluate_delay: Mutex::new(None),
        }
    }

    /// Answer every `evaluate` call with `handler(expression)`
    pub fn on_evaluate<F>(&self, handler: F)
    where
        F: Fn(&str) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        *lock(&self.evaluate) = Some(Box::new(handler));
    }

    /// Answer the n-th `performance_counters` call (0-based) with `handler(n)`
    pub fn on_counters<F>(&self, handler: F)
    where
        F: Fn(usize) -> Result<PerformanceCounters> + Send + Sync + 'static,
    {
        *lock(&self.counters) = Some(Box::new(handler));
    }

    /// Events returned by every `record_network` call, after the window has elapsed
    pub fn set_network_events(&self, events: Vec<NetworkEvent>) {
        *lock(&self.network) = events;
    }

    /// Open (or clear) a native dialog. While one is open, `evaluate` never returns.
    pub fn set_native_dialog(&self, dialog: Option<NativeDialog>) {
        *lock(&self.dialog) = dialog;
    }

    /// Delay applied before each `evaluate` answer
    pub fn set_evaluate_delay(&self, delay: Option<Duration>) {
        *lock(&self.evaluate_delay) = delay;
    }

    pub fn fail_navigation(&self, fail: bool) {
        self.fail_navigation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_network(&self, fail: bool) {
        self.fail_network.store(fail, Ordering::SeqCst);
    }

    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }

    pub fn dialog_calls(&self) -> Vec<DialogCall> {
        lock(&self.dialog_calls).clone()
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    pub fn counter_reads(&self) -> usize {
        self.counter_reads.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        Ok(vec![TabInfo {
            target_id: "scripted".to_string(),
            url: lock(&self.navigations).last().cloned(),
            title: None,
        }])
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo> {
        Ok(TabInfo {
            target_id: format!("scripted-{}", url),
            url: Some(url.to_string()),
            title: None,
        })
    }

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        if self.fail_navigation.load(Ordering::SeqCst) {
            return Err(Error::TargetClosed(format!("navigation to {} failed", url)));
        }
        lock(&self.navigations).push(url.to_string());
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);

        if lock(&self.dialog).is_some() {
            // Chrome does not answer Runtime.evaluate while a native dialog is open
            futures::future::pending::<()>().await;
        }

        let delay = *lock(&self.evaluate_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match lock(&self.evaluate).as_ref() {
            Some(handler) => handler(expression),
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn performance_counters(&self) -> Result<PerformanceCounters> {
        let n = self.counter_reads.fetch_add(1, Ordering::SeqCst);
        match lock(&self.counters).as_ref() {
            Some(handler) => handler(n),
            None => Err(Error::Cdp("Performance.getMetrics is not scripted".to_string())),
        }
    }

    async fn record_network(&self, window: Duration, navigate_to: Option<&str>) -> Result<Vec<NetworkEvent>> {
        if self.fail_network.load(Ordering::SeqCst) {
            return Err(Error::TargetClosed("network recording failed".to_string()));
        }
        if let Some(url) = navigate_to {
            lock(&self.navigations).push(url.to_string());
        }
        tokio::time::sleep(window).await;
        Ok(lock(&self.network).clone())
    }

    async fn native_dialog(&self) -> Result<Option<NativeDialog>> {
        Ok(lock(&self.dialog).clone())
    }

    async fn accept_native_dialog(&self, prompt: Option<&str>) -> Result<()> {
        lock(&self.dialog_calls).push(DialogCall::Accept(prompt.map(str::to_string)));
        *lock(&self.dialog) = None;
        Ok(())
    }

    async fn dismiss_native_dialog(&self) -> Result<()> {
        lock(&self.dialog_calls).push(DialogCall::Dismiss);
        *lock(&self.dialog) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::with_timeout;
    use extperf_core::page::NativeDialogKind;

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_hangs_while_native_dialog_is_open() {
        let driver = ScriptedDriver::new();
        driver.set_native_dialog(Some(NativeDialog {
            kind: NativeDialogKind::Alert,
            message: "hello".to_string(),
            default_prompt: None,
        }));

        let result = with_timeout("evaluate", Duration::from_secs(2), driver.evaluate("1")).await;
        assert!(matches!(result, Err(Error::Timeout { .. })));

        driver.dismiss_native_dialog().await.unwrap();
        assert_eq!(driver.evaluate("1").await.unwrap(), serde_json::Value::Null);
        assert_eq!(driver.dialog_calls(), vec![DialogCall::Dismiss]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_network_waits_for_window() {
        let driver = ScriptedDriver::new();
        let started = tokio::time::Instant::now();

        let events = driver
            .record_network(Duration::from_millis(2000), Some("https://example.com"))
            .await
            .unwrap();

        assert!(events.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!(driver.navigations(), vec!["https://example.com"]);
    }
}

use crate::collector::MetricsCollector;
use crate::tracker::NetworkTracker;
use extperf_browser::BrowserDriver;
use extperf_core::analysis::{
    ImpactScorer, IterationFailure, IterationOutcome, IterationResult, PageRun, RunConfiguration, build_report,
};
use extperf_core::config::Timeouts;
use extperf_core::report::ImpactReport;
use extperf_core::{Error, Result};
use extperf_detectors::PageStateDetector;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Parameters of one multi-page impact run
#[derive(Debug, Clone)]
pub struct ImpactRun {
    pub extension_id: String,
    pub test_pages: Vec<String>,
    pub iterations: u32,
    pub performance_duration: Duration,
    pub network_duration: Duration,
    pub include_network_details: bool,
}

impl ImpactRun {
    fn validate(&self) -> Result<()> {
        if self.test_pages.is_empty() {
            return Err(Error::InvalidInput("at least one test page is required".to_string()));
        }
        if self.iterations == 0 {
            return Err(Error::InvalidInput("iterations must be greater than 0".to_string()));
        }
        if self.performance_duration.is_zero() || self.network_duration.is_zero() {
            return Err(Error::InvalidInput(
                "performance and network durations must be greater than 0".to_string(),
            ));
        }
        for page in &self.test_pages {
            Url::parse(page).map_err(|e| Error::InvalidInput(format!("invalid test page '{}': {}", page, e)))?;
        }
        Ok(())
    }

    fn total(&self) -> u64 {
        self.test_pages.len() as u64 * self.iterations as u64
    }
}

/// Emitted after every (page, iteration)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub page_index: usize,
    /// 1-based
    pub iteration: u32,
    pub completed: u64,
    pub total: u64,
    pub succeeded: bool,
}

pub type ProgressCallback = Box<dyn Fn(&RunProgress) + Send + Sync>;

/// Runs the metrics and network pipeline over pages x iterations and aggregates the outcome
pub struct ImpactOrchestrator {
    collector: MetricsCollector,
    tracker: NetworkTracker,
    scorer: ImpactScorer,
    guard: Option<Arc<PageStateDetector>>,
    progress: Option<ProgressCallback>,
}

impl ImpactOrchestrator {
    pub fn new(driver: Arc<dyn BrowserDriver>, timeouts: Timeouts, scorer: ImpactScorer) -> Self {
        Self {
            collector: MetricsCollector::new(driver.clone(), timeouts),
            tracker: NetworkTracker::new(driver, timeouts),
            scorer,
            guard: None,
            progress: None,
        }
    }

    /// Clear blocking dialogs before each pipeline step
    pub fn with_page_guard(mut self, detector: Arc<PageStateDetector>) -> Self {
        self.guard = Some(detector);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RunProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Only invalid parameters fail the run; failed iterations end up in the report
    pub async fn run(&self, run: &ImpactRun) -> Result<ImpactReport> {
        run.validate()?;

        let total = run.total();
        tracing::info!(
            "Measuring {} page(s) x {} iteration(s) for extension {}",
            run.test_pages.len(),
            run.iterations,
            run.extension_id
        );

        let mut pages = Vec::with_capacity(run.test_pages.len());
        let mut completed = 0u64;

        for (page_index, url) in run.test_pages.iter().enumerate() {
            let mut outcomes = Vec::with_capacity(run.iterations as usize);

            for iteration in 1..=run.iterations {
                tracing::debug!("{} iteration {}/{}", url, iteration, run.iterations);
                let outcome = self.run_iteration(run, url, iteration).await;
                if let Err(failure) = &outcome {
                    tracing::warn!(
                        "{} iteration {} failed during {}: {}",
                        url,
                        iteration,
                        failure.operation,
                        failure.error
                    );
                }

                completed += 1;
                if let Some(callback) = &self.progress {
                    callback(&RunProgress {
                        page_index,
                        iteration,
                        completed,
                        total,
                        succeeded: outcome.is_ok(),
                    });
                }
                outcomes.push(outcome);
            }

            pages.push(PageRun {
                url: url.clone(),
                outcomes,
            });
        }

        let config = RunConfiguration {
            extension_id: run.extension_id.clone(),
            iterations_per_page: run.iterations,
            performance_duration_ms: run.performance_duration.as_millis() as u64,
            network_duration_ms: run.network_duration.as_millis() as u64,
            include_network_details: run.include_network_details,
        };
        Ok(build_report(&config, &pages, &self.scorer))
    }

    async fn run_iteration(&self, run: &ImpactRun, url: &str, iteration: u32) -> IterationOutcome {
        self.clear_blocks("metrics")
            .await
            .map_err(|e| IterationFailure::new(iteration, "guard", &e))?;
        let measurement = self
            .collector
            .measure(&run.extension_id, url, run.performance_duration, false)
            .await
            .map_err(|e| IterationFailure::new(iteration, "metrics", &e))?;

        self.clear_blocks("network")
            .await
            .map_err(|e| IterationFailure::new(iteration, "guard", &e))?;
        let network = self
            .tracker
            .track(
                &run.extension_id,
                run.network_duration,
                Some(url),
                run.include_network_details,
            )
            .await
            .map_err(|e| IterationFailure::new(iteration, "network", &e))?;

        let assessment = self.scorer.score(&measurement.delta, &network);
        tracing::debug!(
            "{} iteration {} scored {:.1} ({})",
            url,
            iteration,
            assessment.impact_score,
            assessment.impact_level.as_str()
        );

        Ok(IterationResult {
            iteration,
            delta: measurement.delta,
            network,
            assessment,
        })
    }

    /// A page the guard cannot inspect is not measured
    async fn clear_blocks(&self, step: &str) -> Result<()> {
        let Some(guard) = &self.guard else {
            return Ok(());
        };
        if guard.clear_if_blocked().await? {
            tracing::info!("Cleared a blocked page before the {} step", step);
        }
        Ok(())
    }
}

use super::{ImpactAssessment, ImpactLevel, Recommendation, RuleKind, ScoreBreakdown};
use crate::metrics::MetricsDelta;
use crate::network::{NetworkAverages, NetworkSummary};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const MIB: f64 = 1024.0 * 1024.0;

/// Weight, saturation cap and recommendation trigger of one score component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentPolicy {
    pub weight: f64,
    pub cap: f64,
    pub trigger: f64,
}

impl ComponentPolicy {
    const fn new(weight: f64, cap: f64, trigger: f64) -> Self {
        Self {
            weight,
            cap,
            trigger,
        }
    }

    /// Value normalized to [0, 1]; negative and NaN inputs count as 0
    fn normalize(&self, value: f64) -> f64 {
        if value.is_nan() || value <= 0.0 {
            return 0.0;
        }
        (value / self.cap).min(1.0)
    }

    fn severity(&self, value: f64) -> f64 {
        if value.is_finite() { value / self.cap } else { 1.0 }
    }
}

/// Lower bounds of each level above `none`; must be strictly ascending within (0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
    pub severe: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            low: 10.0,
            moderate: 30.0,
            high: 55.0,
            severe: 80.0,
        }
    }
}

/// Scoring constants. These are policy; the config file may override any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringPolicy {
    /// CPU delta in percentage points
    pub cpu: ComponentPolicy,
    /// Heap delta in MB
    pub memory: ComponentPolicy,
    /// Script execution delta in ms
    pub execution_time: ComponentPolicy,
    /// LCP delta in ms
    pub lcp: ComponentPolicy,
    pub cls: ComponentPolicy,
    /// Requests per window
    pub requests: ComponentPolicy,
    /// Bytes per window
    pub bytes: ComponentPolicy,
    pub failed_request_trigger: f64,
    pub slow_request_trigger_ms: f64,
    pub levels: LevelThresholds,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            cpu: ComponentPolicy::new(0.25, 50.0, 10.0),
            memory: ComponentPolicy::new(0.15, 100.0, 20.0),
            execution_time: ComponentPolicy::new(0.20, 1000.0, 200.0),
            lcp: ComponentPolicy::new(0.15, 2500.0, 500.0),
            cls: ComponentPolicy::new(0.10, 0.25, 0.05),
            requests: ComponentPolicy::new(0.075, 50.0, 10.0),
            bytes: ComponentPolicy::new(0.075, 5.0 * MIB, MIB),
            failed_request_trigger: 1.0,
            slow_request_trigger_ms: 1000.0,
            levels: LevelThresholds::default(),
        }
    }
}

impl ScoringPolicy {
    fn components(&self) -> [(&'static str, &ComponentPolicy); 7] {
        [
            ("cpu", &self.cpu),
            ("memory", &self.memory),
            ("executionTime", &self.execution_time),
            ("lcp", &self.lcp),
            ("cls", &self.cls),
            ("requests", &self.requests),
            ("bytes", &self.bytes),
        ]
    }

    /// Reject policies that could push scores outside [0, 100] or make levels non-monotonic
    pub fn validate(&self) -> Result<()> {
        let mut total_weight = 0.0;
        for (name, component) in self.components() {
            if !component.weight.is_finite() || component.weight < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "scoring weight for {} must be a non-negative number",
                    name
                )));
            }
            if !component.cap.is_finite() || component.cap <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "scoring cap for {} must be greater than zero",
                    name
                )));
            }
            if !component.trigger.is_finite() || component.trigger <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "recommendation trigger for {} must be greater than zero",
                    name
                )));
            }
            total_weight += component.weight;
        }

        for (name, trigger) in [
            ("failedRequestTrigger", self.failed_request_trigger),
            ("slowRequestTriggerMs", self.slow_request_trigger_ms),
        ] {
            if !trigger.is_finite() || trigger <= 0.0 {
                return Err(Error::InvalidInput(format!("{} must be greater than zero", name)));
            }
        }

        if total_weight <= 0.0 {
            return Err(Error::InvalidInput(
                "at least one scoring weight must be positive".to_string(),
            ));
        }

        let l = &self.levels;
        let ascending = 0.0 < l.low && l.low < l.moderate && l.moderate < l.high && l.high < l.severe;
        if !ascending || l.severe > 100.0 {
            return Err(Error::InvalidInput(format!(
                "level thresholds must ascend within (0, 100], got {}/{}/{}/{}",
                l.low, l.moderate, l.high, l.severe
            )));
        }

        Ok(())
    }
}

/// Network figures the scorer looks at, from a single window or a mean of windows
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkLoad {
    pub requests: f64,
    pub bytes: f64,
    pub failed: f64,
    pub average_request_time: f64,
}

impl From<&NetworkSummary> for NetworkLoad {
    fn from(summary: &NetworkSummary) -> Self {
        Self {
            requests: summary.total_requests as f64,
            bytes: summary.total_data_transferred as f64,
            failed: summary.statistics.failed_requests as f64,
            average_request_time: summary.average_request_time,
        }
    }
}

impl From<&NetworkAverages> for NetworkLoad {
    fn from(averages: &NetworkAverages) -> Self {
        Self {
            requests: averages.total_requests,
            bytes: averages.total_data_transferred,
            failed: averages.failed_requests,
            average_request_time: averages.average_request_time,
        }
    }
}

pub struct ImpactScorer {
    policy: ScoringPolicy,
}

impl ImpactScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score a single measurement against the network activity of the same iteration
    pub fn score(&self, delta: &MetricsDelta, network: &NetworkSummary) -> ImpactAssessment {
        self.score_load(delta, NetworkLoad::from(network))
    }

    pub fn score_load(&self, delta: &MetricsDelta, network: NetworkLoad) -> ImpactAssessment {
        let breakdown = self.breakdown(delta, network);
        let impact_score = clamp_score(breakdown.total());
        let impact_level = self.level_for(impact_score);
        let recommendations = self
            .recommendations(delta, network)
            .into_iter()
            .map(|r| r.message)
            .collect();

        tracing::debug!(
            "Impact score {:.2} ({}) from breakdown {:?}",
            impact_score,
            impact_level,
            breakdown
        );

        ImpactAssessment {
            impact_score,
            impact_level,
            recommendations,
            breakdown,
        }
    }

    /// Weighted points per component. Weights are normalized so the total never exceeds 100.
    pub fn breakdown(&self, delta: &MetricsDelta, network: NetworkLoad) -> ScoreBreakdown {
        let p = &self.policy;
        let total_weight: f64 = p.components().iter().map(|(_, c)| c.weight).sum();
        let scale = if total_weight > 0.0 {
            100.0 / total_weight.max(1.0)
        } else {
            0.0
        };
        let points = |c: &ComponentPolicy, value: f64| c.weight * c.normalize(value) * scale;

        ScoreBreakdown {
            cpu: points(&p.cpu, delta.cpu_usage),
            memory: points(&p.memory, delta.memory_usage),
            execution_time: points(&p.execution_time, delta.execution_time),
            lcp: points(&p.lcp, delta.lcp),
            cls: points(&p.cls, delta.cls),
            network: points(&p.requests, network.requests) + points(&p.bytes, network.bytes),
        }
    }

    pub fn level_for(&self, score: f64) -> ImpactLevel {
        let l = &self.policy.levels;
        if score >= l.severe {
            ImpactLevel::Severe
        } else if score >= l.high {
            ImpactLevel::High
        } else if score >= l.moderate {
            ImpactLevel::Moderate
        } else if score >= l.low {
            ImpactLevel::Low
        } else {
            ImpactLevel::None
        }
    }

    /// Fired rules, most severe first
    pub fn recommendations(&self, delta: &MetricsDelta, network: NetworkLoad) -> Vec<Recommendation> {
        let p = &self.policy;
        let mut fired = Vec::new();

        let mut check = |rule: RuleKind, component: &ComponentPolicy, value: f64, message: String| {
            if value > component.trigger {
                fired.push(Recommendation {
                    rule,
                    severity: component.severity(value),
                    message,
                });
            }
        };

        check(
            RuleKind::Cpu,
            &p.cpu,
            delta.cpu_usage,
            format!(
                "CPU usage rose by {:.1} percentage points; profile content scripts and background work for long tasks",
                delta.cpu_usage
            ),
        );
        check(
            RuleKind::Memory,
            &p.memory,
            delta.memory_usage,
            format!(
                "JS heap grew by {:.1} MB; audit retained objects and caches in content scripts",
                delta.memory_usage
            ),
        );
        check(
            RuleKind::ExecutionTime,
            &p.execution_time,
            delta.execution_time,
            format!(
                "Script execution time increased by {:.0} ms; defer or lazy-load extension scripts",
                delta.execution_time
            ),
        );
        check(
            RuleKind::Lcp,
            &p.lcp,
            delta.lcp,
            format!(
                "Largest Contentful Paint was delayed by {:.0} ms; avoid render-blocking injections before first paint",
                delta.lcp
            ),
        );
        check(
            RuleKind::Cls,
            &p.cls,
            delta.cls,
            format!(
                "Layout shift increased by {:.3}; reserve space for injected UI",
                delta.cls
            ),
        );
        check(
            RuleKind::RequestCount,
            &p.requests,
            network.requests,
            format!(
                "{:.0} network requests observed during the window; batch or cache extension requests",
                network.requests
            ),
        );
        check(
            RuleKind::TransferSize,
            &p.bytes,
            network.bytes,
            format!(
                "{:.2} MB transferred during the window; reduce or compress fetched resources",
                network.bytes / MIB
            ),
        );

        if network.failed >= p.failed_request_trigger && network.failed > 0.0 {
            let severity = if network.requests > 0.0 {
                network.failed / network.requests
            } else {
                1.0
            };
            fired.push(Recommendation {
                rule: RuleKind::FailedRequests,
                severity,
                message: format!(
                    "{:.0} request(s) failed or timed out; investigate failing endpoints",
                    network.failed
                ),
            });
        }

        if network.average_request_time > p.slow_request_trigger_ms {
            fired.push(Recommendation {
                rule: RuleKind::SlowRequests,
                severity: network.average_request_time / (p.slow_request_trigger_ms * 2.0),
                message: format!(
                    "Requests took {:.0} ms on average; move slow calls off the critical path",
                    network.average_request_time
                ),
            });
        }

        // stable sort keeps rule order for equal severities
        fired.sort_by(|a, b| b.severity.total_cmp(&a.severity));
        fired
    }
}

impl Default for ImpactScorer {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

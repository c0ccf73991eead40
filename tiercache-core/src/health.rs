//! Health verdicts.
//!
//! Both backends answer health checks with the same shape. The verdicts
//! they can actually produce differ by construction: the in-process
//! backend is never unreachable so it never reports [`HealthStatus::Unhealthy`],
//! while the remote backend either answers its liveness probe or it
//! doesn't, so it never reports [`HealthStatus::Warning`].

use std::time::Duration;

use serde::Serialize;

/// Coarse health classification of a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Operating normally.
    Healthy,
    /// Operating, but under pressure worth surfacing.
    Warning,
    /// Not usable right now.
    Unhealthy,
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// The derived verdict.
    pub status: HealthStatus,
    /// Human-readable explanations for a non-healthy verdict.
    pub reasons: Vec<String>,
    /// Probe round-trip latency, for backends that measure one.
    pub latency: Option<Duration>,
}

impl HealthReport {
    /// A healthy report with no latency measurement.
    pub fn healthy() -> Self {
        HealthReport {
            status: HealthStatus::Healthy,
            reasons: Vec::new(),
            latency: None,
        }
    }

    /// A healthy report carrying a measured probe latency.
    pub fn healthy_with_latency(latency: Duration) -> Self {
        HealthReport {
            status: HealthStatus::Healthy,
            reasons: Vec::new(),
            latency: Some(latency),
        }
    }

    /// A warning report with at least one reason.
    pub fn warning(reasons: Vec<String>) -> Self {
        HealthReport {
            status: HealthStatus::Warning,
            reasons,
            latency: None,
        }
    }

    /// An unhealthy report with a single reason.
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        HealthReport {
            status: HealthStatus::Unhealthy,
            reasons: vec![reason.into()],
            latency: None,
        }
    }
}

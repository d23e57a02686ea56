//! Health grading for the `status` report

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction of capacity at which the pool is reported as degraded
pub const DEGRADED_UTILIZATION: f64 = 0.9;

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// System is degraded but functional
    Degraded,
    /// System is unhealthy
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        })
    }
}

/// Health report over a set of component checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status
    pub status: HealthStatus,
    /// Component checks
    pub checks: Vec<ComponentCheck>,
    /// Timestamp
    pub timestamp: String,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthReport {
    /// Fold component checks into an overall status
    pub fn from_checks(checks: Vec<ComponentCheck>) -> Self {
        let mut overall_status = HealthStatus::Healthy;

        for result in &checks {
            match (&overall_status, &result.status) {
                (_, HealthStatus::Unhealthy) => overall_status = HealthStatus::Unhealthy,
                (HealthStatus::Healthy, HealthStatus::Degraded) => {
                    overall_status = HealthStatus::Degraded
                }
                _ => {}
            }
        }

        HealthReport {
            status: overall_status,
            checks,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Create a simple component check
pub fn simple_check(name: &str, healthy: bool, message: Option<&str>) -> ComponentCheck {
    ComponentCheck {
        name: name.to_string(),
        status: if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        message: message.map(|s| s.to_string()),
    }
}

/// Grade pool usage: degraded once usage reaches [`DEGRADED_UTILIZATION`]
pub fn utilization_check(name: &str, used: usize, capacity: usize) -> ComponentCheck {
    let ratio = if capacity == 0 {
        1.0
    } else {
        used as f64 / capacity as f64
    };
    let remaining = capacity.saturating_sub(used);

    let (status, message) = if ratio >= DEGRADED_UTILIZATION {
        (
            HealthStatus::Degraded,
            Some(format!("{} of {} slots left", remaining, capacity)),
        )
    } else {
        (HealthStatus::Healthy, None)
    };

    ComponentCheck {
        name: name.to_string(),
        status,
        message,
    }
}

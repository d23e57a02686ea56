//! wg-manager observability
//!
//! This crate provides:
//! - Structured logging with tracing, written to stderr
//! - Health grading for the `status` report

#![warn(missing_docs)]

pub mod health;
pub mod logging;

// Re-exports
pub use health::{
    simple_check, utilization_check, ComponentCheck, HealthReport, HealthStatus,
};
pub use logging::{init_logging, LogConfig, LogFormat};

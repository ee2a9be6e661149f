//! Error handling framework for the ingestion and detection pipeline.
//!
//! Categorized error codes, request/error context for correlation, severity
//! classification, and a metrics collector so error rates are observable
//! the same way the rest of the pipeline's throughput is.

pub mod codes;
pub mod context;
pub mod framework;
pub mod metrics;

pub use codes::ErrorCode;
pub use context::ErrorContext;
pub use framework::{Error, ErrorCategory, ErrorSeverity, Result};
pub use metrics::ErrorMetrics;

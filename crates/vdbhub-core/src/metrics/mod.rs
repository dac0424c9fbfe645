//! Registry metrics.
//!
//! ```ignore
//! use vdbhub_core::metrics::RuntimeMetrics;
//!
//! let metrics = RuntimeMetrics::new();
//! metrics.record_deployment();
//! let text = metrics.to_prometheus();
//! ```

mod histogram;
mod runtime;

pub use histogram::Histogram;
pub use runtime::{RuntimeMetrics, SharedRuntimeMetrics};

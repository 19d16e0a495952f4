//! Metrics preparation and registration module.
//!
//! This module turns certificates into expiration gauges and registers
//! them into an externally supplied Prometheus registry.
//!
//! # Submodules
//!
//! - `prom` - Prometheus gauge preparation and binding

pub mod prom;

pub use prom::{
    ExpirationMetrics, GaugeSpec, SubjectDnTagFactory, Tag, TagFactory, METRIC_DESCRIPTION,
    METRIC_NAME, METRIC_UNIT,
};

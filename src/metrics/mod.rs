pub mod metrics_impl;
pub mod snapshot;

pub use metrics_impl::PriorityLruMetrics;
pub use snapshot::MetricsSnapshot;

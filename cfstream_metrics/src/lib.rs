pub mod aggregator;
pub mod exporters;
pub mod registry;
pub mod telemetry;

pub use aggregator::MinutesViewedAggregator;
pub use exporters::RenderedMetrics;
pub use registry::{MetricsRegistry, STREAMING_MINUTES_VIEWED};
pub use telemetry::ExporterMetrics;

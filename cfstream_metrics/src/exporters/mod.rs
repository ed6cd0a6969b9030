pub mod prometheus;

pub use self::prometheus::RenderedMetrics;

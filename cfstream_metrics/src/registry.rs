use crate::exporters::RenderedMetrics;
use cfstream_core::{ExporterError, Result};
use prometheus::core::Collector;
use prometheus::{GaugeVec, Opts, Registry};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Gauge published for every included account.
pub const STREAMING_MINUTES_VIEWED: &str = "cloudflare_streaming_minutes_viewed";
const STREAMING_MINUTES_VIEWED_HELP: &str = "Number of minutes viewed by a user";
pub const ACCOUNT_LABEL: &str = "account";

/// Process-wide store of labeled gauges.
///
/// Constructed once at startup and shared by `Arc` between the scheduler
/// (writer) and the HTTP handlers (readers).
pub struct MetricsRegistry {
    registry: Registry,
    gauges: RwLock<HashMap<String, GaugeVec>>,
}

impl MetricsRegistry {
    /// A registry with the streaming minutes gauge already described.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let mut gauges = HashMap::new();

        let minutes_viewed = GaugeVec::new(
            Opts::new(STREAMING_MINUTES_VIEWED, STREAMING_MINUTES_VIEWED_HELP),
            &[ACCOUNT_LABEL],
        )?;
        registry.register(Box::new(minutes_viewed.clone()))?;
        gauges.insert(STREAMING_MINUTES_VIEWED.to_string(), minutes_viewed);

        Ok(Self {
            registry,
            gauges: RwLock::new(gauges),
        })
    }

    /// Register a labeled gauge family. Describing an existing name is a no-op.
    pub async fn describe_gauge(&self, name: &str, help: &str, label_names: &[&str]) -> Result<()> {
        let mut gauges = self.gauges.write().await;
        if gauges.contains_key(name) {
            return Ok(());
        }

        let gauge = GaugeVec::new(Opts::new(name, help), label_names)?;
        self.registry.register(Box::new(gauge.clone()))?;
        gauges.insert(name.to_string(), gauge);
        Ok(())
    }

    /// Upsert one gauge value. Last write wins.
    pub async fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64) -> Result<()> {
        let gauges = self.gauges.read().await;
        let family = gauges.get(name).ok_or_else(|| {
            ExporterError::InvalidConfig(format!("gauge '{}' has not been described", name))
        })?;

        let labels: HashMap<&str, &str> = labels.iter().copied().collect();
        family.get_metric_with(&labels)?.set(value);

        debug!("Set {}{:?} = {}", name, labels, value);
        Ok(())
    }

    pub async fn gauge_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let gauges = self.gauges.read().await;
        let family = gauges.get(name)?;
        let labels: HashMap<&str, &str> = labels.iter().copied().collect();

        // Only report series that have been written; `get_metric_with` would create one.
        let exists = family
            .collect()
            .iter()
            .flat_map(|mf| mf.get_metric())
            .any(|m| {
                m.get_label().len() == labels.len()
                    && m
                        .get_label()
                        .iter()
                        .all(|l| labels.get(l.get_name()) == Some(&l.get_value()))
            });

        if exists {
            family.get_metric_with(&labels).ok().map(|g| g.get())
        } else {
            None
        }
    }

    /// Register an additional collector (exporter self-instrumentation).
    pub fn register(&self, collector: Box<dyn Collector>) -> Result<()> {
        self.registry.register(collector)?;
        Ok(())
    }

    /// Snapshot every registered family in the text exposition format.
    pub fn render_all(&self) -> Result<RenderedMetrics> {
        RenderedMetrics::encode(&self.registry.gather())
    }
}

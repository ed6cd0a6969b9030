use crate::registry::MetricsRegistry;
use cfstream_core::Result;
use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts};
use std::time::Duration;

/// Counters describing the exporter's own fetch loop.
#[derive(Clone)]
pub struct ExporterMetrics {
    cycles_total: IntCounter,
    cycle_failures_total: IntCounter,
    fetch_errors_total: IntCounterVec,
    last_cycle_duration_seconds: Gauge,
    last_success_timestamp_seconds: Gauge,
    accounts_published: IntGauge,
}

impl ExporterMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        let metrics = Self {
            cycles_total: IntCounter::new(
                "cfstream_exporter_cycles_total",
                "Completed fetch cycles",
            )?,
            cycle_failures_total: IntCounter::new(
                "cfstream_exporter_cycle_failures_total",
                "Fetch cycles that aborted before completing",
            )?,
            fetch_errors_total: IntCounterVec::new(
                Opts::new(
                    "cfstream_exporter_fetch_errors_total",
                    "Per-account analytics fetch failures",
                ),
                &["account"],
            )?,
            last_cycle_duration_seconds: Gauge::new(
                "cfstream_exporter_last_cycle_duration_seconds",
                "Wall time of the most recent fetch cycle",
            )?,
            last_success_timestamp_seconds: Gauge::new(
                "cfstream_exporter_last_success_timestamp_seconds",
                "Unix time of the most recent completed fetch cycle",
            )?,
            accounts_published: IntGauge::new(
                "cfstream_exporter_accounts_published",
                "Accounts updated by the most recent fetch cycle",
            )?,
        };

        registry.register(Box::new(metrics.cycles_total.clone()))?;
        registry.register(Box::new(metrics.cycle_failures_total.clone()))?;
        registry.register(Box::new(metrics.fetch_errors_total.clone()))?;
        registry.register(Box::new(metrics.last_cycle_duration_seconds.clone()))?;
        registry.register(Box::new(metrics.last_success_timestamp_seconds.clone()))?;
        registry.register(Box::new(metrics.accounts_published.clone()))?;

        Ok(metrics)
    }

    pub fn record_cycle(&self, duration: Duration, published: usize, finished_at: DateTime<Utc>) {
        self.cycles_total.inc();
        self.last_cycle_duration_seconds.set(duration.as_secs_f64());
        self.last_success_timestamp_seconds
            .set(finished_at.timestamp_millis() as f64 / 1000.0);
        self.accounts_published.set(published as i64);
    }

    pub fn record_cycle_failure(&self) {
        self.cycle_failures_total.inc();
    }

    pub fn record_fetch_error(&self, account_name: &str) {
        self.fetch_errors_total.with_label_values(&[account_name]).inc();
    }

    pub fn cycles(&self) -> u64 {
        self.cycles_total.get()
    }

    pub fn cycle_failures(&self) -> u64 {
        self.cycle_failures_total.get()
    }

    /// Failures recorded for `account_name`. Reading never creates a series.
    pub fn fetch_errors(&self, account_name: &str) -> u64 {
        self.fetch_errors_total
            .collect()
            .iter()
            .flat_map(|mf| mf.get_metric())
            .find(|m| m.get_label().iter().any(|l| l.get_value() == account_name))
            .map(|m| m.get_counter().get_value() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_cycle() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = ExporterMetrics::register(&registry).unwrap();
        let finished_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        metrics.record_cycle(Duration::from_millis(1500), 3, finished_at);
        metrics.record_fetch_error("Acme");

        assert_eq!(metrics.cycles(), 1);
        assert_eq!(metrics.fetch_errors("Acme"), 1);

        let rendered = registry.render_all().unwrap();
        assert!(rendered.lines().any(|l| l == "cfstream_exporter_last_cycle_duration_seconds 1.5"));
        assert!(rendered.lines().any(|l| l == "cfstream_exporter_accounts_published 3"));
        assert!(rendered
            .lines()
            .any(|l| l == "cfstream_exporter_last_success_timestamp_seconds 1714564800"));
        assert!(rendered
            .lines()
            .any(|l| l == "cfstream_exporter_fetch_errors_total{account=\"Acme\"} 1"));
    }

    #[test]
    fn test_reading_fetch_errors_creates_no_series() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = ExporterMetrics::register(&registry).unwrap();

        assert_eq!(metrics.fetch_errors("Quiet"), 0);
        assert!(!registry.render_all().unwrap().body().contains("Quiet"));

        metrics.record_fetch_error("Loud");
        metrics.record_fetch_error("Loud");
        assert_eq!(metrics.fetch_errors("Loud"), 2);
        assert_eq!(metrics.fetch_errors("Quiet"), 0);
        assert!(!registry.render_all().unwrap().body().contains("Quiet"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = MetricsRegistry::new().unwrap();
        ExporterMetrics::register(&registry).unwrap();
        assert!(ExporterMetrics::register(&registry).is_err());
    }

    #[test]
    fn test_streaming_gauge_coexists_with_telemetry() {
        let registry = MetricsRegistry::new().unwrap();
        let _metrics = ExporterMetrics::register(&registry).unwrap();

        tokio_test::block_on(registry.set_gauge(
            crate::STREAMING_MINUTES_VIEWED,
            &[(crate::registry::ACCOUNT_LABEL, "Acme")],
            15.0,
        ))
        .unwrap();

        let rendered = registry.render_all().unwrap();
        assert!(rendered
            .sample_lines()
            .any(|l| l == "cloudflare_streaming_minutes_viewed{account=\"Acme\"} 15"));
    }
}

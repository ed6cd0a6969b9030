use cfstream_core::window::DEFAULT_WINDOW_MINUTES;
use cfstream_core::{Account, AccountFilter, AnalyticsWindow, DynAnalyticsApi, Result};
use cfstream_metrics::registry::ACCOUNT_LABEL;
use cfstream_metrics::{ExporterMetrics, MetricsRegistry, MinutesViewedAggregator, STREAMING_MINUTES_VIEWED};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Executes one fetch → aggregate → publish pass over every included account.
pub struct CycleRunner {
    api: DynAnalyticsApi,
    registry: Arc<MetricsRegistry>,
    telemetry: ExporterMetrics,
    filter: AccountFilter,
    window: chrono::Duration,
}

enum AccountOutcome {
    Published(f64),
    Empty,
}

impl CycleRunner {
    pub fn new(
        api: DynAnalyticsApi,
        registry: Arc<MetricsRegistry>,
        telemetry: ExporterMetrics,
        filter: AccountFilter,
        window: Duration,
    ) -> Self {
        let window = chrono::Duration::from_std(window)
            .unwrap_or_else(|_| chrono::Duration::minutes(DEFAULT_WINDOW_MINUTES));

        Self {
            api,
            registry,
            telemetry,
            filter,
            window,
        }
    }

    pub fn telemetry(&self) -> &ExporterMetrics {
        &self.telemetry
    }

    /// Run a full cycle.
    ///
    /// Only account enumeration failures are returned; per-account failures
    /// are logged and leave that account's gauge untouched.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let start_time = Instant::now();

        let accounts = self.api.list_accounts().await?;
        let accounts_listed = accounts.len();
        let included = self.filter.apply(accounts);

        debug!(
            "Listed {} accounts, {} included by filter",
            accounts_listed,
            included.len()
        );

        let mut report = CycleReport {
            accounts_listed,
            accounts_included: included.len(),
            ..Default::default()
        };

        for account in &included {
            info!("Fetching streaming analytics for {}", account.name);

            match self.publish_account(account).await {
                Ok(AccountOutcome::Published(value)) => {
                    debug!("Published {} = {} for {}", STREAMING_MINUTES_VIEWED, value, account.name);
                    report.published.push(account.name.clone());
                }
                Ok(AccountOutcome::Empty) => {
                    debug!("No buckets reported for {}, keeping previous value", account.name);
                    report.empty.push(account.name.clone());
                }
                Err(e) => {
                    warn!(
                        "Failed to fetch streaming analytics for {}: {}",
                        account.description(),
                        e
                    );
                    self.telemetry.record_fetch_error(&account.name);
                    report.failed.push(account.name.clone());
                }
            }
        }

        report.duration = start_time.elapsed();
        self.telemetry
            .record_cycle(report.duration, report.published.len(), Utc::now());

        info!(
            "Cycle completed in {:?}: {} published, {} failed, {} empty",
            report.duration,
            report.published.len(),
            report.failed.len(),
            report.empty.len()
        );

        Ok(report)
    }

    async fn publish_account(&self, account: &Account) -> Result<AccountOutcome> {
        let window = AnalyticsWindow::ending_now(self.window);
        let samples = self.api.fetch_window(&account.id, &window).await?;

        let Some(value) = MinutesViewedAggregator::aggregate(&samples) else {
            return Ok(AccountOutcome::Empty);
        };

        self.registry
            .set_gauge(
                STREAMING_MINUTES_VIEWED,
                &[(ACCOUNT_LABEL, account.name.as_str())],
                value,
            )
            .await?;

        Ok(AccountOutcome::Published(value))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub accounts_listed: usize,
    pub accounts_included: usize,
    pub published: Vec<String>,
    pub failed: Vec<String>,
    pub empty: Vec<String>,
    #[serde(with = "crate::config::humantime_serde")]
    pub duration: Duration,
}

impl CycleReport {
    pub fn success_rate(&self) -> f64 {
        if self.accounts_included == 0 {
            return 1.0;
        }
        self.published.len() as f64 / self.accounts_included as f64
    }
}

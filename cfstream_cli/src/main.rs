mod server;

use anyhow::Context;
use cfstream_core::CloudflareClient;
use cfstream_metrics::{ExporterMetrics, MetricsRegistry};
use cfstream_scheduler::{
    parse_config_from_file, ConfigOverrides, CycleRunner, ExporterConfig, Scheduler,
};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser)]
#[command(name = "cfstream-exporter")]
#[command(about = "Prometheus exporter for Cloudflare Stream minutes viewed", long_about = None)]
#[command(version)]
struct Cli {
    /// Listen on addr:port, omit addr to listen on all interfaces
    #[arg(long, env = "LISTEN")]
    listen: Option<String>,

    /// Cloudflare API token
    #[arg(long, alias = "cf_api_token", env = "CF_API_TOKEN", hide_env_values = true)]
    cf_api_token: Option<String>,

    /// Comma-separated list of account IDs to include
    #[arg(long, alias = "include_accounts", env = "INCLUDE_ACCOUNTS")]
    include_accounts: Option<String>,

    /// Path the metrics are served on
    #[arg(long, alias = "metrics_path", env = "METRICS_PATH")]
    metrics_path: Option<String>,

    /// Time between fetch cycles (e.g. 60s, 5m)
    #[arg(long, env = "SCRAPE_INTERVAL", value_parser = humantime::parse_duration)]
    scrape_interval: Option<Duration>,

    /// Trailing analytics window queried each cycle
    #[arg(long, env = "ANALYTICS_WINDOW", value_parser = humantime::parse_duration)]
    window: Option<Duration>,

    /// Timeout for each Cloudflare API request
    #[arg(long, env = "REQUEST_TIMEOUT", value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,

    /// Cloudflare REST API base URL
    #[arg(long, env = "CF_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Cloudflare GraphQL analytics endpoint
    #[arg(long, env = "CF_GRAPHQL_ENDPOINT")]
    graphql_endpoint: Option<String>,

    /// Config file (YAML, TOML, or JSON); flags take precedence
    #[arg(short, long, env = "CFSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen.clone(),
            cf_api_token: self.cf_api_token.clone(),
            include_accounts: self.include_accounts.clone(),
            metrics_path: self.metrics_path.clone(),
            scrape_interval: self.scrape_interval,
            window: self.window,
            request_timeout: self.request_timeout,
            api_base_url: self.api_base_url.clone(),
            graphql_endpoint: self.graphql_endpoint.clone(),
        }
    }

    fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else if self.quiet {
            LevelFilter::ERROR
        } else {
            LevelFilter::INFO
        }
    }
}

fn init_logging(cli: &Cli) -> WorkerGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(cli.log_level().into())
        .from_env_lossy();
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(ChronoLocal::new(LOG_TIMESTAMP_FORMAT.to_string()))
        .with_ansi(std::io::stdout().is_terminal())
        .with_writer(writer);

    match cli.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let base = match &cli.config {
        Some(path) => parse_config_from_file(path)
            .await
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => ExporterConfig::default(),
    };
    let config = cli.overrides().apply(base);
    config.validate()?;

    let registry = Arc::new(MetricsRegistry::new()?);
    let telemetry = ExporterMetrics::register(&registry)?;
    let client = CloudflareClient::new(config.client_config())?;

    let filter = config.account_filter();
    if !filter.is_empty() {
        info!("Restricting to accounts: {}", filter.ids().join(", "));
    }

    let runner = CycleRunner::new(
        Arc::new(client),
        registry.clone(),
        telemetry,
        filter,
        config.window,
    );
    let scheduler = Scheduler::new(runner, config.scrape_interval);

    let addr = config.resolve_listen_addr().await?;
    let metrics_path = config.metrics_path();
    let listener = server::bind(addr).await?;
    let app = server::router(registry, &metrics_path);

    info!(
        "Beginning to serve on {}, metrics path {}",
        addr, metrics_path
    );

    let scheduler_task = scheduler.spawn();

    tokio::select! {
        result = server::serve(listener, app) => {
            result.context("HTTP server failed")?;
        }
        result = scheduler_task => {
            result
                .context("Scheduler task aborted")?
                .context("Account enumeration failed")?;
        }
    }

    Ok(())
}

pub mod config;
pub mod parser;
pub mod runner;
pub mod scheduler;

pub use config::{normalize_metrics_path, ConfigOverrides, ExporterConfig, HEALTH_PATH};
pub use parser::{parse_config_from_file, parse_config_from_str};
pub use runner::{CycleReport, CycleRunner};
pub use scheduler::{Scheduler, SchedulerState};

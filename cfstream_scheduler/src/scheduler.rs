use crate::runner::{CycleReport, CycleRunner};
use cfstream_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Drives [`CycleRunner`] on a fixed interval. The first tick fires immediately.
pub struct Scheduler {
    runner: Arc<CycleRunner>,
    interval: Duration,
    state: RwLock<SchedulerState>,
}

impl Scheduler {
    pub fn new(runner: CycleRunner, interval: Duration) -> Self {
        Self {
            runner: Arc::new(runner),
            interval,
            state: RwLock::new(SchedulerState::Idle),
        }
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Loop forever. Returns only when account enumeration fails.
    pub async fn run(self) -> Result<()> {
        info!("Starting scheduler with interval {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        // A slow cycle pushes the next tick back instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_once().await?;
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Run one supervised cycle.
    ///
    /// `Ok(None)` means the cycle panicked; the panic is logged and counted.
    pub async fn run_once(&self) -> Result<Option<CycleReport>> {
        *self.state.write().await = SchedulerState::Running;

        let runner = self.runner.clone();
        let outcome = tokio::spawn(async move { runner.run_cycle().await }).await;

        *self.state.write().await = SchedulerState::Idle;

        match outcome {
            Ok(Ok(report)) => Ok(Some(report)),
            Ok(Err(e)) => {
                error!("Failed to list accounts: {}", e);
                self.runner.telemetry().record_cycle_failure();
                Err(e)
            }
            Err(join_error) => {
                if join_error.is_panic() {
                    error!("Fetch cycle panicked: {}", join_error);
                } else {
                    error!("Fetch cycle was cancelled: {}", join_error);
                }
                self.runner.telemetry().record_cycle_failure();
                Ok(None)
            }
        }
    }
}

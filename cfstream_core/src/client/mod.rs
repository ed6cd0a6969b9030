pub mod cloudflare;
pub mod graphql;

use crate::{account::Account, error::Result, window::AnalyticsWindow, window::Sample};
use async_trait::async_trait;
use std::sync::Arc;

pub use cloudflare::{CloudflareClient, CloudflareClientConfig};

/// Provider seam used by the scheduler to enumerate accounts and pull analytics.
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    /// List every account visible to the configured credential, in provider order.
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Fetch the time-bucketed samples for one account inside `window`.
    async fn fetch_window(&self, account_id: &str, window: &AnalyticsWindow)
        -> Result<Vec<Sample>>;
}

pub type DynAnalyticsApi = Arc<dyn AnalyticsApi>;

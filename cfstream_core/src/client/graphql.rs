//! Wire types for the Cloudflare GraphQL analytics API.

use crate::window::{AnalyticsWindow, Sample};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const STREAM_MINUTES_VIEWED_QUERY: &str = r#"
query ($accountID: String!, $mintime: Time!, $maxtime: Time!) {
  viewer {
    accounts(filter: {accountTag: $accountID}) {
      streamMinutesViewedAdaptiveGroups(limit: 1000, orderBy: [sum_minutesViewed_DESC], filter: {datetime_geq: $mintime, datetime_lt: $maxtime}) {
        sum {
          minutesViewed
        }
        dimensions {
          ts: datetimeFiveMinutes
        }
      }
    }
  }
}
"#;

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: StreamVariables,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamVariables {
    #[serde(rename = "accountID")]
    pub account_id: String,
    pub mintime: String,
    pub maxtime: String,
}

impl<'a> GraphQlRequest<'a> {
    pub fn stream_minutes_viewed(account_id: &str, window: &AnalyticsWindow) -> Self {
        Self {
            query: STREAM_MINUTES_VIEWED_QUERY,
            variables: StreamVariables {
                account_id: account_id.to_string(),
                mintime: window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                maxtime: window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }

    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .flatten()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamAnalyticsData {
    pub viewer: Viewer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Viewer {
    #[serde(default)]
    pub accounts: Vec<AccountAnalytics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountAnalytics {
    #[serde(rename = "streamMinutesViewedAdaptiveGroups", default)]
    pub minutes_viewed_groups: Vec<MinutesViewedGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinutesViewedGroup {
    pub sum: MinutesViewedSum,
    pub dimensions: BucketDimensions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinutesViewedSum {
    #[serde(rename = "minutesViewed")]
    pub minutes_viewed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketDimensions {
    pub ts: DateTime<Utc>,
}

impl StreamAnalyticsData {
    /// Flatten every account node's buckets into samples.
    pub fn into_samples(self) -> Vec<Sample> {
        self.viewer
            .accounts
            .into_iter()
            .flat_map(|account| account.minutes_viewed_groups)
            .map(|group| Sample::new(group.dimensions.ts, group.sum.minutes_viewed))
            .collect()
    }
}

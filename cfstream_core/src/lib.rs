pub mod account;
pub mod client;
pub mod error;
pub mod window;

pub use account::{Account, AccountFilter};
pub use client::{AnalyticsApi, CloudflareClient, CloudflareClientConfig, DynAnalyticsApi};
pub use error::{ExporterError, Result};
pub use window::{AnalyticsWindow, Sample};

// Re-export commonly used types
pub use async_trait::async_trait;

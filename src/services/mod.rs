//! Background services

use anyhow::Result;

pub mod autosave;

pub use autosave::AttendanceSaver;

/// Trait for background services
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// Start the service
    async fn start(&self) -> Result<()>;

    /// Stop the service gracefully
    async fn stop(&self) -> Result<()>;

    /// Check if the service is running
    fn is_running(&self) -> bool;

    /// Get service name for logging
    fn name(&self) -> &'static str;
}

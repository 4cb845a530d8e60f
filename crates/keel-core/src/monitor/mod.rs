//! Observer surface: service lifecycle monitors, kernel monitors and the
//! broadcaster that fans events out to them.

pub mod broadcaster;
pub mod error;
pub mod event;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

use crate::service::BoxError;

pub use broadcaster::MonitorBroadcaster;
pub use error::MonitorError;
pub use event::{ServiceEvent, ServiceEventKind};

/// Identifier returned from monitor subscription, used for removal.
pub type MonitorId = u64;

/// Result of one monitor callback. An `Err` is caught at the dispatch
/// boundary, reported through [`KernelMonitor::service_notification_error`],
/// and never aborts the kernel operation or the remaining notifications.
pub type MonitorResult = Result<(), BoxError>;

/// Observer of service lifecycle transitions.
///
/// Every method has a no-op default, so implementors override only the
/// notifications they care about. Callbacks must not synchronously drive
/// lifecycle operations for the service they are being notified about.
#[async_trait]
pub trait ServiceMonitor: Send + Sync {
    async fn service_registered(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_starting(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_waiting_to_start(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_running(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_start_error(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_stopping(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_waiting_to_stop(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_stopped(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_stop_error(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }

    async fn service_unregistered(&self, event: &ServiceEvent) -> MonitorResult {
        let _ = event;
        Ok(())
    }
}

/// Observer of monitor-dispatch failures.
#[async_trait]
pub trait KernelMonitor: Send + Sync {
    async fn service_notification_error(&self, error: &MonitorError);
}

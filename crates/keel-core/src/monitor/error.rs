//! # Keel Monitor Dispatch Errors
//!
//! A [`MonitorError`] records the failure of one monitor callback. It is
//! reported to [`KernelMonitor`](crate::monitor::KernelMonitor) subscribers
//! and never propagated back into the kernel operation that fired the event.
use thiserror::Error;

use crate::service::{BoxError, ServiceName};

#[derive(Debug, Error)]
#[error("Monitor callback '{event}' failed for service '{service_name}': {source}")]
pub struct MonitorError {
    /// Service the notification was about.
    pub service_name: ServiceName,
    /// Dotted event name, e.g. `service.running`.
    pub event: &'static str,
    #[source]
    pub source: BoxError,
}

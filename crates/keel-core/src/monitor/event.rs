use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::service::{Service, ServiceName};

/// The lifecycle and structural transitions reported to monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    Registered,
    Starting,
    WaitingToStart,
    Running,
    StartError,
    Stopping,
    WaitingToStop,
    Stopped,
    StopError,
    Unregistered,
}

impl ServiceEventKind {
    /// Dotted event name, stable across releases.
    pub fn name(self) -> &'static str {
        match self {
            ServiceEventKind::Registered => "service.registered",
            ServiceEventKind::Starting => "service.starting",
            ServiceEventKind::WaitingToStart => "service.waiting-to-start",
            ServiceEventKind::Running => "service.running",
            ServiceEventKind::StartError => "service.start-error",
            ServiceEventKind::Stopping => "service.stopping",
            ServiceEventKind::WaitingToStop => "service.waiting-to-stop",
            ServiceEventKind::Stopped => "service.stopped",
            ServiceEventKind::StopError => "service.stop-error",
            ServiceEventKind::Unregistered => "service.unregistered",
        }
    }
}

impl fmt::Display for ServiceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable snapshot passed to monitors, created fresh for each
/// notification and never retained by the engine after dispatch.
#[derive(Clone)]
pub struct ServiceEvent {
    pub kind: ServiceEventKind,
    pub service_name: ServiceName,
    /// The live instance, present for `Running` notifications.
    pub service: Option<Service>,
    /// Descriptions of the conditions still blocking the transition.
    pub unsatisfied_conditions: Vec<String>,
    /// Underlying cause for the error kinds.
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl ServiceEvent {
    pub fn new(kind: ServiceEventKind, service_name: ServiceName) -> Self {
        Self {
            kind,
            service_name,
            service: None,
            unsatisfied_conditions: Vec::new(),
            cause: None,
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_unsatisfied(mut self, unsatisfied_conditions: Vec<String>) -> Self {
        self.unsatisfied_conditions = unsatisfied_conditions;
        self
    }

    pub fn with_cause(mut self, cause: Arc<dyn StdError + Send + Sync>) -> Self {
        self.cause = Some(cause);
        self
    }
}

// Manual Debug: the service instance is an opaque Any.
impl fmt::Debug for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEvent")
            .field("kind", &self.kind)
            .field("service_name", &self.service_name)
            .field("has_service", &self.service.is_some())
            .field("unsatisfied_conditions", &self.unsatisfied_conditions)
            .field("cause", &self.cause)
            .finish()
    }
}

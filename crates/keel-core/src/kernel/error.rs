//! # Keel Kernel Errors
//!
//! Defines [`KernelError`], the error surface of every kernel operation.
//!
//! The taxonomy follows the kernel's failure policy: structural misuse
//! (duplicate or unknown names) and factory failures are loud, while
//! unsatisfied conditions are a recoverable "still waiting" report rather
//! than a failure, and a forced stop that overrode conditions is an audit
//! record of a stop that nonetheless completed.
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::invoke::InvokeError;
use crate::service::{ServiceName, ServiceNameError, ServiceState, ServiceStateError};

#[derive(Debug, Error)]
pub enum KernelError {
    /// A service is already registered under this name.
    #[error("Service already registered: {0}")]
    ServiceAlreadyExists(ServiceName),

    /// No service is registered under this name.
    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceName),

    /// A registration or lifecycle operation failed; the entry is left in a
    /// consistent state (a failed start lands back in STOPPED).
    #[error("Service '{name}' failed during {operation}: {cause}")]
    Registration {
        name: ServiceName,
        operation: &'static str,
        // Shared with the monitor event for the same failure, hence Arc.
        cause: Arc<dyn StdError + Send + Sync>,
    },

    /// The requested transition is not legal from the current state.
    #[error("Service '{name}' is {from}, cannot {attempted}")]
    IllegalTransition {
        name: ServiceName,
        from: ServiceState,
        attempted: &'static str,
    },

    /// The transition is recorded but still waiting on the listed
    /// conditions; it completes when they signal satisfaction. Not a failure.
    #[error("Service '{name}' is {state}, waiting on conditions: {}", unsatisfied.join(", "))]
    UnsatisfiedConditions {
        name: ServiceName,
        state: ServiceState,
        unsatisfied: Vec<String>,
    },

    /// A forced stop completed despite the listed unsatisfied conditions.
    /// Informational: by the time this is returned the service is STOPPED.
    #[error("Service '{name}' was forcibly stopped, ignored conditions: {}", ignored.join(", "))]
    ForcedStop {
        name: ServiceName,
        ignored: Vec<String>,
    },

    /// The declared ownership relation contains a cycle.
    #[error("Cyclic service ownership: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    CyclicOwnership(Vec<ServiceName>),

    /// The kernel has been destroyed (or is being destroyed).
    #[error("Kernel has been destroyed")]
    KernelDestroyed,

    #[error("Invalid service name: {0}")]
    InvalidServiceName(#[from] ServiceNameError),

    #[error("Invalid service state: {0}")]
    InvalidServiceState(#[from] ServiceStateError),

    /// A typed operation invocation failed.
    #[error("Invocation on service '{name}' failed: {source}")]
    Invoke {
        name: ServiceName,
        #[source]
        source: InvokeError,
    },
}

/// Shorthand for Result with the kernel error type.
pub type Result<T> = std::result::Result<T, KernelError>;

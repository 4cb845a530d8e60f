//! # Keel Invocation Errors
//!
//! Errors raised while dispatching a typed operation against a running
//! service through a [`DispatchTable`](crate::invoke::DispatchTable).
use thiserror::Error;

use crate::service::ServiceState;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("No operation registered for signature '{signature}'")]
    OperationNotFound { signature: String },

    #[error("Service is {state}, operations can only be invoked on a RUNNING service")]
    ServiceNotRunning { state: ServiceState },

    #[error("Operation expected a service instance of type '{expected}'")]
    WrongService { expected: &'static str },

    #[error("Bad arguments: {reason}")]
    BadArguments { reason: String },

    #[error("Operation failed: {source}")]
    Failed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

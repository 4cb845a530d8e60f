//! # Keel Core
//!
//! A service lifecycle kernel: register named services backed by
//! [`ServiceFactory`](service::ServiceFactory) implementations, drive each one
//! through the `STOPPED -> STARTING -> RUNNING -> STOPPING -> STOPPED` state
//! machine with condition-gated transitions, and observe every transition
//! through [`ServiceMonitor`](monitor::ServiceMonitor) subscriptions.
//!
//! The [`Kernel`](kernel::Kernel) is the single public entry point. Everything
//! else in this crate is either a value type exchanged with the kernel
//! (`service`), an observer surface (`monitor`), or the typed operation
//! dispatch layer (`invoke`).

pub mod invoke;
pub mod kernel;
pub mod monitor;
pub mod service;

pub use kernel::error::{KernelError, Result};
pub use kernel::Kernel;
pub use monitor::{KernelMonitor, ServiceEvent, ServiceEventKind, ServiceMonitor};
pub use service::{
    Service, ServiceCondition, ServiceContext, ServiceFactory, ServiceName, ServiceState,
};

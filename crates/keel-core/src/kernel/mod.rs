//! # Keel Kernel
//!
//! The lifecycle kernel: the authoritative registry of named services and
//! the state machine that drives each one between STOPPED, STARTING,
//! RUNNING and STOPPING.
//!
//! ## Key responsibilities & components:
//!
//! - **Registry**: one [`ServiceEntry`](registry) per registered name,
//!   created on register and removed (only from STOPPED) on unregister.
//! - **Lifecycle engine**: condition-gated start/stop transitions with
//!   forced-stop override, in the `lifecycle` submodule.
//! - **Ownership**: explicit graph walk over declared owned services for
//!   recursive start/stop and teardown ordering, in `ownership`.
//! - **Error handling**: [`KernelError`](error::KernelError) and the kernel
//!   [`Result`](error::Result) alias in `error`.

pub mod core;
pub mod error;
pub(crate) mod lifecycle;
pub(crate) mod ownership;
pub mod registry;

pub use self::core::Kernel;
pub use error::{KernelError, Result};
pub use registry::ServiceSummary;

#[cfg(test)]
mod tests;

//! Service value types: names, states, conditions, factories and the
//! context handed to factories during creation and destruction.

pub mod condition;
pub mod context;
pub mod error;
pub mod factory;
pub mod name;
pub mod state;

pub use condition::{
    ConditionContext, ConditionSignal, OwnedServiceCondition, ServiceCondition, SignalCondition,
};
pub use context::ServiceContext;
pub use error::{ServiceNameError, ServiceStateError};
pub use factory::{BoxError, Service, ServiceFactory, StaticServiceFactory};
pub use name::ServiceName;
pub use state::ServiceState;

#[cfg(test)]
mod tests;

//! Typed operation dispatch for running services.
//!
//! Instead of generating proxies at runtime, every service factory may
//! publish a [`DispatchTable`]: a map from a stable [`Signature`] (operation
//! name plus ordered parameter type descriptors) to an [`OperationInvoker`].
//! The kernel resolves `invoke` calls against the table of the live service
//! located in the registry, so dispatch is an ordinary hash lookup checked at
//! registration time rather than reflection.

pub mod error;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::service::Service;

pub use error::InvokeError;

/// Arguments handed to an operation invoker, in declaration order.
pub type InvokeArgs = Vec<Box<dyn Any + Send>>;

/// Value returned from an operation invoker.
pub type InvokeReturn = Box<dyn Any + Send>;

/// Stable key identifying one operation: a name plus the ordered parameter
/// type descriptors, e.g. `echo(String)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    params: Vec<String>,
}

impl Signature {
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// A signature with no parameters.
    pub fn nullary(name: impl Into<String>) -> Self {
        Self::new(name, Vec::<String>::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(","))
    }
}

/// One callable operation bound to a service instance.
#[async_trait]
pub trait OperationInvoker: Send + Sync {
    async fn invoke(&self, service: &Service, args: InvokeArgs) -> Result<InvokeReturn, InvokeError>;
}

/// Invoker built from a plain function over a concrete service type.
///
/// The instance is downcast to `T` before the function runs; a mismatch is
/// reported as [`InvokeError::WrongService`] instead of panicking.
pub struct FnOperation<T, F> {
    function: F,
    _service: PhantomData<fn(&T)>,
}

impl<T, F> FnOperation<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&T, InvokeArgs) -> Result<InvokeReturn, InvokeError> + Send + Sync,
{
    pub fn new(function: F) -> Self {
        Self {
            function,
            _service: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> OperationInvoker for FnOperation<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&T, InvokeArgs) -> Result<InvokeReturn, InvokeError> + Send + Sync,
{
    async fn invoke(&self, service: &Service, args: InvokeArgs) -> Result<InvokeReturn, InvokeError> {
        let concrete = service
            .downcast_ref::<T>()
            .ok_or(InvokeError::WrongService {
                expected: std::any::type_name::<T>(),
            })?;
        (self.function)(concrete, args)
    }
}

/// Map from operation signatures to invokers for one service.
///
/// Built from [`ServiceFactory::operations`](crate::service::ServiceFactory::operations)
/// when the service starts and frozen while it is running.
#[derive(Clone, Default)]
pub struct DispatchTable {
    operations: HashMap<Signature, Arc<dyn OperationInvoker>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, signature: Signature, invoker: Arc<dyn OperationInvoker>) {
        self.operations.insert(signature, invoker);
    }

    /// Builder-style variant of [`DispatchTable::insert`].
    pub fn with_operation(
        mut self,
        signature: Signature,
        invoker: Arc<dyn OperationInvoker>,
    ) -> Self {
        self.insert(signature, invoker);
        self
    }

    pub fn get(&self, signature: &Signature) -> Option<Arc<dyn OperationInvoker>> {
        self.operations.get(signature).cloned()
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.operations.keys()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests;

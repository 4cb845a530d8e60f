use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::invoke::DispatchTable;
use crate::service::condition::ServiceCondition;
use crate::service::context::ServiceContext;
use crate::service::ServiceName;

/// A live service instance as held by the registry.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Boxed error returned from factory callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Creator/destroyer of one service instance, supplied at registration time
/// and owned by the registry entry until unregistration.
///
/// `create_service` runs with the entry's transition lock held, which is what
/// guarantees a single instantiation even under concurrent start requests.
/// Consequently a factory must not call lifecycle operations for its own
/// service name from inside `create_service` or `destroy_service`; operating
/// on other services is fine.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    /// Whether the service may be started again after it has stopped once.
    fn restartable(&self) -> bool {
        true
    }

    /// Type tags advertised for this service, surfaced in registry snapshots.
    fn service_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Services whose teardown is tied to this one: the owner cannot finish
    /// stopping until every owned service has stopped.
    fn owned_services(&self) -> Vec<ServiceName> {
        Vec::new()
    }

    /// Conditions that must be satisfied before a start completes.
    fn start_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        Vec::new()
    }

    /// Conditions that must be satisfied before a stop completes.
    fn stop_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        Vec::new()
    }

    /// Typed operations callable on the running service via
    /// [`Kernel::invoke`](crate::kernel::Kernel::invoke).
    fn operations(&self) -> DispatchTable {
        DispatchTable::new()
    }

    async fn create_service(&self, context: &ServiceContext) -> Result<Service, BoxError>;

    async fn destroy_service(&self, context: &ServiceContext, service: Service) -> Result<(), BoxError> {
        let _ = (context, service);
        Ok(())
    }
}

/// Factory over a pre-built instance, with builder methods for conditions,
/// owned services and operations. Handy for tests and for wiring static
/// object graphs into the kernel.
pub struct StaticServiceFactory {
    instance: Service,
    restartable: bool,
    types: Vec<String>,
    owned: Vec<ServiceName>,
    start_conditions: Vec<Arc<dyn ServiceCondition>>,
    stop_conditions: Vec<Arc<dyn ServiceCondition>>,
    operations: DispatchTable,
}

impl StaticServiceFactory {
    pub fn new<T: Send + Sync + 'static>(instance: T) -> Self {
        Self {
            instance: Arc::new(instance),
            restartable: true,
            types: Vec::new(),
            owned: Vec::new(),
            start_conditions: Vec::new(),
            stop_conditions: Vec::new(),
            operations: DispatchTable::new(),
        }
    }

    pub fn restartable(mut self, restartable: bool) -> Self {
        self.restartable = restartable;
        self
    }

    pub fn with_type(mut self, type_tag: impl Into<String>) -> Self {
        self.types.push(type_tag.into());
        self
    }

    pub fn with_owned_service(mut self, owned: ServiceName) -> Self {
        self.owned.push(owned);
        self
    }

    pub fn with_start_condition(mut self, condition: Arc<dyn ServiceCondition>) -> Self {
        self.start_conditions.push(condition);
        self
    }

    pub fn with_stop_condition(mut self, condition: Arc<dyn ServiceCondition>) -> Self {
        self.stop_conditions.push(condition);
        self
    }

    pub fn with_operations(mut self, operations: DispatchTable) -> Self {
        self.operations = operations;
        self
    }
}

#[async_trait]
impl ServiceFactory for StaticServiceFactory {
    fn restartable(&self) -> bool {
        self.restartable
    }

    fn service_types(&self) -> Vec<String> {
        self.types.clone()
    }

    fn owned_services(&self) -> Vec<ServiceName> {
        self.owned.clone()
    }

    fn start_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        self.start_conditions.clone()
    }

    fn stop_conditions(&self) -> Vec<Arc<dyn ServiceCondition>> {
        self.stop_conditions.clone()
    }

    fn operations(&self) -> DispatchTable {
        self.operations.clone()
    }

    async fn create_service(&self, _context: &ServiceContext) -> Result<Service, BoxError> {
        Ok(self.instance.clone())
    }
}

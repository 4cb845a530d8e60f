use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::SystemTime;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use crate::invoke::{InvokeArgs, InvokeError, InvokeReturn, Signature};
use crate::kernel::error::{KernelError, Result};
use crate::kernel::lifecycle::StopMode;
use crate::kernel::ownership::OwnershipGraph;
use crate::kernel::registry::{ServiceRegistry, ServiceSummary};
use crate::monitor::{
    KernelMonitor, MonitorBroadcaster, MonitorId, ServiceEvent, ServiceEventKind, ServiceMonitor,
};
use crate::service::{
    ConditionContext, ConditionSignal, OwnedServiceCondition, Service, ServiceCondition,
    ServiceContext, ServiceFactory, ServiceName, ServiceState,
};

pub(crate) struct KernelShared {
    pub(crate) registry: ServiceRegistry,
    pub(crate) monitors: MonitorBroadcaster,
    /// Owned service name -> (owner, gate) pairs for owners currently
    /// waiting on that owned service to stop.
    pub(crate) owned_watch: StdMutex<HashMap<ServiceName, Vec<(ServiceName, OwnedServiceCondition)>>>,
    pub(crate) wake: UnboundedSender<ServiceName>,
    closing: AtomicBool,
    destroyed: watch::Sender<bool>,
}

/// The service lifecycle kernel.
///
/// A `Kernel` is a cheap-clone handle over shared internals: the service
/// registry, the monitor broadcaster and the wake channel driving deferred
/// condition-gated transitions. Concurrent operations on different service
/// names proceed independently; operations on the same name serialize on the
/// entry's transition lock.
#[derive(Clone)]
pub struct Kernel {
    pub(crate) shared: Arc<KernelShared>,
}

impl Kernel {
    /// Create a kernel and spawn its lifecycle driver task. Must be called
    /// from within a tokio runtime.
    pub fn new() -> Self {
        let (wake, wake_rx) = mpsc::unbounded_channel();
        let (destroyed, _) = watch::channel(false);
        let shared = Arc::new(KernelShared {
            registry: ServiceRegistry::new(),
            monitors: MonitorBroadcaster::new(),
            owned_watch: StdMutex::new(HashMap::new()),
            wake,
            closing: AtomicBool::new(false),
            destroyed,
        });
        tokio::spawn(drive(Arc::downgrade(&shared), wake_rx));
        Self { shared }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(KernelError::KernelDestroyed);
        }
        Ok(())
    }

    // ----- registration -----

    /// Register a factory under a name; the entry starts out STOPPED.
    pub async fn register_service(
        &self,
        name: &ServiceName,
        factory: Box<dyn ServiceFactory>,
    ) -> Result<()> {
        self.ensure_open()?;
        let entry = self
            .shared
            .registry
            .register(name.clone(), Arc::from(factory))
            .await?;
        log::debug!("Registered service '{}'", entry.name());
        self.fire(ServiceEvent::new(ServiceEventKind::Registered, name.clone()))
            .await;
        Ok(())
    }

    /// Remove a service; only legal once it is STOPPED.
    pub async fn unregister_service(&self, name: &ServiceName) -> Result<()> {
        self.ensure_open()?;
        self.shared.registry.remove_stopped(name).await?;
        log::debug!("Unregistered service '{}'", name);
        self.fire(ServiceEvent::new(
            ServiceEventKind::Unregistered,
            name.clone(),
        ))
        .await;
        Ok(())
    }

    // ----- lifecycle -----

    /// Start one service. Completes synchronously when every start condition
    /// is satisfied immediately; otherwise records the pending start, leaves
    /// the service STARTING and returns
    /// [`KernelError::UnsatisfiedConditions`]; the transition finishes later
    /// when a condition signals.
    pub async fn start_service(&self, name: &ServiceName) -> Result<()> {
        self.ensure_open()?;
        let entry = self.shared.registry.get(name).await?;
        self.start_entry(&entry).await
    }

    /// Start a service and everything it transitively owns, owners first.
    /// Unregistered owned services are skipped with a warning; waiting
    /// services are not treated as failures.
    pub async fn start_service_recursive(&self, name: &ServiceName) -> Result<()> {
        self.ensure_open()?;
        // Resolve the root first so unknown names fail loudly.
        self.shared.registry.get(name).await?;
        let order = self.ownership_graph().await.start_order(name)?;
        for next in &order {
            if !self.shared.registry.contains(next).await {
                log::warn!(
                    "Owned service '{}' is not registered, skipping during recursive start",
                    next
                );
                continue;
            }
            let entry = self.shared.registry.get(next).await?;
            match self.start_entry(&entry).await {
                Ok(()) => {}
                Err(KernelError::UnsatisfiedConditions { .. }) => {
                    log::debug!("Service '{}' is waiting to start", next);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    /// Stop one service. If stop conditions are unsatisfied the service
    /// stays STOPPING and [`KernelError::UnsatisfiedConditions`] reports the
    /// blocking set; the stop completes when the conditions signal.
    pub async fn stop_service(&self, name: &ServiceName) -> Result<()> {
        self.ensure_open()?;
        let entry = self.shared.registry.get(name).await?;
        self.stop_entry(&entry, StopMode::Normal).await
    }

    /// Stop a service regardless of unsatisfied stop conditions. The
    /// teardown always completes; if conditions were overridden the call
    /// returns [`KernelError::ForcedStop`] carrying the ignored set for
    /// audit.
    pub async fn stop_service_forced(&self, name: &ServiceName) -> Result<()> {
        self.ensure_open()?;
        let entry = self.shared.registry.get(name).await?;
        self.stop_entry(&entry, StopMode::Forced).await
    }

    /// Stop a service and everything it transitively owns, owned services
    /// first so the owner's owned-service gates are satisfied naturally.
    pub async fn stop_service_recursive(&self, name: &ServiceName) -> Result<()> {
        self.ensure_open()?;
        self.shared.registry.get(name).await?;
        let order = self.ownership_graph().await.stop_order(name)?;
        let mut root_waiting = None;
        for next in &order {
            if !self.shared.registry.contains(next).await {
                continue;
            }
            let entry = self.shared.registry.get(next).await?;
            match self.stop_entry(&entry, StopMode::Normal).await {
                Ok(()) => {}
                Err(error @ KernelError::UnsatisfiedConditions { .. }) => {
                    if next == name {
                        root_waiting = Some(error);
                    }
                }
                Err(error) => return Err(error),
            }
        }
        match root_waiting {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // ----- queries -----

    pub async fn service_state(&self, name: &ServiceName) -> Result<ServiceState> {
        Ok(self.shared.registry.get(name).await?.state())
    }

    /// Wall-clock time of the last completed start, if any.
    pub async fn service_start_time(&self, name: &ServiceName) -> Result<Option<SystemTime>> {
        Ok(self.shared.registry.get(name).await?.started_at())
    }

    /// Registered names matching a glob pattern (`*`, `?`), sorted.
    pub async fn list_service_names(&self, pattern: &str) -> Vec<ServiceName> {
        self.shared.registry.list_names(pattern).await
    }

    /// Live instances of RUNNING services whose name matches the pattern.
    pub async fn list_services(&self, pattern: &str) -> Vec<Service> {
        let mut services = Vec::new();
        for entry in self.shared.registry.matching_entries(pattern).await {
            if entry.state().is_running() {
                let inner = entry.inner.lock().await;
                if let Some(service) = inner.service.clone() {
                    services.push(service);
                }
            }
        }
        services
    }

    /// The live instance, or `Ok(None)` while the service is not RUNNING.
    pub async fn get_service(&self, name: &ServiceName) -> Result<Option<Service>> {
        let entry = self.shared.registry.get(name).await?;
        if !entry.state().is_running() {
            return Ok(None);
        }
        let inner = entry.inner.lock().await;
        Ok(inner.service.clone())
    }

    pub async fn get_service_factory(&self, name: &ServiceName) -> Result<Arc<dyn ServiceFactory>> {
        Ok(self.shared.registry.get(name).await?.factory().clone())
    }

    /// Serializable view of every registry entry, in registration order.
    pub async fn snapshot(&self) -> Vec<ServiceSummary> {
        self.shared
            .registry
            .all_entries()
            .await
            .into_iter()
            .map(|entry| {
                let state = entry.state();
                ServiceSummary {
                    name: entry.name().clone(),
                    state,
                    state_index: state.index(),
                    types: entry.factory().service_types(),
                }
            })
            .collect()
    }

    /// Number of registered services.
    pub async fn service_count(&self) -> usize {
        self.shared.registry.len().await
    }

    // ----- conditions -----

    /// Attach an extra start condition; takes effect at the next evaluation
    /// of a pending or future start.
    pub async fn add_start_condition(
        &self,
        name: &ServiceName,
        condition: Arc<dyn ServiceCondition>,
    ) -> Result<()> {
        self.ensure_open()?;
        let entry = self.shared.registry.get(name).await?;
        let mut inner = entry.inner.lock().await;
        if entry.state() == ServiceState::Starting {
            condition.initialize(&self.condition_context(name)).await;
        }
        inner.start_conditions.push(condition);
        Ok(())
    }

    /// Attach an extra stop condition; takes effect at the next evaluation
    /// of a pending or future stop.
    pub async fn add_stop_condition(
        &self,
        name: &ServiceName,
        condition: Arc<dyn ServiceCondition>,
    ) -> Result<()> {
        self.ensure_open()?;
        let entry = self.shared.registry.get(name).await?;
        let mut inner = entry.inner.lock().await;
        if entry.state() == ServiceState::Stopping {
            condition.initialize(&self.condition_context(name)).await;
        }
        inner.stop_conditions.push(condition);
        Ok(())
    }

    // ----- invocation -----

    /// Invoke a typed operation on a RUNNING service.
    pub async fn invoke(
        &self,
        name: &ServiceName,
        signature: &Signature,
        args: InvokeArgs,
    ) -> Result<InvokeReturn> {
        let entry = self.shared.registry.get(name).await?;
        let state = entry.state();
        if !state.is_running() {
            return Err(KernelError::Invoke {
                name: name.clone(),
                source: InvokeError::ServiceNotRunning { state },
            });
        }
        let (invoker, service) = {
            let inner = entry.inner.lock().await;
            let invoker =
                inner
                    .operations
                    .get(signature)
                    .ok_or_else(|| KernelError::Invoke {
                        name: name.clone(),
                        source: InvokeError::OperationNotFound {
                            signature: signature.to_string(),
                        },
                    })?;
            let service = inner.service.clone().ok_or_else(|| KernelError::Invoke {
                name: name.clone(),
                source: InvokeError::ServiceNotRunning { state },
            })?;
            (invoker, service)
        };
        invoker
            .invoke(&service, args)
            .await
            .map_err(|source| KernelError::Invoke {
                name: name.clone(),
                source,
            })
    }

    // ----- monitors -----

    /// Subscribe a monitor to every service's lifecycle events.
    pub async fn add_service_monitor(&self, monitor: Arc<dyn ServiceMonitor>) -> MonitorId {
        self.shared.monitors.add_service_monitor(monitor, None).await
    }

    /// Subscribe a monitor to a single service's lifecycle events. The name
    /// does not have to be registered yet.
    pub async fn add_service_monitor_for(
        &self,
        monitor: Arc<dyn ServiceMonitor>,
        name: &ServiceName,
    ) -> MonitorId {
        self.shared
            .monitors
            .add_service_monitor(monitor, Some(name.clone()))
            .await
    }

    pub async fn remove_service_monitor(&self, id: MonitorId) -> bool {
        self.shared.monitors.remove_service_monitor(id).await
    }

    pub async fn add_kernel_monitor(&self, monitor: Arc<dyn KernelMonitor>) -> MonitorId {
        self.shared.monitors.add_kernel_monitor(monitor).await
    }

    pub async fn remove_kernel_monitor(&self, id: MonitorId) -> bool {
        self.shared.monitors.remove_kernel_monitor(id).await
    }

    // ----- teardown -----

    /// Tear down every registered service (forced, owned services before
    /// their owners), unregister them, and release the kernel. Idempotent;
    /// a concurrent call waits for the first one to finish.
    pub async fn destroy(&self) {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            self.wait_for_destruction().await;
            return;
        }
        log::info!("Destroying kernel, stopping all registered services");
        let entries = self.shared.registry.all_entries().await;
        let mut graph = OwnershipGraph::new();
        let mut roots = Vec::new();
        for entry in &entries {
            graph.add_owner(entry.name().clone(), entry.factory().owned_services());
            roots.push(entry.name().clone());
        }
        for name in graph.destroy_order(&roots) {
            let Ok(entry) = self.shared.registry.get(&name).await else {
                continue;
            };
            match self.stop_entry(&entry, StopMode::Forced).await {
                Ok(()) => {}
                Err(KernelError::ForcedStop { name, ignored }) => {
                    log::warn!(
                        "Service '{}' forcibly stopped during kernel destroy, ignored conditions: {}",
                        name,
                        ignored.join(", ")
                    );
                }
                Err(error) => {
                    log::error!("Service '{}' failed to stop during kernel destroy: {}", name, error);
                }
            }
            match self.shared.registry.remove_stopped(&name).await {
                Ok(_) => {
                    self.fire(ServiceEvent::new(ServiceEventKind::Unregistered, name.clone()))
                        .await;
                }
                Err(error) => {
                    log::error!("Service '{}' could not be unregistered during kernel destroy: {}", name, error);
                }
            }
        }
        self.shared.destroyed.send_replace(true);
        log::info!("Kernel destroyed");
    }

    /// Park the caller until [`Kernel::destroy`] has completed, from this or
    /// any other handle. Used by daemon mains.
    pub async fn wait_for_destruction(&self) {
        let mut destroyed = self.shared.destroyed.subscribe();
        while !*destroyed.borrow_and_update() {
            if destroyed.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_destroyed(&self) -> bool {
        *self.shared.destroyed.borrow()
    }

    // ----- internals shared with the lifecycle engine -----

    pub(crate) async fn fire(&self, event: ServiceEvent) {
        self.shared.monitors.notify(&event).await;
    }

    pub(crate) fn condition_context(&self, name: &ServiceName) -> ConditionContext {
        ConditionContext::new(
            name.clone(),
            ConditionSignal::new(name.clone(), self.shared.wake.clone()),
        )
    }

    pub(crate) async fn ownership_graph(&self) -> OwnershipGraph {
        let mut graph = OwnershipGraph::new();
        for entry in self.shared.registry.all_entries().await {
            graph.add_owner(entry.name().clone(), entry.factory().owned_services());
        }
        graph
    }

    pub(crate) fn service_context(&self, name: &ServiceName) -> ServiceContext {
        ServiceContext::new(self.clone(), name.clone())
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

/// Lifecycle driver: re-evaluates a service's pending transition whenever
/// one of its conditions signals a change. Exits when the kernel internals
/// are dropped or the channel closes.
async fn drive(shared: Weak<KernelShared>, mut wake: UnboundedReceiver<ServiceName>) {
    while let Some(name) = wake.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if shared.closing.load(Ordering::SeqCst) {
            // Destruction drives its own (forced) stops.
            continue;
        }
        let kernel = Kernel { shared };
        match kernel.reevaluate(&name).await {
            Ok(())
            | Err(KernelError::UnsatisfiedConditions { .. })
            | Err(KernelError::ServiceNotFound(_)) => {}
            Err(error) => {
                log::warn!("Deferred transition for service '{}' failed: {}", name, error);
            }
        }
    }
}

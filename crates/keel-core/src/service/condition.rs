use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::service::ServiceName;

/// Notification channel from a condition back to the lifecycle engine.
///
/// A condition receives a signal through its [`ConditionContext`] during
/// `initialize` and fires it whenever its satisfaction flips, which wakes the
/// kernel's lifecycle driver to re-evaluate the pending transition for the
/// service the condition is attached to.
#[derive(Clone)]
pub struct ConditionSignal {
    service_name: ServiceName,
    wake: UnboundedSender<ServiceName>,
}

impl ConditionSignal {
    pub(crate) fn new(service_name: ServiceName, wake: UnboundedSender<ServiceName>) -> Self {
        Self { service_name, wake }
    }

    /// Ask the lifecycle engine to re-evaluate the attached service's pending
    /// transition. Safe to call from any thread; a no-op once the kernel is
    /// gone.
    pub fn notify(&self) {
        let _ = self.wake.send(self.service_name.clone());
    }

    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }
}

impl fmt::Debug for ConditionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionSignal")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

/// Context handed to a condition when the lifecycle engine initializes it.
#[derive(Debug, Clone)]
pub struct ConditionContext {
    service_name: ServiceName,
    signal: ConditionSignal,
}

impl ConditionContext {
    pub(crate) fn new(service_name: ServiceName, signal: ConditionSignal) -> Self {
        Self {
            service_name,
            signal,
        }
    }

    /// The service whose transition this condition gates.
    pub fn service_name(&self) -> &ServiceName {
        &self.service_name
    }

    /// Clone the signal so the condition can flip satisfaction asynchronously.
    pub fn signal(&self) -> ConditionSignal {
        self.signal.clone()
    }
}

/// A gate that must be satisfied before a start or stop transition completes.
///
/// A condition moves through three phases: created, initialized (via
/// [`ServiceCondition::initialize`], which hands it the context/signal), and
/// satisfied. The engine re-checks `is_satisfied` on every evaluation attempt
/// and calls `destroy` once the transition completes or is abandoned, after
/// which the condition may be initialized again for a later transition.
#[async_trait]
pub trait ServiceCondition: Send + Sync + fmt::Debug {
    /// Human-readable description, used in unsatisfied-condition sets carried
    /// by events and errors.
    fn description(&self) -> String;

    async fn initialize(&self, context: &ConditionContext);

    async fn is_satisfied(&self) -> bool;

    async fn destroy(&self) {}
}

#[derive(Debug)]
struct SignalState {
    description: String,
    satisfied: AtomicBool,
    signal: Mutex<Option<ConditionSignal>>,
}

/// Externally satisfied condition: a shared, thread-safe handle whose
/// [`SignalCondition::satisfy`] call flips the gate and wakes the engine.
///
/// Clones share the same state, so one clone can be attached to a service
/// while another is held by whatever collaborator decides when to open the
/// gate.
#[derive(Debug, Clone)]
pub struct SignalCondition {
    state: Arc<SignalState>,
}

impl SignalCondition {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            state: Arc::new(SignalState {
                description: description.into(),
                satisfied: AtomicBool::new(false),
                signal: Mutex::new(None),
            }),
        }
    }

    /// A condition that is already satisfied, useful for simple ordering.
    pub fn satisfied(description: impl Into<String>) -> Self {
        let condition = Self::new(description);
        condition.state.satisfied.store(true, Ordering::SeqCst);
        condition
    }

    /// Open the gate and wake the lifecycle engine if the condition has been
    /// initialized against a pending transition.
    pub fn satisfy(&self) {
        self.state.satisfied.store(true, Ordering::SeqCst);
        let signal = self.state.signal.lock().expect("signal lock poisoned");
        if let Some(signal) = signal.as_ref() {
            signal.notify();
        }
    }

    pub fn is_satisfied_now(&self) -> bool {
        self.state.satisfied.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceCondition for SignalCondition {
    fn description(&self) -> String {
        self.state.description.clone()
    }

    async fn initialize(&self, context: &ConditionContext) {
        let mut signal = self.state.signal.lock().expect("signal lock poisoned");
        *signal = Some(context.signal());
    }

    async fn is_satisfied(&self) -> bool {
        self.is_satisfied_now()
    }

    async fn destroy(&self) {
        let mut signal = self.state.signal.lock().expect("signal lock poisoned");
        *signal = None;
    }
}

/// Stop condition gating an owner on one of its owned services.
///
/// The lifecycle engine attaches one of these per owned service when the
/// owner begins stopping, satisfies it when the owned service reaches
/// STOPPED, and force-satisfies the whole set when the owner is forcibly
/// stopped or the kernel is destroyed.
#[derive(Debug, Clone)]
pub struct OwnedServiceCondition {
    owned: ServiceName,
    gate: SignalCondition,
}

impl OwnedServiceCondition {
    pub fn new(owned: ServiceName) -> Self {
        let gate = SignalCondition::new(format!("owned service '{}' stopped", owned));
        Self { owned, gate }
    }

    /// The owned service this condition waits on.
    pub fn owned_name(&self) -> &ServiceName {
        &self.owned
    }

    /// Mark the owned service as stopped.
    pub fn satisfy(&self) {
        self.gate.satisfy();
    }

    /// Override the gate regardless of the owned service's state.
    pub fn force_satisfy(&self) {
        self.gate.satisfy();
    }

    pub fn is_satisfied_now(&self) -> bool {
        self.gate.is_satisfied_now()
    }
}

#[async_trait]
impl ServiceCondition for OwnedServiceCondition {
    fn description(&self) -> String {
        self.gate.description()
    }

    async fn initialize(&self, context: &ConditionContext) {
        self.gate.initialize(context).await;
    }

    async fn is_satisfied(&self) -> bool {
        self.gate.is_satisfied().await
    }

    async fn destroy(&self) {
        self.gate.destroy().await;
    }
}

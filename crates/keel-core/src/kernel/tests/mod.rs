
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::kernel::Kernel;
use crate::monitor::{MonitorResult, ServiceEvent, ServiceMonitor};
use crate::service::{
    BoxError, Service, ServiceCondition, ServiceContext, ServiceFactory, ServiceName, ServiceState,
};

fn name(domain: &str) -> ServiceName {
    ServiceName::new(domain).unwrap()
}

/// Poll until the service reaches `expected`; deferred transitions complete
/// on the kernel's driver task, not on the caller.
async fn wait_for_state(kernel: &Kernel, name: &ServiceName, expected: ServiceState) {
    for _ in 0..200 {
        if kernel.service_state(name).await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "service '{}' never reached {}, still {}",
        name,
        expected,
        kernel.service_state(name).await.unwrap()
    );
}

/// Factory counting its create/destroy calls, optionally failing creation.
struct CountingFactory {
    created: Arc<AtomicU32>,
    destroyed: Arc<AtomicU32>,
    restartable: bool,
    fail_create: bool,
    create_delay: Option<Duration>,
    owned: Vec<ServiceName>,
    start_conditions: Vec<Arc<dyn ServiceCondition>>,
    stop_conditions: Vec<Arc<dyn ServiceCondition>>,
}

impl CountingFactory {
    fn new() -> Self {
        Self {
            created: Arc::new(AtomicU32::new(0)),
            destroyed: Arc::new(AtomicU32::new(0)),
            restartable: true,
            fail_create: false,
            create_delay: None,
            owned: Vec::new(),
            start_conditions: Vec::new(),
            stop_conditions: Vec::new(),
        }
    }

    fn counters(&self) -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (self.created.clone(), self.destroyed.clone())
    }

    fn restartable(mut self, restartable: bool) -> Self {
        self.restartable = restartable;
        self
    }

    fn failing(mut self) -> Self {
        self.fail_create = true;
        self
    }

    fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    fn with_owned(mut self, owned: ServiceName) -> Self {
        self.owned.push(owned);
        self
    }

    fn with_start_condition(mut self, condition: Arc<dyn ServiceCondition>) -> Self {
        self.start_conditions.push(condition);
        self
    }

    fn with_stop_condition(mut self, condition: Arc<dyn ServiceCondition>) -> Self {
        self.stop_conditions.push(condition);
        self
    }
}

#[async_trait]
impl ServiceFactory for CountingFactory {
    fn restartable(&self) -> bool {
        self.restartable
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

    async fn create_service(&self, _context: &ServiceContext) -> Result<Service, BoxError> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create {
            return Err("creation refused".into());
        }
        let count = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(count))
    }

    async fn destroy_service(
        &self,
        _context: &ServiceContext,
        _service: Service,
    ) -> Result<(), BoxError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records each event as `kind:name` in arrival order.
#[derive(Default)]
struct EventLog {
    entries: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, event: &ServiceEvent) -> MonitorResult {
        self.entries
            .lock()
            .unwrap()
            .push(format!("{}:{}", event.kind.name(), event.service_name));
        Ok(())
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

#[async_trait]
impl ServiceMonitor for EventLog {
    async fn service_registered(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_starting(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_waiting_to_start(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_running(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_start_error(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_stopping(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_waiting_to_stop(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_stopped(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_stop_error(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }

    async fn service_unregistered(&self, event: &ServiceEvent) -> MonitorResult {
        self.push(event)
    }
}

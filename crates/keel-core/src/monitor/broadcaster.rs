use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::monitor::error::MonitorError;
use crate::monitor::event::{ServiceEvent, ServiceEventKind};
use crate::monitor::{KernelMonitor, MonitorId, ServiceMonitor};
use crate::service::ServiceName;

struct BroadcasterState {
    next_id: MonitorId,
    global: Vec<(MonitorId, Arc<dyn ServiceMonitor>)>,
    scoped: HashMap<ServiceName, Vec<(MonitorId, Arc<dyn ServiceMonitor>)>>,
    kernel: Vec<(MonitorId, Arc<dyn KernelMonitor>)>,
}

/// Fan-out of service events to subscribed monitors.
///
/// Monitors are notified sequentially in subscription order, global
/// subscribers before per-service ones. A failing callback is wrapped in a
/// [`MonitorError`], handed to every kernel monitor, and never allowed to
/// skip the remaining monitors or abort the triggering kernel operation.
pub struct MonitorBroadcaster {
    state: Mutex<BroadcasterState>,
}

impl MonitorBroadcaster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BroadcasterState {
                next_id: 1,
                global: Vec::new(),
                scoped: HashMap::new(),
                kernel: Vec::new(),
            }),
        }
    }

    /// Subscribe a monitor, globally or scoped to a single service name.
    pub async fn add_service_monitor(
        &self,
        monitor: Arc<dyn ServiceMonitor>,
        scope: Option<ServiceName>,
    ) -> MonitorId {
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        match scope {
            Some(name) => state.scoped.entry(name).or_default().push((id, monitor)),
            None => state.global.push((id, monitor)),
        }
        id
    }

    pub async fn remove_service_monitor(&self, id: MonitorId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.global.len();
        state.global.retain(|(m_id, _)| *m_id != id);
        let mut found = state.global.len() < before;
        state.scoped.retain(|_, monitors| {
            let before = monitors.len();
            monitors.retain(|(m_id, _)| *m_id != id);
            if monitors.len() < before {
                found = true;
            }
            !monitors.is_empty()
        });
        found
    }

    pub async fn add_kernel_monitor(&self, monitor: Arc<dyn KernelMonitor>) -> MonitorId {
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        state.kernel.push((id, monitor));
        id
    }

    pub async fn remove_kernel_monitor(&self, id: MonitorId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.kernel.len();
        state.kernel.retain(|(m_id, _)| *m_id != id);
        state.kernel.len() < before
    }

    /// Deliver one event to every relevant monitor.
    pub async fn notify(&self, event: &ServiceEvent) {
        let monitors = {
            let state = self.state.lock().await;
            let mut monitors: Vec<Arc<dyn ServiceMonitor>> =
                state.global.iter().map(|(_, m)| m.clone()).collect();
            if let Some(scoped) = state.scoped.get(&event.service_name) {
                monitors.extend(scoped.iter().map(|(_, m)| m.clone()));
            }
            monitors
        };

        for monitor in monitors {
            if let Err(source) = dispatch_one(monitor.as_ref(), event).await {
                let error = MonitorError {
                    service_name: event.service_name.clone(),
                    event: event.kind.name(),
                    source,
                };
                log::warn!("{}", error);
                self.report(&error).await;
            }
        }
    }

    /// Hand a monitor-dispatch failure to every kernel monitor.
    async fn report(&self, error: &MonitorError) {
        let kernel_monitors: Vec<Arc<dyn KernelMonitor>> = {
            let state = self.state.lock().await;
            state.kernel.iter().map(|(_, m)| m.clone()).collect()
        };
        for monitor in kernel_monitors {
            monitor.service_notification_error(error).await;
        }
    }
}

impl Default for MonitorBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MonitorBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorBroadcaster").finish_non_exhaustive()
    }
}

async fn dispatch_one(
    monitor: &dyn ServiceMonitor,
    event: &ServiceEvent,
) -> crate::monitor::MonitorResult {
    match event.kind {
        ServiceEventKind::Registered => monitor.service_registered(event).await,
        ServiceEventKind::Starting => monitor.service_starting(event).await,
        ServiceEventKind::WaitingToStart => monitor.service_waiting_to_start(event).await,
        ServiceEventKind::Running => monitor.service_running(event).await,
        ServiceEventKind::StartError => monitor.service_start_error(event).await,
        ServiceEventKind::Stopping => monitor.service_stopping(event).await,
        ServiceEventKind::WaitingToStop => monitor.service_waiting_to_stop(event).await,
        ServiceEventKind::Stopped => monitor.service_stopped(event).await,
        ServiceEventKind::StopError => monitor.service_stop_error(event).await,
        ServiceEventKind::Unregistered => monitor.service_unregistered(event).await,
    }
}

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::monitor::{
    KernelMonitor, MonitorBroadcaster, MonitorError, MonitorResult, ServiceEvent, ServiceEventKind,
    ServiceMonitor,
};
use crate::service::ServiceName;

/// Appends every received event's dotted name to a shared log.
#[derive(Default)]
struct RecordingMonitor {
    seen: Mutex<Vec<String>>,
}

impl RecordingMonitor {
    fn record(&self, event: &ServiceEvent) -> MonitorResult {
        self.seen
            .lock()
            .unwrap()
            .push(format!("{}:{}", event.kind.name(), event.service_name));
        Ok(())
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceMonitor for RecordingMonitor {
    async fn service_registered(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_starting(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_waiting_to_start(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_running(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_start_error(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_stopping(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_waiting_to_stop(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_stopped(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_stop_error(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }

    async fn service_unregistered(&self, event: &ServiceEvent) -> MonitorResult {
        self.record(event)
    }
}

/// Fails every starting notification.
struct FailingMonitor;

#[async_trait]
impl ServiceMonitor for FailingMonitor {
    async fn service_starting(&self, _event: &ServiceEvent) -> MonitorResult {
        Err("monitor exploded".into())
    }
}

#[derive(Default)]
struct CountingKernelMonitor {
    errors: AtomicU32,
    last_event: Mutex<Option<&'static str>>,
}

#[async_trait]
impl KernelMonitor for CountingKernelMonitor {
    async fn service_notification_error(&self, error: &MonitorError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        *self.last_event.lock().unwrap() = Some(error.event);
    }
}

fn name(domain: &str) -> ServiceName {
    ServiceName::new(domain).unwrap()
}

#[tokio::test]
async fn global_monitors_receive_every_event() {
    let broadcaster = MonitorBroadcaster::new();
    let monitor = Arc::new(RecordingMonitor::default());
    broadcaster
        .add_service_monitor(monitor.clone(), None)
        .await;

    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Registered, name("a")))
        .await;
    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Starting, name("b")))
        .await;

    assert_eq!(
        monitor.seen(),
        vec!["service.registered:a", "service.starting:b"]
    );
}

#[tokio::test]
async fn scoped_monitors_only_see_their_service() {
    let broadcaster = MonitorBroadcaster::new();
    let monitor = Arc::new(RecordingMonitor::default());
    broadcaster
        .add_service_monitor(monitor.clone(), Some(name("a")))
        .await;

    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Running, name("a")))
        .await;
    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Running, name("b")))
        .await;

    assert_eq!(monitor.seen(), vec!["service.running:a"]);
}

#[tokio::test]
async fn removed_monitors_stop_receiving_events() {
    let broadcaster = MonitorBroadcaster::new();
    let monitor = Arc::new(RecordingMonitor::default());
    let id = broadcaster
        .add_service_monitor(monitor.clone(), None)
        .await;

    assert!(broadcaster.remove_service_monitor(id).await);
    assert!(!broadcaster.remove_service_monitor(id).await);

    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Running, name("a")))
        .await;
    assert!(monitor.seen().is_empty());
}

#[tokio::test]
async fn failing_monitor_does_not_block_later_monitors() {
    let broadcaster = MonitorBroadcaster::new();
    let recording = Arc::new(RecordingMonitor::default());
    broadcaster.add_service_monitor(Arc::new(FailingMonitor), None).await;
    broadcaster
        .add_service_monitor(recording.clone(), None)
        .await;

    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Starting, name("a")))
        .await;

    assert_eq!(recording.seen(), vec!["service.starting:a"]);
}

#[tokio::test]
async fn monitor_failures_are_reported_to_kernel_monitors() {
    let broadcaster = MonitorBroadcaster::new();
    let kernel_monitor = Arc::new(CountingKernelMonitor::default());
    broadcaster.add_service_monitor(Arc::new(FailingMonitor), None).await;
    broadcaster.add_kernel_monitor(kernel_monitor.clone()).await;

    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Starting, name("a")))
        .await;
    // Events the failing monitor ignores do not produce reports.
    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Running, name("a")))
        .await;

    assert_eq!(kernel_monitor.errors.load(Ordering::SeqCst), 1);
    assert_eq!(
        *kernel_monitor.last_event.lock().unwrap(),
        Some("service.starting")
    );
}

#[tokio::test]
async fn removed_kernel_monitors_stop_receiving_reports() {
    let broadcaster = MonitorBroadcaster::new();
    let kernel_monitor = Arc::new(CountingKernelMonitor::default());
    broadcaster.add_service_monitor(Arc::new(FailingMonitor), None).await;
    let id = broadcaster.add_kernel_monitor(kernel_monitor.clone()).await;
    assert!(broadcaster.remove_kernel_monitor(id).await);

    broadcaster
        .notify(&ServiceEvent::new(ServiceEventKind::Starting, name("a")))
        .await;
    assert_eq!(kernel_monitor.errors.load(Ordering::SeqCst), 0);
}

//! The state machine driving one service between states.
//!
//! All transition methods run under the entry's transition lock, which is
//! what serializes concurrent operations on the same name and guarantees a
//! single `create_service` call per start. Monitors are notified from inside
//! the lock, so a given service's events are always delivered in transition
//! order.

use std::error::Error as StdError;
use std::sync::Arc;

use crate::invoke::DispatchTable;
use crate::kernel::error::{KernelError, Result};
use crate::kernel::registry::{EntryInner, ServiceEntry};
use crate::kernel::Kernel;
use crate::monitor::{ServiceEvent, ServiceEventKind};
use crate::service::{OwnedServiceCondition, ServiceCondition, ServiceName, ServiceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopMode {
    /// Wait on unsatisfied stop conditions.
    Normal,
    /// Override unsatisfied stop conditions and record them for audit.
    Forced,
}

impl Kernel {
    pub(crate) async fn start_entry(&self, entry: &Arc<ServiceEntry>) -> Result<()> {
        let mut inner = entry.inner.lock().await;
        let name = entry.name().clone();
        match entry.state() {
            // Concurrent or repeated starts observe the settled result.
            ServiceState::Running => Ok(()),
            ServiceState::Stopping => Err(KernelError::IllegalTransition {
                name,
                from: ServiceState::Stopping,
                attempted: "start",
            }),
            // A start is already pending conditions; this attempt is a
            // fresh evaluation.
            ServiceState::Starting => self.try_complete_start(entry, &mut inner).await,
            ServiceState::Stopped => {
                if !entry.factory().restartable() && inner.start_count > 0 {
                    return Err(KernelError::Registration {
                        name,
                        operation: "start",
                        cause: message_error("service is not restartable"),
                    });
                }
                entry.set_state(ServiceState::Starting);
                log::debug!("Service '{}' starting", name);
                self.fire(ServiceEvent::new(ServiceEventKind::Starting, name.clone()))
                    .await;
                let context = self.condition_context(&name);
                for condition in &inner.start_conditions {
                    condition.initialize(&context).await;
                }
                self.try_complete_start(entry, &mut inner).await
            }
        }
    }

    /// Evaluate start conditions and, when all are satisfied, build the
    /// service and move it to RUNNING.
    async fn try_complete_start(
        &self,
        entry: &Arc<ServiceEntry>,
        inner: &mut EntryInner,
    ) -> Result<()> {
        let name = entry.name().clone();
        let unsatisfied = unsatisfied_descriptions(&inner.start_conditions).await;
        if !unsatisfied.is_empty() {
            self.fire(
                ServiceEvent::new(ServiceEventKind::WaitingToStart, name.clone())
                    .with_unsatisfied(unsatisfied.clone()),
            )
            .await;
            return Err(KernelError::UnsatisfiedConditions {
                name,
                state: ServiceState::Starting,
                unsatisfied,
            });
        }

        let context = self.service_context(&name);
        match entry.factory().create_service(&context).await {
            Ok(service) => {
                inner.service = Some(service.clone());
                inner.operations = entry.factory().operations();
                inner.start_count += 1;
                entry.mark_started_now();
                for condition in &inner.start_conditions {
                    condition.destroy().await;
                }
                entry.set_state(ServiceState::Running);
                log::info!("Service '{}' running", name);
                self.fire(
                    ServiceEvent::new(ServiceEventKind::Running, name).with_service(service),
                )
                .await;
                Ok(())
            }
            Err(source) => {
                let cause: Arc<dyn StdError + Send + Sync> = Arc::from(source);
                for condition in &inner.start_conditions {
                    condition.destroy().await;
                }
                entry.set_state(ServiceState::Stopped);
                log::warn!("Service '{}' failed to start: {}", name, cause);
                self.fire(
                    ServiceEvent::new(ServiceEventKind::StartError, name.clone())
                        .with_cause(cause.clone()),
                )
                .await;
                Err(KernelError::Registration {
                    name,
                    operation: "start",
                    cause,
                })
            }
        }
    }

    pub(crate) async fn stop_entry(&self, entry: &Arc<ServiceEntry>, mode: StopMode) -> Result<()> {
        let mut inner = entry.inner.lock().await;
        let name = entry.name().clone();
        match entry.state() {
            ServiceState::Stopped => Ok(()),
            // A stop is already pending conditions; re-evaluate (possibly
            // forcing past them this time).
            ServiceState::Stopping => self.try_complete_stop(entry, &mut inner, mode).await,
            state @ (ServiceState::Running | ServiceState::Starting) => {
                let aborting_start = state == ServiceState::Starting;
                entry.set_state(ServiceState::Stopping);
                log::debug!("Service '{}' stopping", name);
                self.fire(ServiceEvent::new(ServiceEventKind::Stopping, name.clone()))
                    .await;
                let context = self.condition_context(&name);
                if aborting_start {
                    // The pending start is cancelled; its conditions are
                    // abandoned and no instance was ever created.
                    for condition in &inner.start_conditions {
                        condition.destroy().await;
                    }
                }
                for condition in &inner.stop_conditions {
                    condition.initialize(&context).await;
                }
                if !aborting_start {
                    self.attach_owned_conditions(entry, &mut inner, &context)
                        .await;
                }
                self.try_complete_stop(entry, &mut inner, mode).await
            }
        }
    }

    /// Attach one owned-service gate per declared owned service that is
    /// registered and not already STOPPED.
    async fn attach_owned_conditions(
        &self,
        entry: &Arc<ServiceEntry>,
        inner: &mut EntryInner,
        context: &crate::service::ConditionContext,
    ) {
        for owned in entry.factory().owned_services() {
            let active = match self.shared.registry.get(&owned).await {
                Ok(owned_entry) => !owned_entry.state().is_stopped(),
                Err(_) => false,
            };
            if !active {
                continue;
            }
            let condition = OwnedServiceCondition::new(owned.clone());
            condition.initialize(context).await;
            self.watch_owned(entry.name(), condition.clone());
            // The owned service can reach STOPPED (or get unregistered)
            // between the state check above and the watch registration, in
            // which case its watcher sweep has already run. Re-check after
            // registering so the gate cannot be left unsatisfiable.
            let still_active = match self.shared.registry.get(&owned).await {
                Ok(owned_entry) => !owned_entry.state().is_stopped(),
                Err(_) => false,
            };
            if !still_active {
                condition.satisfy();
            }
            inner.owned_conditions.push(condition);
        }
    }

    /// Evaluate stop conditions and, when satisfied (or forced), tear the
    /// service down and move it to STOPPED.
    async fn try_complete_stop(
        &self,
        entry: &Arc<ServiceEntry>,
        inner: &mut EntryInner,
        mode: StopMode,
    ) -> Result<()> {
        let name = entry.name().clone();
        let mut unsatisfied = unsatisfied_descriptions(&inner.stop_conditions).await;
        for condition in &inner.owned_conditions {
            if !condition.is_satisfied_now() {
                unsatisfied.push(condition.description());
            }
        }

        let mut ignored = Vec::new();
        if !unsatisfied.is_empty() {
            match mode {
                StopMode::Normal => {
                    self.fire(
                        ServiceEvent::new(ServiceEventKind::WaitingToStop, name.clone())
                            .with_unsatisfied(unsatisfied.clone()),
                    )
                    .await;
                    return Err(KernelError::UnsatisfiedConditions {
                        name,
                        state: ServiceState::Stopping,
                        unsatisfied,
                    });
                }
                StopMode::Forced => {
                    for condition in &inner.owned_conditions {
                        condition.force_satisfy();
                    }
                    log::warn!(
                        "Service '{}' stop forced past conditions: {}",
                        name,
                        unsatisfied.join(", ")
                    );
                    ignored = unsatisfied;
                }
            }
        }

        let mut destroy_error = None;
        if let Some(service) = inner.service.take() {
            let context = self.service_context(&name);
            if let Err(source) = entry.factory().destroy_service(&context, service).await {
                let cause: Arc<dyn StdError + Send + Sync> = Arc::from(source);
                log::warn!("Service '{}' failed during destroy: {}", name, cause);
                self.fire(
                    ServiceEvent::new(ServiceEventKind::StopError, name.clone())
                        .with_cause(cause.clone()),
                )
                .await;
                destroy_error = Some(cause);
            }
        }

        for condition in &inner.stop_conditions {
            condition.destroy().await;
        }
        for condition in &inner.owned_conditions {
            condition.destroy().await;
        }
        inner.owned_conditions.clear();
        inner.operations = DispatchTable::new();
        self.release_owned_watch(&name);

        entry.set_state(ServiceState::Stopped);
        log::info!("Service '{}' stopped", name);
        self.fire(ServiceEvent::new(ServiceEventKind::Stopped, name.clone()))
            .await;
        // Owners blocked on this service can make progress now.
        self.satisfy_owned_watchers(&name);

        if !ignored.is_empty() {
            return Err(KernelError::ForcedStop { name, ignored });
        }
        if let Some(cause) = destroy_error {
            return Err(KernelError::Registration {
                name,
                operation: "stop",
                cause,
            });
        }
        Ok(())
    }

    /// Re-evaluate a pending transition after a condition signaled a change.
    pub(crate) async fn reevaluate(&self, name: &ServiceName) -> Result<()> {
        let entry = self.shared.registry.get(name).await?;
        let mut inner = entry.inner.lock().await;
        match entry.state() {
            ServiceState::Starting => self.try_complete_start(&entry, &mut inner).await,
            ServiceState::Stopping => {
                self.try_complete_stop(&entry, &mut inner, StopMode::Normal)
                    .await
            }
            _ => Ok(()),
        }
    }

    // ----- owned-service watch index -----

    fn watch_owned(&self, owner: &ServiceName, condition: OwnedServiceCondition) {
        let mut watch = self
            .shared
            .owned_watch
            .lock()
            .expect("owned watch lock poisoned");
        watch
            .entry(condition.owned_name().clone())
            .or_default()
            .push((owner.clone(), condition));
    }

    /// Satisfy the gates of every owner waiting on `stopped`.
    fn satisfy_owned_watchers(&self, stopped: &ServiceName) {
        let watchers = {
            let mut watch = self
                .shared
                .owned_watch
                .lock()
                .expect("owned watch lock poisoned");
            watch.remove(stopped)
        };
        if let Some(watchers) = watchers {
            for (owner, condition) in watchers {
                log::debug!(
                    "Owned service '{}' stopped, releasing owner '{}'",
                    stopped,
                    owner
                );
                condition.satisfy();
            }
        }
    }

    /// Drop any gates still registered by `owner` (its stop has completed).
    fn release_owned_watch(&self, owner: &ServiceName) {
        let mut watch = self
            .shared
            .owned_watch
            .lock()
            .expect("owned watch lock poisoned");
        watch.retain(|_, watchers| {
            watchers.retain(|(watch_owner, _)| watch_owner != owner);
            !watchers.is_empty()
        });
    }
}

fn message_error(message: &str) -> Arc<dyn StdError + Send + Sync> {
    Arc::from(Box::<dyn StdError + Send + Sync>::from(message.to_string()))
}

async fn unsatisfied_descriptions(conditions: &[Arc<dyn ServiceCondition>]) -> Vec<String> {
    let mut unsatisfied = Vec::new();
    for condition in conditions {
        if !condition.is_satisfied().await {
            unsatisfied.push(condition.description());
        }
    }
    unsatisfied
}

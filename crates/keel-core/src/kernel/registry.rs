use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::invoke::DispatchTable;
use crate::kernel::error::{KernelError, Result};
use crate::service::{
    OwnedServiceCondition, Service, ServiceCondition, ServiceFactory, ServiceName, ServiceState,
};

/// Mutable per-service record, guarded by the entry's transition lock.
pub(crate) struct EntryInner {
    /// Live instance while the service is RUNNING.
    pub service: Option<Service>,
    pub start_conditions: Vec<Arc<dyn ServiceCondition>>,
    pub stop_conditions: Vec<Arc<dyn ServiceCondition>>,
    /// Owned-service gates attached for the current stop attempt.
    pub owned_conditions: Vec<OwnedServiceCondition>,
    /// Typed operations, rebuilt from the factory at each start.
    pub operations: DispatchTable,
    /// Starts completed so far; gates non-restartable factories.
    pub start_count: u64,
}

/// One registered service: identity, factory and current state.
///
/// The state cell and start timestamp are atomics so queries and snapshot
/// reads never block behind an in-flight factory call; both are written only
/// while the transition lock (`inner`) is held.
pub(crate) struct ServiceEntry {
    name: ServiceName,
    seq: u64,
    factory: Arc<dyn ServiceFactory>,
    state: AtomicU8,
    /// Milliseconds since the epoch of the last completed start; 0 = never.
    started_at_millis: AtomicU64,
    pub(crate) inner: Mutex<EntryInner>,
}

impl ServiceEntry {
    fn new(name: ServiceName, seq: u64, factory: Arc<dyn ServiceFactory>) -> Self {
        let start_conditions = factory.start_conditions();
        let stop_conditions = factory.stop_conditions();
        Self {
            name,
            seq,
            factory,
            state: AtomicU8::new(ServiceState::Stopped.index()),
            started_at_millis: AtomicU64::new(0),
            inner: Mutex::new(EntryInner {
                service: None,
                start_conditions,
                stop_conditions,
                owned_conditions: Vec::new(),
                operations: DispatchTable::new(),
                start_count: 0,
            }),
        }
    }

    pub(crate) fn name(&self) -> &ServiceName {
        &self.name
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn factory(&self) -> &Arc<dyn ServiceFactory> {
        &self.factory
    }

    pub(crate) fn state(&self) -> ServiceState {
        // The cell only ever holds a valid index.
        ServiceState::from_index(self.state.load(Ordering::SeqCst) as u32)
            .expect("corrupt state cell")
    }

    /// Callers must hold the `inner` lock.
    pub(crate) fn set_state(&self, state: ServiceState) {
        self.state.store(state.index(), Ordering::SeqCst);
    }

    pub(crate) fn started_at(&self) -> Option<SystemTime> {
        match self.started_at_millis.load(Ordering::SeqCst) {
            0 => None,
            millis => Some(UNIX_EPOCH + std::time::Duration::from_millis(millis)),
        }
    }

    /// Callers must hold the `inner` lock.
    pub(crate) fn mark_started_now(&self) {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.started_at_millis.store(millis, Ordering::SeqCst);
    }
}

/// Serializable view of one registry entry, for management front-ends.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub name: ServiceName,
    pub state: ServiceState,
    pub state_index: u8,
    pub types: Vec<String>,
}

/// The authoritative map from service names to registry entries.
///
/// The map lock covers structural mutation and lookup only; it is never held
/// while awaiting an entry's transition lock, except in `remove_stopped`
/// where the entry lock is acquired first and the map lock re-taken last.
pub(crate) struct ServiceRegistry {
    entries: Mutex<HashMap<ServiceName, Arc<ServiceEntry>>>,
    next_seq: AtomicU64,
}

impl ServiceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    pub(crate) async fn register(
        &self,
        name: ServiceName,
        factory: Arc<dyn ServiceFactory>,
    ) -> Result<Arc<ServiceEntry>> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&name) {
            return Err(KernelError::ServiceAlreadyExists(name));
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(ServiceEntry::new(name.clone(), seq, factory));
        entries.insert(name, entry.clone());
        Ok(entry)
    }

    pub(crate) async fn get(&self, name: &ServiceName) -> Result<Arc<ServiceEntry>> {
        let entries = self.entries.lock().await;
        entries
            .get(name)
            .cloned()
            .ok_or_else(|| KernelError::ServiceNotFound(name.clone()))
    }

    pub(crate) async fn contains(&self, name: &ServiceName) -> bool {
        self.entries.lock().await.contains_key(name)
    }

    /// Remove an entry, which is only legal from STOPPED.
    ///
    /// The entry lock is taken before the map lock is re-acquired, so no
    /// transition can slip in between the state check and the removal.
    pub(crate) async fn remove_stopped(&self, name: &ServiceName) -> Result<Arc<ServiceEntry>> {
        let entry = self.get(name).await?;
        let _inner = entry.inner.lock().await;
        let state = entry.state();
        if !state.is_stopped() {
            return Err(KernelError::Registration {
                name: name.clone(),
                operation: "unregister",
                cause: Arc::from(Box::<dyn std::error::Error + Send + Sync>::from(format!(
                    "service is {}, only STOPPED services may be unregistered",
                    state
                ))),
            });
        }
        let mut entries = self.entries.lock().await;
        match entries.get(name) {
            Some(current) if Arc::ptr_eq(current, &entry) => {
                entries.remove(name);
                Ok(entry.clone())
            }
            // Raced with another unregister.
            _ => Err(KernelError::ServiceNotFound(name.clone())),
        }
    }

    /// All entries in registration order.
    pub(crate) async fn all_entries(&self) -> Vec<Arc<ServiceEntry>> {
        let entries = self.entries.lock().await;
        let mut all: Vec<_> = entries.values().cloned().collect();
        all.sort_by_key(|e| e.seq());
        all
    }

    /// Names matching a glob pattern (`*`, `?`), sorted.
    pub(crate) async fn list_names(&self, pattern: &str) -> Vec<ServiceName> {
        let entries = self.entries.lock().await;
        let mut names: Vec<_> = entries
            .keys()
            .filter(|name| glob_match(pattern, &name.to_string()))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Entries whose canonical name matches a glob pattern, sorted by name.
    pub(crate) async fn matching_entries(&self, pattern: &str) -> Vec<Arc<ServiceEntry>> {
        let entries = self.entries.lock().await;
        let mut matched: Vec<_> = entries
            .values()
            .filter(|e| glob_match(pattern, &e.name().to_string()))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name().cmp(b.name()));
        matched
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Glob matcher over canonical name strings: `*` matches any run of
/// characters, `?` exactly one.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    // Classic two-pointer wildcard walk with backtracking to the last `*`.
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

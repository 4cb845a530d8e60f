use std::collections::{HashMap, HashSet};

use crate::kernel::error::{KernelError, Result};
use crate::service::ServiceName;

/// The declared ownership relation between registered services.
///
/// Edges run from an owner to the services it owns. Recursive start walks
/// owner-before-owned, recursive stop the reverse, and kernel destruction
/// uses the reverse of the global start order so owned services are torn
/// down before their owners. Cycles are detected explicitly and reported
/// with the offending path instead of recursing forever.
pub(crate) struct OwnershipGraph {
    edges: HashMap<ServiceName, Vec<ServiceName>>,
}

impl OwnershipGraph {
    pub(crate) fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    pub(crate) fn add_owner(&mut self, owner: ServiceName, owned: Vec<ServiceName>) {
        self.edges.entry(owner).or_default().extend(owned);
    }

    fn owned_by(&self, owner: &ServiceName) -> &[ServiceName] {
        self.edges.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Order in which to start `root` and everything it transitively owns:
    /// each owner precedes its owned services. Fails on ownership cycles.
    pub(crate) fn start_order(&self, root: &ServiceName) -> Result<Vec<ServiceName>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        self.walk(root, &mut visited, &mut path, &mut order)?;
        Ok(order)
    }

    /// Order in which to stop `root` and everything it transitively owns:
    /// owned services before their owner.
    pub(crate) fn stop_order(&self, root: &ServiceName) -> Result<Vec<ServiceName>> {
        let mut order = self.start_order(root)?;
        order.reverse();
        Ok(order)
    }

    fn walk(
        &self,
        node: &ServiceName,
        visited: &mut HashSet<ServiceName>,
        path: &mut Vec<ServiceName>,
        order: &mut Vec<ServiceName>,
    ) -> Result<()> {
        if let Some(at) = path.iter().position(|n| n == node) {
            let mut cycle = path[at..].to_vec();
            cycle.push(node.clone());
            return Err(KernelError::CyclicOwnership(cycle));
        }
        if !visited.insert(node.clone()) {
            return Ok(());
        }
        path.push(node.clone());
        order.push(node.clone());
        for owned in self.owned_by(node) {
            self.walk(owned, visited, path, order)?;
        }
        path.pop();
        Ok(())
    }

    /// Global teardown order: the reverse of a whole-registry start order,
    /// so every owned service comes before its owner. Tolerates cycles
    /// (back edges are ignored) because destruction must always make
    /// progress; `roots` should be supplied in registration order for a
    /// deterministic result.
    pub(crate) fn destroy_order(&self, roots: &[ServiceName]) -> Vec<ServiceName> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        for root in roots {
            self.walk_lenient(root, &mut visited, &mut order);
        }
        order.reverse();
        order
    }

    fn walk_lenient(
        &self,
        node: &ServiceName,
        visited: &mut HashSet<ServiceName>,
        order: &mut Vec<ServiceName>,
    ) {
        if !visited.insert(node.clone()) {
            return;
        }
        order.push(node.clone());
        for owned in self.owned_by(node) {
            self.walk_lenient(owned, visited, order);
        }
    }
}

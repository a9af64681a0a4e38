//! A gate that lets at most one business run per id at a time.

use std::{collections::HashSet, fmt::Debug, hash::Hash};

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Admits one business per id at a time. Later arrivals are refused until the running one releases its
/// [`GateGuard`], instead of queuing behind it.
#[derive(Debug)]
pub struct TriggerGate<ID>
where
    ID: Eq + Hash,
{
    active: Mutex<HashSet<ID>>,
}

impl<ID> Default for TriggerGate<ID>
where
    ID: Eq + Hash,
{
    fn default() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }
}

impl<ID> TriggerGate<ID>
where
    ID: Eq + Hash + Clone + Debug,
{
    /// Creates a [`TriggerGate`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id`, returning [`None`] if a business with the same id is still running.
    pub fn try_acquire(&self, id: ID) -> Option<GateGuard<'_, ID>> {
        let mut active = self.active.lock();
        if active.contains(&id) {
            warn!("business {id:?} is already running, refusing a new one");
            return None;
        }
        debug!("business {id:?} admitted");
        active.insert(id.clone());

        Some(GateGuard { gate: self, id })
    }

    /// Whether a business with `id` is running.
    pub fn is_active(&self, id: &ID) -> bool {
        self.active.lock().contains(id)
    }
}

/// Releases its id on drop.
#[derive(Debug)]
pub struct GateGuard<'a, ID>
where
    ID: Eq + Hash + Clone + Debug,
{
    gate: &'a TriggerGate<ID>,
    id: ID,
}

impl<ID> Drop for GateGuard<'_, ID>
where
    ID: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        self.gate.active.lock().remove(&self.id);
        debug!("business {:?} released", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_while_running() {
        let gate = TriggerGate::new();

        let guard = gate.try_acquire("owner/repo/cleanup.yml");
        assert!(guard.is_some());
        assert!(gate.try_acquire("owner/repo/cleanup.yml").is_none());
        assert!(gate.try_acquire("owner/repo/other.yml").is_some());

        drop(guard);
        assert!(!gate.is_active(&"owner/repo/cleanup.yml"));
        assert!(gate.try_acquire("owner/repo/cleanup.yml").is_some());
    }
}

use log::trace;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Passive port range shared by every connection of a server.
///
/// A port handed out as a [`PortLease`] is exclusive until the lease is dropped.
#[derive(Debug, Clone)]
pub struct PortPool {
    min: u16,
    max: u16,
    in_use: Arc<Mutex<HashSet<u16>>>,
}

impl PortPool {
    /// `None` when the range is empty.
    pub fn new(min: u16, max: u16) -> Option<Self> {
        if min == 0 || min > max {
            return None;
        }
        Some(Self {
            min,
            max,
            in_use: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.max - self.min) + 1
    }

    pub fn available(&self) -> usize {
        self.capacity() - lock(&self.in_use).len()
    }

    /// Leases a free port, starting the search at a random offset.
    ///
    /// Ports in `tried` are skipped so a caller retrying after `AddrInUse` moves on
    /// to another candidate. Returns `None` once every candidate is taken or tried.
    pub fn lease(&self, tried: &HashSet<u16>) -> Option<PortLease> {
        let mut in_use = lock(&self.in_use);
        let len = self.capacity();
        let start = rand::thread_rng().gen_range(0..len);

        let port = (0..len)
            .map(|i| self.min + ((start + i) % len) as u16)
            .find(|p| !in_use.contains(p) && !tried.contains(p))?;

        in_use.insert(port);
        trace!("Leased passive port {}", port);
        Some(PortLease {
            port,
            in_use: Arc::clone(&self.in_use),
        })
    }
}

/// An exclusively held passive port; returned to its pool on drop.
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    in_use: Arc<Mutex<HashSet<u16>>>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        lock(&self.in_use).remove(&self.port);
        trace!("Returned passive port {}", self.port);
    }
}

/// Pools keyed by range, created the first time a range is asked for.
///
/// Passive options may be resolved per request, so two connections asking for the
/// same range must share one pool.
#[derive(Debug, Default)]
pub struct PortPools {
    pools: Mutex<HashMap<(u16, u16), PortPool>>,
}

impl PortPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, min: u16, max: u16) -> Option<PortPool> {
        let mut pools = self.pools.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pool) = pools.get(&(min, max)) {
            return Some(pool.clone());
        }
        let pool = PortPool::new(min, max)?;
        pools.insert((min, max), pool.clone());
        Some(pool)
    }
}

fn lock(set: &Mutex<HashSet<u16>>) -> MutexGuard<'_, HashSet<u16>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

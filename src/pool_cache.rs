// Copyright 2020 Joyent, Inc.

pub mod types;

use std::collections::HashMap;
use std::convert::TryFrom;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use slog::{debug, info, o, warn, Drain, Logger};

use crate::discovery::NodeDiscovery;
use crate::error::Error;
use crate::factory::PoolFactory;
use crate::node::Node;
use crate::pool::{ClusterPool, PoolConnector};
use crate::pool_cache::types::{
    CacheEntry, CacheKey, Clock, PoolCacheOptions, PoolCacheState,
    PoolCacheStats, RebuildReason, Slot, SystemClock,
};
use crate::settings::SharedSettings;
use crate::topology::TopologyService;

/// The default maximum pool age in seconds
pub const DEFAULT_MAX_AGE: u64 = 300;

// Ages beyond what a chrono duration holds are clamped to its maximum
fn max_age_duration(secs: u64) -> Duration {
    let limit = Duration::max_value().num_seconds();
    let secs = i64::try_from(secs).map_or(limit, |s| s.min(limit));
    Duration::seconds(secs)
}

/// A cache of cluster connection pools keyed by keyspace and seed hosts.
///
/// The cache is the owner of every pool it builds. A pool is replaced when it
/// ages out or when all of its hosts have been ejected, and the replaced pool
/// is disposed. Callers share one cache between threads, typically behind an
/// `Arc`.
pub struct PoolCache<C, T>
where
    C: PoolConnector,
    T: TopologyService,
{
    slots: Mutex<HashMap<CacheKey, Slot<C::Pool>>>,
    discovery: NodeDiscovery<T>,
    factory: PoolFactory<C>,
    settings: SharedSettings,
    clock: Box<dyn Clock>,
    max_age: Duration,
    normalize_hosts: bool,
    cached_pools: AtomicUsize,
    pools_created: AtomicU64,
    state: Mutex<PoolCacheState>,
    log: Logger,
}

impl<C, T> PoolCache<C, T>
where
    C: PoolConnector,
    T: TopologyService,
{
    pub fn new(
        pco: PoolCacheOptions,
        connector: C,
        topology: T,
        settings: SharedSettings,
    ) -> Self {
        let logger = pco
            .log
            .unwrap_or_else(|| Logger::root(slog_stdlog::StdLog.fuse(), o!()));

        let max_age = pco.max_age.unwrap_or(DEFAULT_MAX_AGE);

        PoolCache {
            slots: Mutex::new(HashMap::new()),
            discovery: NodeDiscovery::new(
                topology,
                logger.new(o!("component" => "discovery")),
            ),
            factory: PoolFactory::new(
                connector,
                logger.new(o!("component" => "factory")),
            ),
            settings,
            clock: Box::new(SystemClock),
            max_age: max_age_duration(max_age),
            normalize_hosts: pco.normalize_hosts.unwrap_or(false),
            cached_pools: AtomicUsize::new(0),
            pools_created: AtomicU64::new(0),
            state: Mutex::new(PoolCacheState::Running),
            log: logger,
        }
    }

    /// Replace the clock used to timestamp and age pools.
    pub fn with_clock<K>(mut self, clock: K) -> Self
    where
        K: Clock + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Return a usable pool for `keyspace` and the seed `hosts`, building one
    /// if none is cached, the cached one is older than the maximum age, or
    /// the cached one has no hosts left.
    ///
    /// A rebuild resolves the cluster nodes from the seeds and builds a pool
    /// over them. If either step fails the error is returned and the cache is
    /// left as it was, so the next call tries again.
    pub fn get_or_create<S>(
        &self,
        keyspace: &str,
        hosts: &[S],
    ) -> Result<Arc<C::Pool>, Error>
    where
        S: AsRef<str>,
    {
        if keyspace.is_empty() {
            return Err(Error::EmptyKeyspace);
        }
        if self.get_state() == PoolCacheState::Stopped {
            return Err(Error::CacheStopped);
        }

        let key = self.cache_key(keyspace, hosts)?;
        let log = self.log.new(o!("pool" => key.id()));
        let slot = self.slot(&key);

        let mut entry = slot.entry_lock();
        let reason = match entry.as_ref() {
            Some(e) => match e.rebuild_reason(self.clock.now(), self.max_age) {
                Some(reason) => reason,
                None => {
                    debug!(log, "reusing connection pool for {}", key);
                    return Ok(e.pool.clone());
                }
            },
            None => RebuildReason::Missing,
        };

        if reason == RebuildReason::NoActiveHosts {
            warn!(log, "{}", reason);
        }
        info!(log, "building connection pool for {}: {}", key, reason);

        let settings = self.settings.snapshot();
        let nodes = self
            .discovery
            .resolve_nodes(&key.hosts, keyspace, &settings)?;
        let connection_pool = self.factory.build_pool(keyspace, &nodes)?;
        self.pools_created.fetch_add(1, Ordering::Relaxed);

        // stop() may have drained the slots while the pool was being built
        if self.get_state() == PoolCacheState::Stopped {
            drop(entry);
            connection_pool.dispose();
            return Err(Error::CacheStopped);
        }

        let replaced = entry.replace(CacheEntry::new(
            connection_pool.clone(),
            self.clock.now(),
        ));
        // Counted before the slot is released so remove() and stop() never
        // subtract an entry that was not yet added
        if replaced.is_none() {
            self.cached_pools.fetch_add(1, Ordering::Relaxed);
        }
        drop(entry);

        if let Some(old) = replaced {
            debug!(log, "disposing replaced connection pool (created {})",
                old.created_at);
            old.pool.dispose();
        }

        Ok(connection_pool)
    }

    /// Evict and dispose the pool cached for `keyspace` and `hosts`. Returns
    /// whether a pool was cached.
    ///
    /// The key itself stays in the cache with no pool, so requests already
    /// waiting on it build a fresh pool. Keys are only released by `stop`.
    pub fn remove<S>(&self, keyspace: &str, hosts: &[S]) -> Result<bool, Error>
    where
        S: AsRef<str>,
    {
        let key = self.cache_key(keyspace, hosts)?;
        // The emptied slot stays in the map, other callers may be waiting on it
        let slot = match self.slots_lock().get(&key).cloned() {
            Some(s) => s,
            None => return Ok(false),
        };

        let removed = slot.entry_lock().take();
        match removed {
            Some(old) => {
                info!(self.log, "removing connection pool for {}", key);
                self.cached_pools.fetch_sub(1, Ordering::Relaxed);
                old.pool.dispose();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Dispose every cached pool and refuse further requests. Calling `stop`
    /// on a stopped cache does nothing.
    pub fn stop(&self) {
        {
            let mut state =
                self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == PoolCacheState::Stopped {
                return;
            }
            *state = PoolCacheState::Stopped;
        }

        let slots: Vec<(CacheKey, Slot<C::Pool>)> =
            self.slots_lock().drain().collect();

        info!(self.log, "stopping pool cache, {} cached pools", slots.len());

        slots.into_iter().for_each(|(key, slot)| {
            if let Some(old) = slot.entry_lock().take() {
                debug!(self.log, "disposing connection pool for {}", key);
                self.cached_pools.fetch_sub(1, Ordering::Relaxed);
                old.pool.dispose();
            }
        });
    }

    pub fn get_state(&self) -> PoolCacheState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_stats(&self) -> PoolCacheStats {
        PoolCacheStats {
            cached_pools: self.len(),
            pools_created: self.pools_created.load(Ordering::Relaxed),
        }
    }

    /// The number of keys with a cached pool. Keys whose pool is being built
    /// for the first time are not counted.
    pub fn len(&self) -> usize {
        self.cached_pools.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    fn cache_key<S>(&self, keyspace: &str, hosts: &[S]) -> Result<CacheKey, Error>
    where
        S: AsRef<str>,
    {
        let hosts = hosts
            .iter()
            .map(|h| Node::from_str(h.as_ref()))
            .collect::<Result<Vec<Node>, Error>>()?;
        Ok(CacheKey::new(keyspace, hosts, self.normalize_hosts))
    }

    // The map lock is only held long enough to find or insert the slot.
    fn slot(&self, key: &CacheKey) -> Slot<C::Pool> {
        self.slots_lock()
            .entry(key.clone())
            .or_insert_with(Slot::new)
            .clone()
    }

    fn slots_lock(&self) -> MutexGuard<HashMap<CacheKey, Slot<C::Pool>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C, T> Drop for PoolCache<C, T>
where
    C: PoolConnector,
    T: TopologyService,
{
    fn drop(&mut self) {
        self.stop();
    }
}

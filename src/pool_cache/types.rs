// Copyright 2020 Joyent, Inc.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use sha1::Sha1;
use slog::Logger;

use crate::node::Node;
use crate::pool::ClusterPool;

/// The configuration options for a pool cache.
#[derive(Debug, Default)]
pub struct PoolCacheOptions {
    /// An optional maximum pool age in seconds. A cached pool older than this
    /// is rebuilt on its next request. If not specified the default is 300
    /// seconds.
    pub max_age: Option<u64>,
    /// Whether to sort and dedupe the requested hosts before using them as
    /// part of the cache key. If not specified the hosts are used in the
    /// order given, so the same hosts listed in a different order map to a
    /// separate pool.
    pub normalize_hosts: Option<bool>,
    /// An optional `slog` logger instance. If none is provided then the
    /// logging will fall back to using the
    /// [`slog-stdlog`](https://docs.rs/slog-stdlog) drain.
    pub log: Option<Logger>,
}

/// The identity of a cached pool: a keyspace and the exact sequence of seed
/// hosts it was requested with.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey {
    pub keyspace: String,
    pub hosts: Vec<Node>,
}

impl CacheKey {
    pub fn new(keyspace: &str, mut hosts: Vec<Node>, normalize: bool) -> Self {
        if normalize {
            hosts.sort();
            hosts.dedup();
        }
        CacheKey {
            keyspace: String::from(keyspace),
            hosts,
        }
    }

    /// A base64 encoded identifier of the key, short enough for log records.
    pub fn id(&self) -> String {
        let mut sha1 = Sha1::new();
        sha1.update(self.keyspace.as_bytes());
        self.hosts.iter().for_each(|h| {
            sha1.update(b"||");
            sha1.update(h.to_string().as_bytes());
        });

        base64::encode(&sha1.digest().bytes())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let hosts: Vec<String> = self.hosts.iter().map(Node::to_string).collect();
        write!(fmt, "{}/[{}]", self.keyspace, hosts.join(","))
    }
}

/// A cached pool and the time it was created.
#[derive(Debug)]
pub struct CacheEntry<P> {
    pub pool: Arc<P>,
    pub created_at: DateTime<Utc>,
}

impl<P> CacheEntry<P>
where
    P: ClusterPool,
{
    pub fn new(pool: Arc<P>, created_at: DateTime<Utc>) -> Self {
        CacheEntry { pool, created_at }
    }

    /// An entry whose expiry lies beyond the representable range never
    /// expires.
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.created_at
            .checked_add_signed(max_age)
            .map_or(false, |expires_at| expires_at < now)
    }

    /// Decide whether the entry must be replaced. An entry only survives
    /// while it is younger than `max_age` and its pool still has at least
    /// one server.
    pub fn rebuild_reason(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Option<RebuildReason> {
        if self.is_expired(now, max_age) {
            Some(RebuildReason::Expired)
        } else if self.pool.server_list().is_empty() {
            Some(RebuildReason::NoActiveHosts)
        } else {
            None
        }
    }
}

/// Why a pool is (re)built.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RebuildReason {
    /// No pool is cached for the key.
    Missing,
    /// The cached pool reached its maximum age.
    Expired,
    /// Every host of the cached pool has been ejected.
    NoActiveHosts,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RebuildReason::Missing => String::from("no cached pool").fmt(fmt),
            RebuildReason::Expired => String::from("cached pool expired").fmt(fmt),
            RebuildReason::NoActiveHosts => {
                String::from("connection pool had no active hosts").fmt(fmt)
            }
        }
    }
}

/// The counts tracked by a pool cache
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PoolCacheStats {
    /// The number of keys with a cached pool
    pub cached_pools: usize,
    /// The number of pools built since the cache was created
    pub pools_created: u64,
}

/// Sum type representing the current state of the pool cache.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PoolCacheState {
    /// The cache hands out pools.
    Running,
    /// The cache disposed of its pools and refuses further requests.
    Stopped,
}

impl fmt::Display for PoolCacheState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolCacheState::Running => String::from("running").fmt(fmt),
            PoolCacheState::Stopped => String::from("stopped").fmt(fmt),
        }
    }
}

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// The entry of one cache key. Holding the slot lock across lookup and rebuild
// keeps two callers from building competing pools for the same key.
#[doc(hidden)]
#[derive(Debug)]
pub struct Slot<P>(Arc<Mutex<Option<CacheEntry<P>>>>);

impl<P> Slot<P> {
    pub fn new() -> Self {
        Slot(Arc::new(Mutex::new(None)))
    }

    pub fn entry_lock(&self) -> MutexGuard<Option<CacheEntry<P>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Clone for Slot<P> {
    fn clone(&self) -> Slot<P> {
        Slot(Arc::clone(&self.0))
    }
}

impl<P> Default for Slot<P> {
    fn default() -> Self {
        Self::new()
    }
}

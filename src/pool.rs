// Copyright 2020 Joyent, Inc.

//! The cluster connection pool as seen by the cache.
//!
//! The pool itself (connection management, per-operation timeouts and
//! retries, the wire protocol) lives outside of this crate. The cache only
//! depends on the narrow [`ClusterPool`](trait.ClusterPool.html) interface
//! and constructs pools through a
//! [`PoolConnector`](trait.PoolConnector.html). [`ServerList`] and
//! [`PoolListeners`] are building blocks for implementers of `ClusterPool`.

use std::error;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use derive_more::{Add, AddAssign, Display, From, Into, Mul};

use crate::node::Node;

/// A newtype wrapper around u32 used for connection counts of a pool.
#[derive(
    Add,
    AddAssign,
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    From,
    Into,
    Mul,
    Ord,
    PartialOrd,
    PartialEq,
)]
pub struct ConnectionCount(u32);

/// The parameters handed to a `PoolConnector` to build a pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolOptions {
    /// The keyspace every connection of the pool is bound to.
    pub keyspace: String,
    /// The initial server list. The pool never adds to it afterwards.
    pub server_list: Vec<Node>,
    /// The number of connections the pool maintains.
    pub pool_size: ConnectionCount,
    /// Whether every connection is established during construction.
    pub prefill: bool,
    /// The per-operation timeout.
    pub timeout: Duration,
    /// The maximum attempts per operation before it fails.
    pub max_retries: u32,
}

/// The notification delivered when a connection to a server fails.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionFailedEvent {
    /// The server whose connection failed.
    pub server: Node,
    /// A description of the failure.
    pub error: String,
}

/// A receiver of pool events, registered with `ClusterPool::add_listener`.
pub trait PoolListener: Send + Sync {
    /// Invoked by the pool whenever a connection to one of its servers
    /// fails.
    fn connection_failed(&self, event: &ConnectionFailedEvent);
    /// Invoked once when the pool is disposed.
    fn pool_disposed(&self) {}
}

/// A live pool of connections to a set of nodes for one keyspace.
///
/// Implementations must install a new server list atomically: a concurrent
/// `server_list` call returns either the old or the new list.
pub trait ClusterPool: Send + Sync + 'static {
    /// A copy of the servers the pool currently draws connections from.
    fn server_list(&self) -> Vec<Node>;
    /// Replace the servers the pool draws connections from.
    fn set_server_list(&self, servers: Vec<Node>);
    /// Register a listener for the pool's events.
    fn add_listener(&self, listener: Arc<dyn PoolListener>);
    /// Close every connection of the pool. The pool is unusable afterwards.
    fn dispose(&self);
}

/// The pool-construction service.
pub trait PoolConnector: Send + Sync {
    /// The pool type built by this connector.
    type Pool: ClusterPool;
    /// The error type returned when a pool cannot be built, for example
    /// when no server accepts a connection during prefill.
    type Error: error::Error;
    /// Build a new pool with the given options.
    fn connect(&self, options: &PoolOptions) -> Result<Self::Pool, Self::Error>;
}

/// A server list that can be read while it is being replaced.
#[derive(Debug, Default)]
pub struct ServerList(RwLock<Vec<Node>>);

impl ServerList {
    pub fn new(servers: Vec<Node>) -> Self {
        ServerList(RwLock::new(servers))
    }

    pub fn get(&self) -> Vec<Node> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, servers: Vec<Node>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = servers;
    }

    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The listeners registered with a pool.
///
/// Notification runs outside of the registry lock so that a listener may
/// call back into its pool.
#[derive(Default)]
pub struct PoolListeners(Mutex<Vec<Arc<dyn PoolListener>>>);

impl PoolListeners {
    pub fn new() -> Self {
        PoolListeners(Mutex::new(Vec::new()))
    }

    pub fn add(&self, listener: Arc<dyn PoolListener>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connection_failed(&self, event: &ConnectionFailedEvent) {
        self.snapshot()
            .iter()
            .for_each(|l| l.connection_failed(event));
    }

    pub fn pool_disposed(&self) {
        self.snapshot().iter().for_each(|l| l.pool_disposed());
    }

    fn snapshot(&self) -> Vec<Arc<dyn PoolListener>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

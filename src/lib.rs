// Copyright 2020 Joyent, Inc.

//! A cache of connection pools to a multi-node column-store cluster
//!
//! Services that talk to the cluster typically want a single connection pool
//! per keyspace and set of seed hosts, shared by every request that needs a
//! connection. This crate keeps those pools in a
//! [`PoolCache`](pool_cache/struct.PoolCache.html) and manages their lifecycle:
//! it builds a pool the first time it is requested, hands out the same pool on
//! later requests, and transparently rebuilds it when it grows too old or when
//! every one of its hosts has failed.
//!
//! The pool itself and the topology queries against the cluster are provided
//! by the user of the crate through a small set of traits. These are the
//! [`PoolConnector`](pool/trait.PoolConnector.html) and
//! [`ClusterPool`](pool/trait.ClusterPool.html) traits for the pool and the
//! [`TopologyService`](topology/trait.TopologyService.html) trait for the
//! topology queries.
//!
//! ## Node discovery
//!
//! A pool is requested with a list of seed hosts. Before a pool is built, each
//! seed is asked for the ring description of the keyspace, and the first
//! endpoint of every token range is added to the seed list. The resulting set
//! of nodes is what the pool connects to. A seed that cannot be reached or
//! fails to describe the ring fails the whole request: a pool is never built
//! from a partial view of the cluster.
//!
//! Discovery can be turned off with the `discover_nodes` flag of the
//! [`Settings`](settings/struct.Settings.html). The flag is read each time a
//! pool is built, so it can be changed while the cache is running.
//!
//! ## Pool sizing
//!
//! Every pool is built with four connections per resolved node, all of them
//! established up front, a per-operation timeout of ten seconds and at most
//! five attempts per operation.
//!
//! ## Host ejection
//!
//! Each pool gets a [`FailureListener`](listener/struct.FailureListener.html).
//! When a connection to a host fails, the listener removes that host from the
//! pool's server list. A single failure is enough and an ejected host never
//! comes back into the same pool. Once all hosts are ejected the next request
//! for the pool builds a new one.
//!
//! ## Expiration
//!
//! A cached pool is rebuilt on the first request made more than 300 seconds
//! after it was created (configurable with `PoolCacheOptions::max_age`). This
//! brings ejected hosts that have recovered, and nodes that joined the
//! cluster, into the pool. The replaced pool is disposed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::thread;
//!
//! use cueball_pool_cache::pool_cache::types::PoolCacheOptions;
//! use cueball_pool_cache::pool_cache::PoolCache;
//! use cueball_pool_cache::settings::{Settings, SharedSettings};
//!
//! let settings = SharedSettings::new(Settings::from_file("/etc/feeds.toml")?);
//!
//! let cache = Arc::new(PoolCache::new(
//!     PoolCacheOptions::default(),
//!     ThriftPoolConnector::new(),
//!     ThriftTopology::new(),
//!     settings,
//! ));
//!
//! for _ in 0..10 {
//!     let cache = cache.clone();
//!     thread::spawn(move || {
//!         let pool = cache.get_or_create("feeds", &["cass1:9160", "cass2:9160"])?;
//!         // Do stuff with the pool here
//!     });
//! }
//! ```

#![allow(missing_docs)]

pub mod discovery;
pub mod error;
pub mod factory;
pub mod listener;
pub mod node;
pub mod pool;
pub mod pool_cache;
pub mod settings;
pub mod topology;

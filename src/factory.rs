// Copyright 2020 Joyent, Inc.

use std::collections::BTreeSet;
use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use slog::{info, o, Logger};

use crate::error::Error;
use crate::listener::FailureListener;
use crate::node::Node;
use crate::pool::{ClusterPool, ConnectionCount, PoolConnector, PoolOptions};

/// Connections maintained per resolved node
pub const CONNECTIONS_PER_NODE: u32 = 4;
/// Per-operation timeout of every pool
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);
/// Attempts per operation before the pool gives up
pub const MAX_RETRIES: u32 = 5;

/// Return the options for a pool over `nodes`. Only the pool size depends on
/// the node count.
pub fn pool_options(keyspace: &str, nodes: &BTreeSet<Node>) -> PoolOptions {
    PoolOptions {
        keyspace: String::from(keyspace),
        server_list: nodes.iter().cloned().collect(),
        pool_size: pool_size(nodes.len()),
        prefill: true,
        timeout: OPERATION_TIMEOUT,
        max_retries: MAX_RETRIES,
    }
}

/// The pool size for `node_count` nodes, saturating at `u32::MAX`.
pub fn pool_size(node_count: usize) -> ConnectionCount {
    let node_count = u32::try_from(node_count).unwrap_or(u32::MAX);
    ConnectionCount::from(CONNECTIONS_PER_NODE.saturating_mul(node_count))
}

/// Builds pools through a `PoolConnector` and attaches a `FailureListener`
/// to each of them. Built pools are not retained.
#[derive(Debug)]
pub struct PoolFactory<C>
where
    C: PoolConnector,
{
    connector: C,
    log: Logger,
}

impl<C> PoolFactory<C>
where
    C: PoolConnector,
{
    pub fn new(connector: C, log: Logger) -> Self {
        PoolFactory { connector, log }
    }

    pub fn build_pool(
        &self,
        keyspace: &str,
        nodes: &BTreeSet<Node>,
    ) -> Result<Arc<C::Pool>, Error> {
        let options = pool_options(keyspace, nodes);
        info!(self.log, "setting up a new connection pool";
            "keyspace" => keyspace,
            "nodes" => nodes.len(),
            "pool_size" => u32::from(options.pool_size));

        let connection_pool = self
            .connector
            .connect(&options)
            .map(Arc::new)
            .map_err(|e| Error::PoolConstructionFailure {
                keyspace: String::from(keyspace),
                err: e.to_string(),
            })?;

        let listener = FailureListener::new(
            &connection_pool,
            self.log.new(o!("keyspace" => String::from(keyspace))),
        );
        connection_pool.add_listener(Arc::new(listener));

        Ok(connection_pool)
    }
}

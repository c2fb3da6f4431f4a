// Copyright 2020 Joyent, Inc.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use slog::{debug, warn, Logger};

use crate::node::Node;
use crate::pool::{ClusterPool, ConnectionFailedEvent, PoolListener};

/// Ejects a host from its pool's server list as soon as one connection to it
/// fails.
///
/// Ejection is permanent for the lifetime of the pool: a recovered host only
/// comes back when the pool cache builds a new pool, either because the pool
/// aged out or because every host has been ejected.
pub struct FailureListener<P>
where
    P: ClusterPool,
{
    // The pool owns its listeners, so the listener must not own the pool
    connection_pool: Weak<P>,
    eject_lock: Mutex<()>,
    log: Logger,
}

impl<P> FailureListener<P>
where
    P: ClusterPool,
{
    pub fn new(connection_pool: &Arc<P>, log: Logger) -> Self {
        FailureListener {
            connection_pool: Arc::downgrade(connection_pool),
            eject_lock: Mutex::new(()),
            log,
        }
    }

    /// Remove `host` from the pool's server list. Returns false when the pool
    /// is gone or the host was already ejected.
    pub fn eject_host(&self, host: &Node) -> bool {
        let connection_pool = match self.connection_pool.upgrade() {
            Some(p) => p,
            None => {
                debug!(self.log, "pool dropped, not ejecting {}", host);
                return false;
            }
        };

        // Serialize the read-modify-write of the server list so concurrent
        // ejections cannot resurrect each other's hosts.
        let _guard = self
            .eject_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut host_list = connection_pool.server_list();
        match host_list.iter().position(|h| h == host) {
            Some(idx) => {
                warn!(self.log, "ejecting {} from pool", host);
                host_list.remove(idx);
                connection_pool.set_server_list(host_list);
                true
            }
            None => {
                debug!(self.log, "{} already ejected from pool", host);
                false
            }
        }
    }
}

impl<P> PoolListener for FailureListener<P>
where
    P: ClusterPool,
{
    fn connection_failed(&self, event: &ConnectionFailedEvent) {
        debug!(self.log, "connection to {} failed: {}", event.server,
            event.error);
        self.eject_host(&event.server);
    }

    fn pool_disposed(&self) {
        debug!(self.log, "pool disposed");
    }
}

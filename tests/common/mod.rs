// Copyright 2020 Joyent, Inc.

#![allow(dead_code)]

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use slog::{o, Discard, Drain, Level, LevelFilter, Logger};

use cueball_pool_cache::node::Node;
use cueball_pool_cache::pool::{
    ClusterPool, ConnectionFailedEvent, PoolConnector, PoolListener,
    PoolListeners, PoolOptions, ServerList,
};
use cueball_pool_cache::pool_cache::types::Clock;
use cueball_pool_cache::topology::{
    EndpointDetails, TokenRange, TopologyService, TopologySession,
};

pub const LOG_LEVEL_ENV_VAR: &str = "POOL_CACHE_LOG_LEVEL";

// Log to the terminal when POOL_CACHE_LOG_LEVEL is set, otherwise discard
pub fn log_from_env() -> Logger {
    match env::var(LOG_LEVEL_ENV_VAR)
        .ok()
        .and_then(|l| Level::from_str(&l).ok())
    {
        Some(level) => {
            let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
            let drain = slog_term::FullFormat::new(plain).build();
            Logger::root(
                Mutex::new(LevelFilter::new(drain, level)).fuse(),
                o!("build-id" => "0.1.0"),
            )
        }
        None => Logger::root(Discard, o!()),
    }
}

#[derive(Debug)]
pub struct FakeError(pub String);

impl fmt::Display for FakeError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

impl std::error::Error for FakeError {}

pub struct FakePool {
    pub options: PoolOptions,
    servers: ServerList,
    listeners: PoolListeners,
    disposed: AtomicBool,
}

impl FakePool {
    // What the pool's connection machinery would do when a connection breaks
    pub fn fail_connection(&self, host: &Node) {
        self.listeners.connection_failed(&ConnectionFailedEvent {
            server: host.clone(),
            error: String::from("connection reset by peer"),
        });
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ClusterPool for FakePool {
    fn server_list(&self) -> Vec<Node> {
        self.servers.get()
    }

    fn set_server_list(&self, servers: Vec<Node>) {
        self.servers.set(servers)
    }

    fn add_listener(&self, listener: Arc<dyn PoolListener>) {
        self.listeners.add(listener)
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.listeners.pool_disposed();
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub built: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
    pub delay: Option<Duration>,
}

impl FakeConnector {
    pub fn with_delay(delay: Duration) -> Self {
        FakeConnector {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl PoolConnector for FakeConnector {
    type Pool = FakePool;
    type Error = FakeError;

    fn connect(&self, options: &PoolOptions) -> Result<FakePool, FakeError> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(FakeError(String::from("prefill failed")));
        }
        if options.server_list.is_empty() {
            return Err(FakeError(String::from("no servers to connect to")));
        }
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(FakePool {
            options: options.clone(),
            servers: ServerList::new(options.server_list.clone()),
            listeners: PoolListeners::new(),
            disposed: AtomicBool::new(false),
        })
    }
}

pub struct FakeSession {
    ring: Vec<TokenRange>,
}

impl TopologySession for FakeSession {
    type Error = FakeError;

    fn describe_ring(
        &mut self,
        _keyspace: &str,
    ) -> Result<Vec<TokenRange>, FakeError> {
        Ok(self.ring.clone())
    }
}

// Seeds without a ring are unreachable
#[derive(Clone, Default)]
pub struct FakeTopology {
    pub rings: Arc<Mutex<HashMap<Node, Vec<TokenRange>>>>,
    pub sessions: Arc<AtomicUsize>,
}

impl FakeTopology {
    pub fn set_ring(&self, seed: &str, endpoints: &[&str]) {
        let ring = endpoints
            .iter()
            .map(|e| {
                let node = Node::from_str(e).unwrap();
                TokenRange {
                    endpoint_details: vec![EndpointDetails::new(
                        node.host,
                        Some(node.port),
                    )],
                    ..Default::default()
                }
            })
            .collect();
        self.rings
            .lock()
            .unwrap()
            .insert(Node::from_str(seed).unwrap(), ring);
    }

    pub fn remove_ring(&self, seed: &str) {
        self.rings.lock().unwrap().remove(&Node::from_str(seed).unwrap());
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl TopologyService for FakeTopology {
    type Session = FakeSession;
    type Error = FakeError;

    fn open_session(&self, seed: &Node) -> Result<FakeSession, FakeError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        match self.rings.lock().unwrap().get(seed) {
            Some(ring) => Ok(FakeSession { ring: ring.clone() }),
            None => Err(FakeError(format!("{} refused the connection", seed))),
        }
    }
}

#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    pub fn new() -> Self {
        ManualClock(Arc::new(Mutex::new(Utc.ymd(2020, 1, 1).and_hms(0, 0, 0))))
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.0.lock().unwrap();
        *now = *now + chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// Copyright 2020 Joyent, Inc.

use std::error;

use crate::node::{Node, NodePort};

/// The connection details of one replica endpoint of a token range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EndpointDetails {
    pub host: String,
    /// Endpoints reported by older cluster versions carry no port.
    pub port: Option<NodePort>,
    pub datacenter: Option<String>,
    pub rack: Option<String>,
}

impl EndpointDetails {
    pub fn new<H: Into<String>>(host: H, port: Option<NodePort>) -> Self {
        EndpointDetails {
            host: host.into(),
            port,
            datacenter: None,
            rack: None,
        }
    }
}

/// One segment of a keyspace's ring description.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenRange {
    pub start_token: String,
    pub end_token: String,
    pub endpoint_details: Vec<EndpointDetails>,
}

/// A topology-query session opened against a single seed node.
pub trait TopologySession {
    type Error: error::Error;
    /// Describe the token ring of the given keyspace.
    fn describe_ring(
        &mut self,
        keyspace: &str,
    ) -> Result<Vec<TokenRange>, Self::Error>;
    /// End the session. The default does nothing.
    fn close(&mut self) {}
}

/// The cluster topology-query service used by node discovery.
///
/// Calls are expected to block until the seed answers or the attempt
/// fails.
pub trait TopologyService: Send + Sync {
    type Session: TopologySession;
    type Error: error::Error;
    /// Open a session against the given seed.
    fn open_session(&self, seed: &Node) -> Result<Self::Session, Self::Error>;
}

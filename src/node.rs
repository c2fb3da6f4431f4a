// Copyright 2020 Joyent, Inc.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The port assumed for a node when an address or an endpoint omits one.
pub const DEFAULT_NODE_PORT: NodePort = 9160;

/// The port number of a cluster node. This is a type alias for u16.
pub type NodePort = u16;
/// The hostname or IP address of a cluster node. This is a type alias for
/// String.
pub type NodeHost = String;

/// A member node of the cluster, identified by its `host:port` pair.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq)]
pub struct Node {
    /// The hostname or IP address of the node.
    pub host: NodeHost,
    /// The port of the node.
    pub port: NodePort,
}

impl Node {
    /// Return a new instance of `Node` given a host and `NodePort`.
    pub fn new<H: Into<NodeHost>>(host: H, port: NodePort) -> Self {
        Node {
            host: host.into(),
            port,
        }
    }
}

// IPv6 hosts are bracketed so the port delimiter stays unambiguous.
impl fmt::Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.host.contains(':') {
            write!(fmt, "[{}]:{}", self.host, self.port)
        } else {
            write!(fmt, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Node {
    type Err = Error;

    /// Parse a `host:port` string. A missing port means `DEFAULT_NODE_PORT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = s.trim();
        let invalid = || Error::InvalidNode(String::from(s));

        let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            match tail {
                "" => (host, None),
                _ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match addr.rsplit_once(':') {
                // A bare IPv6 address without brackets carries no port
                Some((host, _)) if host.contains(':') => (addr, None),
                Some((host, port)) => (host, Some(port)),
                None => (addr, None),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }

        let port = match port {
            Some(p) => p.parse::<NodePort>().map_err(|_| invalid())?,
            None => DEFAULT_NODE_PORT,
        };

        Ok(Node::new(host, port))
    }
}

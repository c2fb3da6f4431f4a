// Copyright 2020 Joyent, Inc.

use std::collections::BTreeSet;

use slog::{debug, info, warn, Logger};

use crate::error::Error;
use crate::node::{Node, DEFAULT_NODE_PORT};
use crate::settings::Settings;
use crate::topology::{TokenRange, TopologyService, TopologySession};

/// Resolves the member nodes of a cluster from a list of seeds.
#[derive(Debug)]
pub struct NodeDiscovery<T>
where
    T: TopologyService,
{
    topology: T,
    log: Logger,
}

impl<T> NodeDiscovery<T>
where
    T: TopologyService,
{
    pub fn new(topology: T, log: Logger) -> Self {
        NodeDiscovery { topology, log }
    }

    /// Return the union of the seeds and every node the seeds report in the
    /// ring description of `keyspace`.
    ///
    /// Seeds are queried one after another. The first seed that cannot be
    /// reached or fails its ring query fails the whole call; there is no
    /// partial result. With discovery turned off in `settings` the seeds are
    /// returned as given and no topology query is made.
    pub fn resolve_nodes(
        &self,
        seeds: &[Node],
        keyspace: &str,
        settings: &Settings,
    ) -> Result<BTreeSet<Node>, Error> {
        let mut nodes: BTreeSet<Node> = seeds.iter().cloned().collect();

        if !settings.discover_nodes {
            warn!(self.log, "cluster node discovery is off");
            return Ok(nodes);
        }

        info!(self.log, "retrieving nodes from seeds";
            "seeds" => format!("{:?}", seeds_display(seeds)),
            "keyspace" => keyspace);

        for seed in seeds {
            let ring = self.describe_ring(seed, keyspace)?;
            ring.iter()
                .filter_map(|range| self.range_endpoint(seed, range))
                .for_each(|node| {
                    if nodes.insert(node.clone()) {
                        debug!(self.log, "discovered node {} from seed {}",
                            node, seed);
                    }
                });
        }

        info!(self.log, "resolved {} nodes", nodes.len());
        Ok(nodes)
    }

    fn describe_ring(
        &self,
        seed: &Node,
        keyspace: &str,
    ) -> Result<Vec<TokenRange>, Error> {
        let mut session = self.topology.open_session(seed).map_err(|e| {
            Error::SeedUnreachable {
                seed: seed.to_string(),
                err: e.to_string(),
            }
        })?;

        let result = session.describe_ring(keyspace).map_err(|e| {
            Error::TopologyQueryFailure {
                seed: seed.to_string(),
                keyspace: String::from(keyspace),
                err: e.to_string(),
            }
        });
        session.close();
        result
    }

    // Only the first endpoint of each range is considered.
    fn range_endpoint(&self, seed: &Node, range: &TokenRange) -> Option<Node> {
        match range.endpoint_details.first() {
            Some(endpoint) => Some(Node::new(
                endpoint.host.clone(),
                endpoint.port.unwrap_or(DEFAULT_NODE_PORT),
            )),
            None => {
                warn!(self.log, "seed {} reported token range ({}, {}] \
                    without endpoints", seed, range.start_token,
                    range.end_token);
                None
            }
        }
    }
}

fn seeds_display(seeds: &[Node]) -> Vec<String> {
    seeds.iter().map(Node::to_string).collect()
}

// Copyright 2020 Joyent, Inc.

use std::io::Error as IOError;

use thiserror::Error;

/// The errors surfaced by the pool cache.
///
/// Connection-level failures of a live pool never appear here. Those are
/// handled by ejecting the failed host from the pool's server list.
#[derive(Error, Debug)]
pub enum Error {
    #[error("keyspace name must not be empty")]
    EmptyKeyspace,
    #[error("invalid node address \"{0}\"")]
    InvalidNode(String),
    #[error("unable to open a topology session against seed {seed}: {err}")]
    SeedUnreachable { seed: String, err: String },
    #[error("ring description of keyspace {keyspace} from seed {seed} failed: {err}")]
    TopologyQueryFailure {
        seed: String,
        keyspace: String,
        err: String,
    },
    #[error("connection pool construction for keyspace {keyspace} failed: {err}")]
    PoolConstructionFailure { keyspace: String, err: String },
    #[error("the pool cache is stopped")]
    CacheStopped,
    #[error("settings parsing failure: {0}")]
    SettingsParse(String),
    #[error("I/O failure")]
    IOError(#[from] IOError),
}

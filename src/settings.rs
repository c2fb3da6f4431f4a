// Copyright 2020 Joyent, Inc.

use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde_derive::Deserialize;

use crate::error::Error;

/// Process-level settings consulted by the pool cache.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Query the cluster topology for the full node set when building a
    /// pool. When false the seed hosts are used as given.
    pub discover_nodes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            discover_nodes: true,
        }
    }
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        toml::from_str(s).map_err(|e| Error::SettingsParse(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        Settings::from_toml_str(&contents)
    }
}

/// A `Settings` handle shared between the pool cache and whoever manages
/// the process configuration. Updates are seen by the next pool rebuild.
#[derive(Clone, Debug, Default)]
pub struct SharedSettings(Arc<RwLock<Settings>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        SharedSettings(Arc::new(RwLock::new(settings)))
    }

    /// A copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, settings: Settings) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn set_discover_nodes(&self, discover_nodes: bool) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .discover_nodes = discover_nodes;
    }
}

impl From<Settings> for SharedSettings {
    fn from(settings: Settings) -> Self {
        SharedSettings::new(settings)
    }
}

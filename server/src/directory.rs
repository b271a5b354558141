//! Read-only model of modes and the servers they group
//!
//! A [`ServerDirectory`] is built once per configuration load and never
//! mutated afterwards. Every view over it skips inert entries (missing display
//! name or address) and preserves configured order, so the flattened index of
//! a server is stable for the lifetime of one snapshot.

use crate::error::DirectoryError;

/// A configured server within a mode
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntry {
    /// Key unique within the owning mode
    pub key: String,
    /// host:port used for status queries
    pub address: String,
    /// Public host:port shown to players instead of `address`
    pub alias_address: Option<String>,
    pub display_name: String,
}

impl ServerEntry {
    pub fn new(key: impl Into<String>, address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            address: address.into(),
            alias_address: None,
            display_name: display_name.into(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.alias_address = (!alias.is_empty()).then_some(alias);
        self
    }

    /// Entries without a display name or address are never queried or shown
    pub fn is_usable(&self) -> bool {
        !self.display_name.is_empty() && !self.address.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub key: String,
    servers: Vec<ServerEntry>,
}

impl Mode {
    pub fn new(key: impl Into<String>, servers: Vec<ServerEntry>) -> Self {
        Self {
            key: key.into(),
            servers,
        }
    }

    pub fn servers(&self) -> impl Iterator<Item = &ServerEntry> {
        self.servers.iter().filter(|server| server.is_usable())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerDirectory {
    modes: Vec<Mode>,
}

impl ServerDirectory {
    /// Mode keys are expected to be unique; configuration loading enforces it.
    pub fn new(modes: Vec<Mode>) -> Self {
        Self { modes }
    }

    /// Mode keys in configured order. Modes without a usable server are left out.
    pub fn modes(&self) -> Vec<&str> {
        self.modes
            .iter()
            .filter(|mode| mode.servers().next().is_some())
            .map(|mode| mode.key.as_str())
            .collect()
    }

    /// Flattened view: modes in order, then servers in order within each mode
    pub fn all_servers(&self) -> Vec<(&str, &ServerEntry)> {
        self.modes
            .iter()
            .flat_map(|mode| mode.servers().map(move |server| (mode.key.as_str(), server)))
            .collect()
    }

    pub fn servers_in(&self, mode_key: &str) -> Result<Vec<&ServerEntry>, DirectoryError> {
        self.modes
            .iter()
            .find(|mode| mode.key == mode_key)
            .map(|mode| mode.servers().collect())
            .ok_or_else(|| DirectoryError::UnknownMode(mode_key.to_string()))
    }

    pub fn server_count(&self) -> usize {
        self.modes.iter().map(|mode| mode.servers().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.server_count() == 0
    }

    /// Entries that will be skipped, as `(mode, server key)`
    pub fn inert_servers(&self) -> Vec<(&str, &str)> {
        self.modes
            .iter()
            .flat_map(|mode| {
                mode.servers
                    .iter()
                    .filter(|server| !server.is_usable())
                    .map(move |server| (mode.key.as_str(), server.key.as_str()))
            })
            .collect()
    }
}

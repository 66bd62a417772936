//! Partition-to-storage-node routing table.
//!
//! The table is plain configuration: it is built once at startup and handed
//! to the [`StorageClient`](crate::client::StorageClient). Partitions without
//! an explicit route fall back to the default address rather than failing,
//! so an incomplete table degrades to sending traffic to the default node.
//!
//! # Text Form
//!
//! ```text
//! 0=http://localhost:8081,1=http://localhost:8081,*=http://localhost:8081
//! ```
//!
//! `*` sets the default address. Whitespace around entries is ignored.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{ConfigError, ShardlogError};

/// Address used for partitions with no explicit route.
pub const DEFAULT_STORAGE_ADDRESS: &str = "http://localhost:8081";

/// Static mapping from partition index to storage node base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    routes: BTreeMap<u32, String>,
    default_address: String,
}

impl RoutingTable {
    /// Creates an empty table whose every partition resolves to `default_address`.
    pub fn new(default_address: impl Into<String>) -> Self {
        Self {
            routes: BTreeMap::new(),
            default_address: normalize(default_address.into()),
        }
    }

    /// The reference two-node layout: partitions 0–1 on port 8081, 2–3 on 8082.
    pub fn reference() -> Self {
        Self::new(DEFAULT_STORAGE_ADDRESS)
            .with_route(0, "http://localhost:8081")
            .with_route(1, "http://localhost:8081")
            .with_route(2, "http://localhost:8082")
            .with_route(3, "http://localhost:8082")
    }

    /// Routes `partition` to `address`, replacing any previous route.
    #[must_use]
    pub fn with_route(mut self, partition: u32, address: impl Into<String>) -> Self {
        self.routes.insert(partition, normalize(address.into()));
        self
    }

    /// Routes every partition in `0..count` to `address`.
    #[must_use]
    pub fn with_all(mut self, count: u32, address: &str) -> Self {
        for partition in 0..count {
            self.routes.insert(partition, normalize(address.to_string()));
        }
        self
    }

    /// Returns the base URL of the node serving `partition`.
    pub fn resolve(&self, partition: u32) -> &str {
        self.routes
            .get(&partition)
            .map_or(self.default_address.as_str(), String::as_str)
    }

    /// The fallback address for unmapped partitions.
    pub fn default_address(&self) -> &str {
        &self.default_address
    }

    /// Explicit routes in partition order.
    pub fn routes(&self) -> impl Iterator<Item = (u32, &str)> {
        self.routes.iter().map(|(p, a)| (*p, a.as_str()))
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::reference()
    }
}

impl FromStr for RoutingTable {
    type Err = ShardlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut table = Self::new(DEFAULT_STORAGE_ADDRESS);

        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = |reason: &str| ConfigError::InvalidRoute {
                entry: entry.to_string(),
                reason: reason.to_string(),
            };

            let (key, address) = entry
                .split_once('=')
                .ok_or_else(|| invalid("expected <partition>=<address>"))?;
            let (key, address) = (key.trim(), address.trim());

            if address.is_empty() {
                return Err(invalid("empty address").into());
            }

            if key == "*" {
                table.default_address = normalize(address.to_string());
            } else {
                let partition: u32 = key
                    .parse()
                    .map_err(|_| invalid("partition must be a non-negative integer"))?;
                table = table.with_route(partition, address);
            }
        }

        Ok(table)
    }
}

fn normalize(address: String) -> String {
    match address.strip_suffix('/') {
        Some(trimmed) => trimmed.to_string(),
        None => address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_table() {
        let table = RoutingTable::reference();
        assert_eq!(table.resolve(0), "http://localhost:8081");
        assert_eq!(table.resolve(1), "http://localhost:8081");
        assert_eq!(table.resolve(2), "http://localhost:8082");
        assert_eq!(table.resolve(3), "http://localhost:8082");
    }

    #[test]
    fn test_unmapped_partition_uses_default() {
        let table = RoutingTable::reference();
        assert_eq!(table.resolve(17), DEFAULT_STORAGE_ADDRESS);

        let table = RoutingTable::new("http://fallback:9000");
        assert_eq!(table.resolve(0), "http://fallback:9000");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let table = RoutingTable::new("http://a:1/").with_route(0, "http://b:2/");
        assert_eq!(table.default_address(), "http://a:1");
        assert_eq!(table.resolve(0), "http://b:2");
    }

    #[test]
    fn test_with_all() {
        let table = RoutingTable::new("http://default").with_all(4, "http://single:8081");
        for p in 0..4 {
            assert_eq!(table.resolve(p), "http://single:8081");
        }
        assert_eq!(table.resolve(4), "http://default");
    }

    #[test]
    fn test_parse_text_form() {
        let table: RoutingTable = " 0=http://a:1, 2=http://b:2 ,*=http://c:3".parse().unwrap();

        assert_eq!(table.resolve(0), "http://a:1");
        assert_eq!(table.resolve(1), "http://c:3");
        assert_eq!(table.resolve(2), "http://b:2");
        let routes: Vec<_> = table.routes().collect();
        assert_eq!(routes, vec![(0, "http://a:1"), (2, "http://b:2")]);
    }

    #[test]
    fn test_parse_empty_is_default_only() {
        let table: RoutingTable = "".parse().unwrap();
        assert_eq!(table.routes().count(), 0);
        assert_eq!(table.resolve(0), DEFAULT_STORAGE_ADDRESS);
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!("0http://a".parse::<RoutingTable>().is_err());
        assert!("x=http://a".parse::<RoutingTable>().is_err());
        assert!("-1=http://a".parse::<RoutingTable>().is_err());
        assert!("0=".parse::<RoutingTable>().is_err());
    }
}

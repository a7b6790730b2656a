//! Endpoint selection: turn a broker service name into one address to dial.
//!
//! A service name is either a single `host:port` or a comma-separated list
//! of them. Successive selections against a list walk it in order.
//!
//! ```
//! use tubemq_selector::{IpSelector, Selector};
//!
//! let selector = IpSelector::new();
//! let node = selector.select("broker-a:8715,broker-b:8715").unwrap();
//! assert_eq!(node.address, "broker-a:8715");
//! assert!(node.has_next);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

/// Separator between addresses in a service name.
pub const ADDRESS_SEPARATOR: char = ',';

/// Selection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The service name holds no address.
    #[error("service name is empty")]
    EmptyServiceName,

    /// No selector is registered under this name.
    #[error("unknown selector {0:?}")]
    UnknownSelector(String),
}

/// Result type alias for selection.
pub type Result<T> = std::result::Result<T, SelectorError>;

/// A selected endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The service name the address was selected from.
    pub service_name: String,
    /// The address to dial.
    pub address: String,
    /// Whether the list holds further addresses after this one.
    pub has_next: bool,
}

/// Picks the address to use for a service name.
pub trait Selector: Send + Sync {
    /// Select the next address for `service_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::EmptyServiceName`] if the name contains no
    /// address.
    fn select(&self, service_name: &str) -> Result<Node>;
}

/// Selects from a literal address list, in order.
///
/// Each distinct service name keeps its own cursor. After the last address
/// the cursor wraps back to the first.
#[derive(Debug, Default)]
pub struct IpSelector {
    cursors: Mutex<HashMap<String, usize>>,
}

impl IpSelector {
    /// Create a selector with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for IpSelector {
    fn select(&self, service_name: &str) -> Result<Node> {
        let addresses: Vec<&str> = service_name
            .split(ADDRESS_SEPARATOR)
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .collect();

        if addresses.is_empty() {
            return Err(SelectorError::EmptyServiceName);
        }

        if let [address] = addresses.as_slice() {
            return Ok(Node {
                service_name: service_name.to_string(),
                address: (*address).to_string(),
                has_next: false,
            });
        }

        let index = {
            let mut cursors = self.cursors.lock();
            let cursor = cursors.entry(service_name.to_string()).or_insert(0);
            // The list may have shrunk since the cursor was stored.
            let index = *cursor % addresses.len();
            *cursor = (index + 1) % addresses.len();
            index
        };

        let node = Node {
            service_name: service_name.to_string(),
            address: addresses[index].to_string(),
            has_next: index + 1 < addresses.len(),
        };
        trace!(service_name, address = %node.address, has_next = node.has_next, "selected");

        Ok(node)
    }
}

/// Known selector flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    /// Literal IP addresses.
    Ip,
    /// Host names, resolved by the dialer.
    Dns,
}

impl SelectorKind {
    /// The selector's registered name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Dns => "dns",
        }
    }

    /// Build a selector of this kind.
    ///
    /// Both kinds walk a literal list; host names are left to the dialer to
    /// resolve.
    #[must_use]
    pub fn build(self) -> Arc<dyn Selector> {
        match self {
            Self::Ip | Self::Dns => Arc::new(IpSelector::new()),
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectorKind {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ip" => Ok(Self::Ip),
            "dns" => Ok(Self::Dns),
            other => Err(SelectorError::UnknownSelector(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_ip() {
        let selector = IpSelector::new();
        let node = selector.select("192.168.0.1:9092").unwrap();

        assert_eq!(node.address, "192.168.0.1:9092");
        assert_eq!(node.service_name, "192.168.0.1:9092");
        assert!(!node.has_next);
    }

    #[test]
    fn test_single_dns() {
        let selector = "dns".parse::<SelectorKind>().unwrap().build();
        let node = selector.select("tubemq:8081").unwrap();

        assert_eq!(node.address, "tubemq:8081");
        assert!(!node.has_next);
    }

    #[test]
    fn test_round_robin_list() {
        let service_name = "a,b,c,d";
        let selector = IpSelector::new();

        let picks: Vec<(String, bool)> = (0..4)
            .map(|_| {
                let node = selector.select(service_name).unwrap();
                assert_eq!(node.service_name, service_name);
                (node.address, node.has_next)
            })
            .collect();

        assert_eq!(
            picks,
            vec![
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("c".to_string(), true),
                ("d".to_string(), false),
            ]
        );

        // Wraps back to the start.
        assert_eq!(selector.select(service_name).unwrap().address, "a");
    }

    #[test]
    fn test_cursor_per_service_name() {
        let selector = IpSelector::new();
        assert_eq!(selector.select("a,b").unwrap().address, "a");
        assert_eq!(selector.select("x,y").unwrap().address, "x");
        assert_eq!(selector.select("a,b").unwrap().address, "b");
    }

    #[test]
    fn test_whitespace_and_empty_entries() {
        let selector = IpSelector::new();
        let node = selector.select(" a:1 , ,b:2,").unwrap();
        assert_eq!(node.address, "a:1");
        assert!(node.has_next);

        let node = selector.select(" a:1 , ,b:2,").unwrap();
        assert_eq!(node.address, "b:2");
        assert!(!node.has_next);
    }

    #[test]
    fn test_empty_service_name() {
        let selector = IpSelector::new();
        assert_eq!(selector.select(""), Err(SelectorError::EmptyServiceName));
        assert_eq!(selector.select(" , "), Err(SelectorError::EmptyServiceName));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("ip".parse(), Ok(SelectorKind::Ip));
        assert_eq!("dns".parse(), Ok(SelectorKind::Dns));
        assert_eq!(
            "zookeeper".parse::<SelectorKind>(),
            Err(SelectorError::UnknownSelector("zookeeper".to_string()))
        );
        assert_eq!(SelectorKind::Dns.to_string(), "dns");
    }

    proptest! {
        #[test]
        fn prop_visits_every_address_in_order(count in 2usize..16) {
            let addresses: Vec<String> = (0..count).map(|i| format!("10.0.0.{i}:8715")).collect();
            let service_name = addresses.join(",");
            let selector = IpSelector::new();

            for (index, expected) in addresses.iter().enumerate() {
                let node = selector.select(&service_name).unwrap();
                prop_assert_eq!(&node.address, expected);
                prop_assert_eq!(node.has_next, index + 1 < count);
            }
        }
    }
}

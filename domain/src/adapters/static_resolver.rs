use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{HostResolver, ResolveError};

/// Resolver backed by a fixed allow-list of host names.
///
/// Listed hosts resolve to the loopback address, anything else fails. IPv4
/// literals always resolve to themselves, matching what a system resolver does.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    known: Arc<BTreeSet<String>>,
    lookups: Arc<AtomicUsize>,
}

impl StaticResolver {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self {
            known: Arc::new(known),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of resolve calls served so far (shared across clones).
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }
}

impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        if self.known.contains(&host.to_ascii_lowercase()) {
            Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])
        } else {
            Err(ResolveError::NoAddresses(host.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_hosts_resolve_case_insensitively() {
        let r = StaticResolver::new(["Example.COM", " "]);
        assert_eq!(r.hosts().collect::<Vec<_>>(), vec!["example.com"]);
        assert!(r.resolve("example.com").await.is_ok());
        assert!(r.resolve("EXAMPLE.com").await.is_ok());
        assert!(matches!(
            r.resolve("other.com").await,
            Err(ResolveError::NoAddresses(_))
        ));
        assert_eq!(r.lookups(), 3);
    }

    #[tokio::test]
    async fn ip_literals_resolve_to_themselves() {
        let r = StaticResolver::default();
        let addrs = r.resolve("10.0.0.7").await.unwrap();
        assert_eq!(addrs, vec!["10.0.0.7".parse::<IpAddr>().unwrap()]);
    }
}

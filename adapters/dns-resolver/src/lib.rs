//! dns-resolver — asynchronous name resolution for the `HostResolver` port.
//!
//! Lookups run on `hickory-resolver`, which converts internationalized names
//! to their ASCII (`xn--`) form and is fully async. [`Bounded`] caps any
//! resolver with a timeout; dropping a timed-out lookup cancels it, so a
//! stalled name server only suspends the request that asked.

use std::net::IpAddr;
use std::time::Duration;

use domain::{HostResolver, ResolveError};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::Name;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

/// Default upper bound on a single lookup.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// ASCII query name for `host`. Unicode labels are IDNA-encoded.
pub fn query_name(host: &str) -> Result<String, ResolveError> {
    let name = Name::from_utf8(host).map_err(|e| ResolveError::Lookup(e.to_string()))?;
    Ok(name.to_ascii().trim_end_matches('.').to_string())
}

/// Resolver using the system's name servers (`/etc/resolv.conf` and the
/// hosts file), falling back to public defaults when those can't be read.
#[derive(Clone)]
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// `timeout` bounds each query sent to a name server.
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                warn!(err = %e, "system resolver config unavailable, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// System resolver capped at `timeout` end to end.
    pub fn bounded(timeout: Duration) -> Bounded<Self> {
        Bounded::new(Self::new(timeout), timeout)
    }
}

impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let name = query_name(host)?;
        match self.resolver.lookup_ip(name.as_str()).await {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().collect();
                if addrs.is_empty() {
                    return Err(ResolveError::NoAddresses(host.to_string()));
                }
                Ok(addrs)
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    debug!(%host, %name, "no records");
                    Err(ResolveError::NoAddresses(host.to_string()))
                }
                _ => {
                    debug!(%host, %name, err = %e, "lookup failed");
                    Err(ResolveError::Lookup(e.to_string()))
                }
            },
        }
    }
}

/// Wraps a resolver so each lookup gives up after `timeout`.
#[derive(Clone, Debug)]
pub struct Bounded<H> {
    inner: H,
    timeout: Duration,
}

impl<H: HostResolver> Bounded<H> {
    pub fn new(inner: H, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: HostResolver> HostResolver for Bounded<H> {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        match tokio::time::timeout(self.timeout, self.inner.resolve(host)).await {
            Ok(result) => result,
            Err(_) => {
                let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(%host, millis, "lookup timed out");
                Err(ResolveError::Timeout {
                    host: host.to_string(),
                    millis,
                })
            }
        }
    }
}

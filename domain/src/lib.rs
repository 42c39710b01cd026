//! Domain library for the URL Shortener.
//!
//! Holds the domain types, ports (traits), and error definitions. Keep
//! adapters and IO concerns out of this crate: name resolution and storage
//! are reached only through [`HostResolver`] and [`ShortUrlRepository`].

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

/// Integer identifier assigned to a stored URL. Codes start at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortCode(u64);

impl ShortCode {
    /// The first code handed out by a fresh store.
    pub const FIRST: ShortCode = ShortCode(1);

    pub fn new(value: u64) -> Result<Self, CoreError> {
        if value == 0 {
            return Err(CoreError::InvalidCode("zero".into()));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The code issued right after this one.
    pub fn next(&self) -> ShortCode {
        ShortCode(self.0.saturating_add(1))
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ShortCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .parse()
            .map_err(|_| CoreError::InvalidCode(s.to_string()))?;
        Self::new(value)
    }
}

/// A submitted URL with its leading `scheme://` removed; the persisted form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    /// Strip the scheme prefix from `raw`. See [`validate::strip_scheme`].
    pub fn from_raw(raw: &str) -> Self {
        Self(validate::strip_scheme(raw).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Stored mapping between a normalized URL and its short code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortUrlRecord {
    pub original_url: String,
    pub short_code: ShortCode,
}

impl ShortUrlRecord {
    pub fn new(original_url: NormalizedUrl, short_code: ShortCode) -> Self {
        Self {
            original_url: original_url.into_string(),
            short_code,
        }
    }

    /// Redirect target for this record. The scheme is always https.
    pub fn redirect_target(&self) -> String {
        format!("https://{}", self.original_url)
    }
}

/// Name-resolution port used to confirm a host is reachable.
pub trait HostResolver: Send + Sync {
    /// Resolve `host` to its addresses. An empty answer counts as a failure.
    fn resolve(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<Vec<IpAddr>, ResolveError>> + Send;
}

/// Repository port for persisting and loading short URL records.
///
/// Implementations are the single writer of records and must make
/// `find_or_create` atomic: concurrent calls with the same URL yield the
/// same record.
pub trait ShortUrlRepository: Send + Sync {
    /// Return the record for `url`, creating it with the next code if absent.
    fn find_or_create(&self, url: &NormalizedUrl) -> Result<ShortUrlRecord, StoreError>;
    /// Exact-match lookup by code.
    fn find_by_code(&self, code: ShortCode) -> Result<Option<ShortUrlRecord>, StoreError>;
}

/// Why a submitted string was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed url syntax")]
    MalformedSyntax,
    #[error("host {0} could not be resolved")]
    UnresolvableHost(String),
}

/// Failure reported by a [`HostResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no addresses found for {0}")]
    NoAddresses(String),
    #[error("lookup of {host} timed out after {millis}ms")]
    Timeout { host: String, millis: u64 },
    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Persistence-layer failure with the backend's error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error {code}: {message}")]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

impl StoreError {
    pub fn new<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid short code: {0}")]
    InvalidCode(String),
    #[error("not found")]
    NotFound,
}

pub mod adapters;
pub mod service;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_code_parses_positive_integers() {
        let c: ShortCode = "42".parse().expect("valid code");
        assert_eq!(c.get(), 42);
        assert_eq!(c.to_string(), "42");
    }

    #[test]
    fn short_code_rejects_zero_and_garbage() {
        assert!(matches!("0".parse::<ShortCode>(), Err(CoreError::InvalidCode(_))));
        assert!(matches!("abc".parse::<ShortCode>(), Err(CoreError::InvalidCode(_))));
        assert!(matches!("-1".parse::<ShortCode>(), Err(CoreError::InvalidCode(_))));
    }

    #[test]
    fn redirect_target_forces_https() {
        let rec = ShortUrlRecord::new(NormalizedUrl::from_raw("http://example.com/a"), ShortCode::FIRST);
        assert_eq!(rec.original_url, "example.com/a");
        assert_eq!(rec.redirect_target(), "https://example.com/a");
    }
}

//! URL acceptance rules: syntax check, hostname extraction, reachability.
//!
//! Acceptance and normalization deliberately use different patterns. The
//! acceptance grammar only admits `http`/`https`, while [`strip_scheme`]
//! removes any `word:` prefix followed by `//`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::{HostResolver, NormalizedUrl, ValidationError};

/// Acceptance grammar: scheme, optional userinfo, host (IPv4 literal,
/// `localhost`, or a dotted name with an alphabetic TLD of 2+ letters),
/// optional port, optional path with query and fragment.
static URL_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(http|https)://",
        r"(([a-zA-Z0-9$\-_.+!*'(),;:&=]|%[0-9a-fA-F]{2})+@)?",
        r"(",
        r"((25[0-5]|2[0-4][0-9]|[0-1][0-9][0-9]|[1-9][0-9]|[0-9])",
        r"(\.(25[0-5]|2[0-4][0-9]|[0-1][0-9][0-9]|[1-9][0-9]|[0-9])){3})",
        r"|localhost",
        r"|([a-zA-Z0-9\-\x{00C0}-\x{017F}]+\.)+([a-zA-Z]{2,})",
        r")",
        r"(:[0-9]+)?",
        r"(/",
        r"(([a-zA-Z0-9$\-_.+!*'(),;:@&=]|%[0-9a-fA-F]{2})*",
        r"(/([a-zA-Z0-9$\-_.+!*'(),;:@&=]|%[0-9a-fA-F]{2})*)*)?",
        r"(\?([a-zA-Z0-9$\-_.+!*'(),;:@&=/?]|%[0-9a-fA-F]{2})*)?",
        r"(#([a-zA-Z0-9$\-_.+!*'(),;:@&=/?]|%[0-9a-fA-F]{2})*)?",
        r")?$",
    ))
    .expect("url grammar is a valid regex")
});

/// Authority part: everything after `http(s)://` up to `/`, `?`, `#` or end.
static AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://([^/?#]+)(?:[/?#]|$)").expect("authority is a valid regex")
});

/// Any leading `scheme:` (word characters) followed by `//`, or a bare `//`.
static SCHEME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9_]+:)?//").expect("scheme prefix is a valid regex")
});

/// Check `candidate` against the acceptance grammar.
pub fn check_syntax(candidate: &str) -> Result<(), ValidationError> {
    if URL_GRAMMAR.is_match(candidate) {
        Ok(())
    } else {
        Err(ValidationError::MalformedSyntax)
    }
}

/// Extract the authority (text between `scheme://` and the first `/`, `?`,
/// `#`, or end of string). Userinfo and port are still attached.
pub fn extract_authority(candidate: &str) -> Option<&str> {
    AUTHORITY
        .captures(candidate)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Reduce an authority to the bare host handed to the resolver.
pub fn host_of(authority: &str) -> &str {
    let without_userinfo = authority
        .rsplit_once('@')
        .map(|(_, h)| h)
        .unwrap_or(authority);
    without_userinfo
        .split_once(':')
        .map(|(h, _)| h)
        .unwrap_or(without_userinfo)
}

/// Remove the leading scheme prefix. Not limited to the accepted schemes.
pub fn strip_scheme(raw: &str) -> &str {
    match SCHEME_PREFIX.find(raw) {
        Some(m) => &raw[m.end()..],
        None => raw,
    }
}

/// Full validation pipeline over an injected name resolver.
pub struct UrlValidator<H: HostResolver> {
    resolver: H,
}

impl<H: HostResolver> UrlValidator<H> {
    pub fn new(resolver: H) -> Self {
        Self { resolver }
    }

    /// Validate `candidate` and return its normalized (scheme-less) form.
    ///
    /// Performs exactly one resolver call when the syntax check passes.
    pub async fn validate(&self, candidate: &str) -> Result<NormalizedUrl, ValidationError> {
        check_syntax(candidate)?;
        let host = extract_authority(candidate)
            .map(host_of)
            .ok_or(ValidationError::MalformedSyntax)?;

        match self.resolver.resolve(host).await {
            Ok(addrs) if !addrs.is_empty() => {
                debug!(%host, addrs = addrs.len(), "host resolved");
                Ok(NormalizedUrl::from_raw(candidate))
            }
            Ok(_) => {
                debug!(%host, "host resolved to no addresses");
                Err(ValidationError::UnresolvableHost(host.to_string()))
            }
            Err(e) => {
                debug!(%host, err = %e, "host resolution failed");
                Err(ValidationError::UnresolvableHost(host.to_string()))
            }
        }
    }
}

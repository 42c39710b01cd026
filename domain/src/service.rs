use crate::validate::UrlValidator;
use crate::{CoreError, HostResolver, ShortCode, ShortUrlRecord, ShortUrlRepository};

/// Application service orchestrating creation and resolution of short URLs.
///
/// Generic over the repository and the name resolver; both are injected at
/// construction so the service holds no ambient state.
pub struct ShortUrlService<R: ShortUrlRepository, H: HostResolver> {
    repo: R,
    validator: UrlValidator<H>,
}

impl<R: ShortUrlRepository, H: HostResolver> ShortUrlService<R, H> {
    pub fn new(repo: R, resolver: H) -> Self {
        Self {
            repo,
            validator: UrlValidator::new(resolver),
        }
    }

    /// Validate `raw` and return the record for it, creating one if needed.
    pub async fn shorten(&self, raw: &str) -> Result<ShortUrlRecord, CoreError> {
        let normalized = self.validator.validate(raw).await?;
        Ok(self.repo.find_or_create(&normalized)?)
    }

    /// Resolve a code to its record.
    pub fn resolve(&self, code: ShortCode) -> Result<ShortUrlRecord, CoreError> {
        match self.repo.find_by_code(code)? {
            Some(record) => Ok(record),
            None => Err(CoreError::NotFound),
        }
    }

    /// Parse a path segment and resolve it.
    pub fn resolve_str(&self, code: &str) -> Result<ShortUrlRecord, CoreError> {
        self.resolve(code.parse()?)
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_repo::InMemoryRepo;
    use crate::adapters::static_resolver::StaticResolver;
    use crate::{NormalizedUrl, StoreError, ValidationError};

    fn svc() -> ShortUrlService<InMemoryRepo, StaticResolver> {
        ShortUrlService::new(
            InMemoryRepo::new(),
            StaticResolver::new(["www.example.com", "example.org"]),
        )
    }

    #[tokio::test]
    async fn shorten_then_resolve() {
        let svc = svc();
        let created = svc.shorten("https://www.example.com").await.expect("created");
        assert_eq!(created.original_url, "www.example.com");
        assert_eq!(created.short_code, ShortCode::FIRST);

        let found = svc.resolve(created.short_code).unwrap();
        assert_eq!(found.redirect_target(), "https://www.example.com");
    }

    #[tokio::test]
    async fn shorten_is_idempotent() {
        let svc = svc();
        let a = svc.shorten("https://www.example.com").await.unwrap();
        let b = svc.shorten("https://www.example.com").await.unwrap();
        assert_eq!(a.short_code, b.short_code);
    }

    #[tokio::test]
    async fn distinct_urls_get_increasing_codes() {
        let svc = svc();
        let mut last = None;
        for path in ["a", "b", "c", "d"] {
            let rec = svc
                .shorten(&format!("https://example.org/{path}"))
                .await
                .unwrap();
            if let Some(prev) = last {
                assert!(rec.short_code > prev);
            }
            last = Some(rec.short_code);
        }
    }

    #[tokio::test]
    async fn validation_errors_surface() {
        let svc = svc();
        let err = svc.shorten("ftp://example.org").await.unwrap_err();
        assert_eq!(err, CoreError::Validation(ValidationError::MalformedSyntax));
        let err = svc.shorten("https://unknown.example.net").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::UnresolvableHost(_))
        ));
        assert!(svc.repo().is_empty().unwrap());
    }

    #[test]
    fn resolve_not_found_and_bad_code() {
        let svc = svc();
        assert_eq!(svc.resolve_str("999").unwrap_err(), CoreError::NotFound);
        assert!(matches!(
            svc.resolve_str("abc").unwrap_err(),
            CoreError::InvalidCode(_)
        ));
    }

    struct BrokenRepo;

    impl ShortUrlRepository for BrokenRepo {
        fn find_or_create(&self, _url: &NormalizedUrl) -> Result<ShortUrlRecord, StoreError> {
            Err(StoreError::new("11000", "write failed"))
        }
        fn find_by_code(&self, _code: ShortCode) -> Result<Option<ShortUrlRecord>, StoreError> {
            Err(StoreError::new("6", "connection lost"))
        }
    }

    #[tokio::test]
    async fn store_errors_carry_code() {
        let svc = ShortUrlService::new(BrokenRepo, StaticResolver::new(["example.org"]));
        match svc.shorten("https://example.org").await {
            Err(CoreError::Store(e)) => assert_eq!(e.code, "11000"),
            other => panic!("expected store error, got {other:?}"),
        }
        assert!(matches!(svc.resolve(ShortCode::FIRST), Err(CoreError::Store(_))));
    }
}

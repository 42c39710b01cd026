use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::{NormalizedUrl, ShortCode, ShortUrlRecord, ShortUrlRepository, StoreError};

/// Simple in-memory repository for tests and demos. Lookup and insert run
/// under one mutex, so `find_or_create` is atomic.
pub struct InMemoryRepo {
    inner: Mutex<Tables>,
}

struct Tables {
    by_code: BTreeMap<ShortCode, ShortUrlRecord>,
    by_url: HashMap<String, ShortCode>,
    next: ShortCode,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tables {
                by_code: BTreeMap::new(),
                by_url: HashMap::new(),
                next: ShortCode::FIRST,
            }),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.inner.lock().map_err(|_| poisoned())?.by_code.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::new("mutex_poisoned", "in-memory store mutex poisoned")
}

impl ShortUrlRepository for InMemoryRepo {
    fn find_or_create(&self, url: &NormalizedUrl) -> Result<ShortUrlRecord, StoreError> {
        let mut tables = self.inner.lock().map_err(|_| poisoned())?;
        if let Some(code) = tables.by_url.get(url.as_str()) {
            if let Some(existing) = tables.by_code.get(code) {
                return Ok(existing.clone());
            }
        }

        let code = tables.next;
        tables.next = code.next();
        let record = ShortUrlRecord::new(url.clone(), code);
        tables.by_url.insert(record.original_url.clone(), code);
        tables.by_code.insert(code, record.clone());
        Ok(record)
    }

    fn find_by_code(&self, code: ShortCode) -> Result<Option<ShortUrlRecord>, StoreError> {
        let tables = self.inner.lock().map_err(|_| poisoned())?;
        Ok(tables.by_code.get(&code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::from_raw(s)
    }

    #[test]
    fn codes_start_at_one_and_increase() {
        let repo = InMemoryRepo::new();
        let a = repo.find_or_create(&url("https://a.com")).unwrap();
        let b = repo.find_or_create(&url("https://b.com")).unwrap();
        let c = repo.find_or_create(&url("https://c.com")).unwrap();
        assert_eq!(a.short_code.get(), 1);
        assert!(a.short_code < b.short_code && b.short_code < c.short_code);
        assert_eq!(c.short_code.get(), 3);
    }

    #[test]
    fn duplicate_url_returns_existing_record() {
        let repo = InMemoryRepo::new();
        let first = repo.find_or_create(&url("https://a.com")).unwrap();
        let again = repo.find_or_create(&url("http://a.com")).unwrap();
        assert_eq!(first, again);
        assert_eq!(repo.len().unwrap(), 1);
    }

    #[test]
    fn find_by_code_round_trip() {
        let repo = InMemoryRepo::new();
        let rec = repo.find_or_create(&url("https://a.com/x?y=1")).unwrap();
        let got = repo.find_by_code(rec.short_code).unwrap().unwrap();
        assert_eq!(got.original_url, "a.com/x?y=1");
        assert!(repo
            .find_by_code(ShortCode::new(99).unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn concurrent_identical_submissions_share_one_record() {
        let repo = Arc::new(InMemoryRepo::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || repo.find_or_create(&url("https://same.com")).unwrap())
            })
            .collect();
        let codes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().short_code)
            .collect();
        assert!(codes.iter().all(|c| *c == ShortCode::FIRST));
        assert_eq!(repo.len().unwrap(), 1);
    }

    #[test]
    fn poisoned_mutex_is_reported() {
        let repo = InMemoryRepo::new();
        std::thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _guard = repo.inner.lock().unwrap();
                panic!("poison the store");
            });
            assert!(poisoner.join().is_err());
        });
        assert_eq!(repo.len().unwrap_err().code, "mutex_poisoned");
        assert_eq!(repo.is_empty().unwrap_err().code, "mutex_poisoned");
        let err = repo.find_or_create(&url("https://a.com")).unwrap_err();
        assert_eq!(err.code, "mutex_poisoned");
    }
}

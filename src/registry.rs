use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::{
    codegen::validate_format,
    db::{DbError, LinksDB},
    models::{Link, NewLink},
};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("code already exists: {0}")]
    CodeConflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl RegistryError {
    pub(crate) fn invalid_code() -> Self {
        Self::InvalidInput("code must match [A-Za-z0-9]{6,8}".to_string())
    }

    fn from_db(code: &str, e: DbError) -> Self {
        match e {
            DbError::DuplicateCode => Self::CodeConflict(code.to_string()),
            DbError::General(msg) => Self::StorageUnavailable(msg),
        }
    }
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn validate_url(url: &str) -> Result<(), RegistryError> {
    if url.is_empty() {
        return Err(RegistryError::InvalidInput("url is required".to_string()));
    }

    let invalid = || RegistryError::InvalidInput("invalid url".to_string());

    // the stored url ends up verbatim in a Location header
    if url.chars().any(char::is_control) {
        return Err(invalid());
    }

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    if !["http", "https"].contains(&parsed.scheme()) {
        return Err(invalid());
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }

    Ok(())
}

/// Owns all link records.
///
/// Uniqueness of codes and consistency of click counters are enforced by the
/// storage behind [`LinksDB`], never by in-process locking, so any number of
/// registries (and processes) may share one store.
#[derive(Clone)]
pub struct LinkRegistry {
    db: Arc<dyn LinksDB>,
}

impl LinkRegistry {
    pub fn new(db: Arc<dyn LinksDB>) -> Self {
        Self { db }
    }

    /// Snapshot of all links, newest first.
    ///
    /// Read-committed: a link created or deleted concurrently may or may not
    /// be reflected.
    pub async fn list(&self) -> Result<Vec<Link>, RegistryError> {
        self.db
            .list()
            .await
            .map_err(|e| RegistryError::StorageUnavailable(e.to_string()))
    }

    pub async fn get(&self, code: &str) -> Result<Link, RegistryError> {
        if !validate_format(code) {
            return Err(RegistryError::NotFound(code.to_string()));
        }

        self.db
            .get(code)
            .await
            .map_err(|e| RegistryError::from_db(code, e))?
            .ok_or_else(|| RegistryError::NotFound(code.to_string()))
    }

    /// Persists a new link with zero clicks.
    ///
    /// Fails with [`RegistryError::CodeConflict`] if the code is taken,
    /// including when a concurrent create wins between an `exists` check and
    /// this call.
    pub async fn create(&self, code: &str, url: &str) -> Result<Link, RegistryError> {
        if !validate_format(code) {
            return Err(RegistryError::invalid_code());
        }
        validate_url(url)?;

        let new_link = NewLink {
            code: code.to_string(),
            url: url.to_string(),
            created_at: Utc::now(),
        };

        self.db
            .create(&new_link)
            .await
            .map_err(|e| RegistryError::from_db(code, e))
    }

    /// Records one click. A missing code is ignored.
    pub async fn increment_click(&self, code: &str) -> Result<(), RegistryError> {
        if !validate_format(code) {
            return Ok(());
        }

        let updated = self
            .db
            .increment_click(code, Utc::now())
            .await
            .map_err(|e| RegistryError::from_db(code, e))?;

        if !updated {
            debug!(code, "click on missing code ignored");
        }

        Ok(())
    }

    /// Hard delete. A second delete of the same code yields `NotFound`.
    pub async fn delete(&self, code: &str) -> Result<(), RegistryError> {
        if !validate_format(code) {
            return Err(RegistryError::NotFound(code.to_string()));
        }

        let deleted = self
            .db
            .delete(code)
            .await
            .map_err(|e| RegistryError::from_db(code, e))?;

        if !deleted {
            return Err(RegistryError::NotFound(code.to_string()));
        }

        Ok(())
    }

    /// Cheap availability probe. Not a uniqueness guarantee, see [`Self::create`].
    pub async fn exists(&self, code: &str) -> Result<bool, RegistryError> {
        if !validate_format(code) {
            return Ok(false);
        }

        self.db
            .exists(code)
            .await
            .map_err(|e| RegistryError::from_db(code, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryDb, MockLinksDB};

    fn memory_registry() -> LinkRegistry {
        LinkRegistry::new(Arc::new(MemoryDb::new()))
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/a/b").is_ok());
        assert!(validate_url("http://localhost:4000").is_ok());
        assert!(validate_url("https://x.io").is_ok());

        assert!(validate_url("").is_err());
        assert!(validate_url("abcde.com").is_err());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
        assert!(validate_url("mailto:someone@example.com").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("https://x.io/a\nb").is_err());
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let registry = memory_registry();

        registry.create("AbC123", "https://x.io").await.unwrap();

        let link = registry.get("AbC123").await.unwrap();
        assert_eq!(link.code, "AbC123");
        assert_eq!(link.url, "https://x.io");
        assert_eq!(link.clicks, 0);
        assert!(link.last_clicked.is_none());
    }

    #[tokio::test]
    async fn test_two_codes_listed() {
        let registry = memory_registry();

        registry.create("first1", "https://a.io").await.unwrap();
        registry.create("second2", "https://b.io").await.unwrap();

        let codes: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.code)
            .collect();
        assert_eq!(codes.len(), 2);
        assert!(codes.contains(&"first1".to_string()));
        assert!(codes.contains(&"second2".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let registry = memory_registry();

        registry.create("AbC123", "https://x.io").await.unwrap();

        let res = registry.create("AbC123", "https://y.io").await;
        assert!(matches!(res, Err(RegistryError::CodeConflict(code)) if code == "AbC123"));

        assert_eq!(registry.get("AbC123").await.unwrap().url, "https://x.io");
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_storage() {
        // no expectations: any storage call panics
        let registry = LinkRegistry::new(Arc::new(MockLinksDB::new()));

        for code in ["ab1", "abc-12", "toolong123", ""] {
            let res = registry.create(code, "https://x.io").await;
            assert!(matches!(res, Err(RegistryError::InvalidInput(_))), "{code}");
        }

        let res = registry.create("AbC123", "not a url").await;
        assert!(matches!(res, Err(RegistryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_invalid_code_leaves_no_record() {
        let registry = memory_registry();

        assert!(registry.create("ab1", "https://x.io").await.is_err());
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_conflict() {
        let mut db = MockLinksDB::new();
        db.expect_create()
            .times(1)
            .returning(|_| Err(DbError::DuplicateCode));

        let registry = LinkRegistry::new(Arc::new(db));

        let res = registry.create("AbC123", "https://x.io").await;
        assert!(matches!(res, Err(RegistryError::CodeConflict(_))));
    }

    #[tokio::test]
    async fn test_storage_errors_map_to_unavailable() {
        let mut db = MockLinksDB::new();
        db.expect_get()
            .times(1)
            .returning(|_| Err(DbError::General("pool timed out".to_string())));
        db.expect_list()
            .times(1)
            .returning(|| Err(DbError::General("pool timed out".to_string())));

        let registry = LinkRegistry::new(Arc::new(db));

        assert!(matches!(
            registry.get("AbC123").await,
            Err(RegistryError::StorageUnavailable(_))
        ));
        assert!(matches!(
            registry.list().await,
            Err(RegistryError::StorageUnavailable(msg)) if msg.contains("pool timed out")
        ));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let registry = memory_registry();

        assert!(matches!(
            registry.get("doesnotexist").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.get("AbC123").await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let registry = memory_registry();

        registry.create("AbC123", "https://x.io").await.unwrap();

        registry.delete("AbC123").await.unwrap();
        assert!(matches!(
            registry.delete("AbC123").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(!registry.exists("AbC123").await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_click() {
        let registry = memory_registry();

        registry.create("AbC123", "https://x.io").await.unwrap();
        registry.increment_click("AbC123").await.unwrap();
        registry.increment_click("AbC123").await.unwrap();

        let link = registry.get("AbC123").await.unwrap();
        assert_eq!(link.clicks, 2);
        assert!(link.last_clicked.is_some());
    }

    #[tokio::test]
    async fn test_increment_missing_is_noop() {
        let registry = memory_registry();

        registry.increment_click("AbC123").await.unwrap();
        registry.increment_click("bad").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_same_code() {
        let registry = memory_registry();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let url = format!("https://example{i}.com");
                    registry.create("race01", &url).await.map(|l| l.url)
                })
            })
            .collect();

        let mut winner = None;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(url) => {
                    assert!(winner.is_none(), "two creates succeeded");
                    winner = Some(url);
                }
                Err(RegistryError::CodeConflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(registry.get("race01").await.unwrap().url, winner.unwrap());
    }
}

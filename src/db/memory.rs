use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, hash_map::Entry};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    db::{DbError, LinksDB},
    models::{Link, NewLink},
};

/// Process-local link storage.
///
/// Every mutation runs under a single write guard, so the uniqueness check in
/// `create` and the counter update in `increment_click` are atomic. Only safe
/// for a single server process; shared deployments need [`super::PostgresDb`].
#[derive(Clone, Default)]
pub struct MemoryDb {
    links: Arc<RwLock<HashMap<String, Link>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinksDB for MemoryDb {
    async fn list(&self) -> Result<Vec<Link>, DbError> {
        let links = self.links.read().await;

        let mut all: Vec<Link> = links.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });

        Ok(all)
    }

    async fn get(&self, code: &str) -> Result<Option<Link>, DbError> {
        Ok(self.links.read().await.get(code).cloned())
    }

    async fn create(&self, link: &NewLink) -> Result<Link, DbError> {
        let mut links = self.links.write().await;

        match links.entry(link.code.clone()) {
            Entry::Occupied(_) => Err(DbError::DuplicateCode),
            Entry::Vacant(slot) => Ok(slot.insert(Link::from(link.clone())).clone()),
        }
    }

    async fn increment_click(&self, code: &str, at: DateTime<Utc>) -> Result<bool, DbError> {
        let mut links = self.links.write().await;

        let Some(link) = links.get_mut(code) else {
            return Ok(false);
        };

        link.clicks += 1;
        link.last_clicked = Some(at);

        Ok(true)
    }

    async fn delete(&self, code: &str) -> Result<bool, DbError> {
        Ok(self.links.write().await.remove(code).is_some())
    }

    async fn exists(&self, code: &str) -> Result<bool, DbError> {
        Ok(self.links.read().await.contains_key(code))
    }
}

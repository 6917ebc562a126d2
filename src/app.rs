use crate::{
    codegen::CodeGenerator,
    db::LinksDB,
    models::Link,
    registry::{LinkRegistry, RegistryError, validate_url},
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tinylink_rs::CreateLinkRequest;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct App {
    registry: LinkRegistry,
    generator: CodeGenerator,
    base_url: String,
    started_at: Instant,
}

impl App {
    pub fn new(base_url: String, db: Arc<dyn LinksDB>, max_attempts: u32) -> Arc<Self> {
        Arc::new(Self {
            registry: LinkRegistry::new(db),
            generator: CodeGenerator::new(max_attempts),
            base_url: base_url.trim_end_matches('/').to_string(),
            started_at: Instant::now(),
        })
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    #[instrument(skip(self), err)]
    pub async fn create_link(&self, payload: CreateLinkRequest) -> Result<Link, RegistryError> {
        let url = payload.url.trim();

        validate_url(url)?;

        let custom = payload
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        let link = match custom {
            Some(code) => {
                self.generator.check_custom(&self.registry, code).await?;

                // a lost race surfaces as CodeConflict; user codes are never retried
                self.registry.create(code, url).await?
            }
            None => {
                self.generator
                    .create_with_generated_code(&self.registry, url)
                    .await?
            }
        };

        info!(code = link.code, "link created");

        Ok(link)
    }

    /// Records a click and returns the target URL.
    ///
    /// The click is counted before the lookup, so a link deleted in between
    /// yields `NotFound` after an ignored increment.
    pub async fn redirect(&self, code: &str) -> Result<String, RegistryError> {
        self.registry.increment_click(code).await?;

        let link = self.registry.get(code).await?;

        info!(code, clicks = link.clicks, "redirect");

        Ok(link.url)
    }
}

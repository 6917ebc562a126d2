use rand::{Rng, rngs::OsRng};
use tracing::{info, warn};

use crate::{
    models::Link,
    registry::{LinkRegistry, RegistryError},
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const MIN_CODE_LENGTH: usize = 6;
const MAX_CODE_LENGTH: usize = 8;

/// Length of codes drawn by [`generate_random`].
pub const GENERATED_CODE_LENGTH: usize = 6;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// `true` iff `candidate` is 6 to 8 characters from `[A-Za-z0-9]`.
pub fn validate_format(candidate: &str) -> bool {
    (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&candidate.len())
        && candidate.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Draws a code of [`GENERATED_CODE_LENGTH`] characters, each sampled
/// uniformly from the 62 character alphabet using OS entropy.
pub fn generate_random() -> String {
    let mut rng = OsRng;

    (0..GENERATED_CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Picks codes for new links and resolves collisions against the registry.
#[derive(Clone, Debug)]
pub struct CodeGenerator {
    max_attempts: u32,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl CodeGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Checks a user supplied code: format first, then availability.
    ///
    /// Passing this check does not reserve the code; a concurrent create can
    /// still take it, which `LinkRegistry::create` reports as a conflict.
    pub async fn check_custom(
        &self,
        registry: &LinkRegistry,
        candidate: &str,
    ) -> Result<(), RegistryError> {
        if !validate_format(candidate) {
            return Err(RegistryError::invalid_code());
        }

        if registry.exists(candidate).await? {
            return Err(RegistryError::CodeConflict(candidate.to_string()));
        }

        Ok(())
    }

    /// Creates a link under a freshly generated code.
    ///
    /// Codes reported as taken by `exists`, and inserts that lose a race to a
    /// concurrent writer, both consume one attempt. Once the budget is spent
    /// the last candidate is reported as a conflict.
    pub async fn create_with_generated_code(
        &self,
        registry: &LinkRegistry,
        url: &str,
    ) -> Result<Link, RegistryError> {
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            let code = generate_random();

            if registry.exists(&code).await? {
                warn!(code, attempt, "generated code already taken");
                last = code;
                continue;
            }

            match registry.create(&code, url).await {
                Ok(link) => {
                    info!(code, attempt, "generated code");
                    return Ok(link);
                }
                Err(RegistryError::CodeConflict(_)) => {
                    warn!(code, attempt, "generated code taken by concurrent create");
                    last = code;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(attempts = self.max_attempts, "code generation exhausted");

        Err(RegistryError::CodeConflict(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, MemoryDb, MockLinksDB};
    use std::{collections::HashSet, sync::Arc};

    #[test]
    fn test_validate_format() {
        assert!(validate_format("AbC123"));
        assert!(validate_format("abcdefg"));
        assert!(validate_format("ABCDEFGH"));
        assert!(validate_format("00000000"));

        assert!(!validate_format(""));
        assert!(!validate_format("ab1"));
        assert!(!validate_format("abcde"));
        assert!(!validate_format("abcdefghi"));
        assert!(!validate_format("abc-123"));
        assert!(!validate_format("abc_123"));
        assert!(!validate_format("abc 123"));
        assert!(!validate_format("abcdé1"));
        assert!(!validate_format("doesnotexist"));
    }

    #[test]
    fn test_alphabet() {
        assert_eq!(CODE_ALPHABET.len(), 62);

        let unique: HashSet<_> = CODE_ALPHABET.iter().collect();
        assert_eq!(unique.len(), CODE_ALPHABET.len());
    }

    #[test]
    fn test_generate_random_is_valid() {
        for _ in 0..1000 {
            let code = generate_random();
            assert_eq!(code.len(), GENERATED_CODE_LENGTH);
            assert!(validate_format(&code), "{code}");
        }
    }

    #[test]
    fn test_generate_random_spreads() {
        let codes: HashSet<_> = (0..1000).map(|_| generate_random()).collect();

        // 62^6 possible codes, a repeat within 1000 draws is vanishingly rare
        assert!(codes.len() > 990);
    }

    #[tokio::test]
    async fn test_check_custom() {
        let registry = LinkRegistry::new(Arc::new(MemoryDb::new()));
        let generator = CodeGenerator::default();

        generator.check_custom(&registry, "AbC123").await.unwrap();

        registry.create("AbC123", "https://x.io").await.unwrap();

        let res = generator.check_custom(&registry, "AbC123").await;
        assert!(matches!(res, Err(RegistryError::CodeConflict(code)) if code == "AbC123"));

        let res = generator.check_custom(&registry, "ab1").await;
        assert!(matches!(res, Err(RegistryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_invalid_custom_code_skips_storage() {
        // no expectations: any storage call panics
        let db = MockLinksDB::new();
        let registry = LinkRegistry::new(Arc::new(db));

        let res = CodeGenerator::default()
            .check_custom(&registry, "bad-code")
            .await;
        assert!(matches!(res, Err(RegistryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_generated_code_exhaustion() {
        let mut db = MockLinksDB::new();
        db.expect_exists().times(5).returning(|_| Ok(true));
        db.expect_create().never();

        let registry = LinkRegistry::new(Arc::new(db));

        let res = CodeGenerator::new(5)
            .create_with_generated_code(&registry, "https://x.io")
            .await;
        assert!(matches!(res, Err(RegistryError::CodeConflict(_))));
    }

    #[tokio::test]
    async fn test_generated_code_retries_lost_race() {
        let mut db = MockLinksDB::new();
        db.expect_exists().times(2).returning(|_| Ok(false));

        let mut calls = 0;
        db.expect_create().times(2).returning(move |link| {
            calls += 1;
            if calls == 1 {
                Err(DbError::DuplicateCode)
            } else {
                Ok(Link::from(link.clone()))
            }
        });

        let registry = LinkRegistry::new(Arc::new(db));

        let link = CodeGenerator::default()
            .create_with_generated_code(&registry, "https://x.io")
            .await
            .unwrap();
        assert_eq!(link.url, "https://x.io");
        assert_eq!(link.code.len(), GENERATED_CODE_LENGTH);
    }

    #[tokio::test]
    async fn test_generated_code_storage_error_not_retried() {
        let mut db = MockLinksDB::new();
        db.expect_exists()
            .times(1)
            .returning(|_| Err(DbError::General("connection refused".to_string())));

        let registry = LinkRegistry::new(Arc::new(db));

        let res = CodeGenerator::default()
            .create_with_generated_code(&registry, "https://x.io")
            .await;
        assert!(matches!(res, Err(RegistryError::StorageUnavailable(_))));
    }
}

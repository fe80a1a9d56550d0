//! First-run seeding of the knowledge base.

use crate::actions::users::UserDirectory;
use crate::error::CoreResult;
use crate::store::{DocumentStore, GENERAL};
use serde_json::Value;
use std::path::Path;

/// Seed compiled into the binary, used when the configured seed file is absent.
pub const DEFAULT_SEED: &str = include_str!("../../../config/knowledge_base.toml");

/// Inserts every document of a TOML seed. Each top-level array of tables is a collection.
pub fn seed_from_str(store: &dyn DocumentStore, text: &str) -> CoreResult<usize> {
    let table: toml::Table = toml::from_str(text)?;
    let mut inserted = 0;
    for (collection, docs) in table {
        let Value::Array(docs) = serde_json::to_value(docs)? else {
            tracing::warn!(
                target: "teodoro::bootstrap",
                collection = %collection,
                "Seed entry is not an array of tables; skipped"
            );
            continue;
        };
        for doc in docs {
            if let Value::Object(doc) = doc {
                store.insert_one(&collection, doc)?;
                inserted += 1;
            }
        }
    }
    tracing::info!(target: "teodoro::bootstrap", documents = inserted, "Knowledge base seeded");
    Ok(inserted)
}

/// Seeds the store from `path` (or the built-in seed) unless it already has a lexicon.
/// Returns whether anything was written.
pub fn seed_if_empty(store: &dyn DocumentStore, path: &Path) -> CoreResult<bool> {
    if store.count(GENERAL)? > 0 {
        tracing::debug!(target: "teodoro::bootstrap", "Knowledge base already populated");
        return Ok(false);
    }
    let text = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        tracing::info!(
            target: "teodoro::bootstrap",
            path = %path.display(),
            "Seed file not found; using built-in seed"
        );
        DEFAULT_SEED.to_string()
    };
    seed_from_str(store, &text)?;
    Ok(true)
}

/// Creates the fallback user when it is missing.
pub fn ensure_default_user(store: &dyn DocumentStore, name: &str) -> CoreResult<()> {
    let users = UserDirectory::new(store);
    if users.find(name)?.is_none() {
        users.create(name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{Intent, Lexicon};
    use crate::store::{KnowledgeStore, APPLICATIONS, USERS};

    #[test]
    fn built_in_seed_yields_complete_lexicon() {
        let store = KnowledgeStore::temporary().unwrap();
        let n = seed_from_str(&store, DEFAULT_SEED).unwrap();
        assert!(n >= 4);
        assert_eq!(store.count(GENERAL).unwrap(), 2);
        assert_eq!(store.count(APPLICATIONS).unwrap(), 1);
        assert_eq!(store.count(USERS).unwrap(), 1);

        let lex = Lexicon::load(&store, "Teodoro").unwrap();
        assert!(lex.missing_tables().is_empty());
        for intent in Intent::PRIORITY {
            assert!(!lex.triggers(intent).is_empty(), "{} has no triggers", intent);
        }
        assert_eq!(lex.numbers().unwrap().value_of("una"), Some(1));
        assert_eq!(lex.math_operations().unwrap()[0].keyword, "más");
    }

    #[test]
    fn seeding_is_skipped_when_populated() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open_path(dir.path().join("kb")).unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(seed_if_empty(&store, &missing).unwrap());
        assert!(!seed_if_empty(&store, &missing).unwrap());
        assert_eq!(store.count(GENERAL).unwrap(), 2);
    }

    #[test]
    fn default_user_is_created_once() {
        let store = KnowledgeStore::temporary().unwrap();
        ensure_default_user(&store, "usuario").unwrap();
        ensure_default_user(&store, "usuario").unwrap();
        assert_eq!(store.count(USERS).unwrap(), 1);
    }
}

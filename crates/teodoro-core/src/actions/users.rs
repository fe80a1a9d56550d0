//! User directory: accounts, credentials and free-form user information.

use crate::error::{CoreError, CoreResult};
use crate::extract::token_at;
use crate::session::UserRecord;
use crate::store::{DocumentStore, Filter, Update, USERS};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use serde_json::Value;

/// Field name that sets a new password instead of storing information.
pub const PASSWORD_FIELD: &str = "contraseña";

/// Action requested by a "Users" command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    New,
    Change,
    Remove,
}

impl UserAction {
    pub fn parse(tokens: &[String]) -> Option<Self> {
        let has = |w: &str| tokens.iter().any(|t| t == w);
        if has("nuevo") {
            Some(UserAction::New)
        } else if has("cambiar") {
            Some(UserAction::Change)
        } else if has("eliminar") || has("borrar") {
            Some(UserAction::Remove)
        } else {
            None
        }
    }
}

/// The single token after "nombre", if any.
pub fn user_name_in(tokens: &[String]) -> Option<String> {
    token_at(tokens, "nombre", 1).map(str::to_string)
}

pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CoreError::handler("users", format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Typed access to the "Users" collection.
pub struct UserDirectory<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> UserDirectory<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub fn find(&self, name: &str) -> CoreResult<Option<UserRecord>> {
        self.store
            .find_one(USERS, &Filter::eq("nombre", name))?
            .map(|doc| serde_json::from_value(Value::Object(doc)).map_err(CoreError::from))
            .transpose()
    }

    pub fn create(&self, name: &str) -> CoreResult<UserRecord> {
        let record = UserRecord::new_default(name);
        let doc = match serde_json::to_value(&record)? {
            Value::Object(doc) => doc,
            _ => return Err(CoreError::fatal("user record did not serialize to an object")),
        };
        self.store.insert_one(USERS, doc)?;
        tracing::info!(target: "teodoro::users", user = name, "User created");
        Ok(record)
    }

    pub fn remove(&self, name: &str) -> CoreResult<bool> {
        let removed = self.store.delete_one(USERS, &Filter::eq("nombre", name))?;
        tracing::info!(target: "teodoro::users", user = name, removed = removed, "User removal");
        Ok(removed)
    }

    /// The user's record when the password matches its stored hash.
    pub fn authenticate(&self, name: &str, password: &str) -> CoreResult<Option<UserRecord>> {
        let Some(record) = self.find(name)? else {
            return Ok(None);
        };
        let ok = record
            .password_hash
            .as_deref()
            .is_some_and(|phc| verify_password(password, phc));
        tracing::info!(target: "teodoro::users", user = name, accepted = ok, "Login attempt");
        Ok(ok.then_some(record))
    }

    pub fn set_password(&self, name: &str, password: &str) -> CoreResult<bool> {
        let phc = hash_password(password)?;
        self.store
            .update_one(USERS, &Filter::eq("nombre", name), &Update::set("_hash", phc))
    }

    pub fn set_field(&self, name: &str, field: &str, value: &str) -> CoreResult<bool> {
        self.store
            .update_one(USERS, &Filter::eq("nombre", name), &Update::set(field, value))
    }

    pub fn unset_field(&self, name: &str, field: &str) -> CoreResult<bool> {
        self.store
            .update_one(USERS, &Filter::eq("nombre", name), &Update::unset(field))
    }

    pub fn public_info(&self, name: &str) -> CoreResult<Vec<(String, String)>> {
        Ok(self
            .find(name)?
            .map(|r| r.public_info())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tokenize;
    use crate::store::KnowledgeStore;

    #[test]
    fn parses_user_actions() {
        assert_eq!(
            UserAction::parse(&tokenize("crea un usuario nuevo de nombre ana")),
            Some(UserAction::New)
        );
        assert_eq!(
            UserAction::parse(&tokenize("quiero borrar el usuario")),
            Some(UserAction::Remove)
        );
        assert_eq!(UserAction::parse(&tokenize("usuario cualquiera")), None);
        assert_eq!(
            user_name_in(&tokenize("usuario nuevo de nombre Ana María")).as_deref(),
            Some("ana")
        );
    }

    #[test]
    fn password_round_trip() {
        let phc = hash_password("s3creto").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("s3creto", &phc));
        assert!(!verify_password("otro", &phc));
        assert!(!verify_password("s3creto", "not-a-hash"));
    }

    #[test]
    fn directory_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open_path(dir.path().join("kb")).unwrap();
        let users = UserDirectory::new(&store);

        users.create("ana").unwrap();
        assert!(users.authenticate("ana", "x").unwrap().is_none());
        users.set_password("ana", "clave").unwrap();
        assert!(users.authenticate("ana", "clave").unwrap().is_some());

        users.set_field("ana", "ciudad", "Soria").unwrap();
        assert_eq!(
            users.public_info("ana").unwrap(),
            vec![("ciudad".to_string(), "Soria".to_string())]
        );
        users.unset_field("ana", "ciudad").unwrap();
        assert!(users.public_info("ana").unwrap().is_empty());

        assert!(users.remove("ana").unwrap());
        assert!(users.find("ana").unwrap().is_none());
    }
}

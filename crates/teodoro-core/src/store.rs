//! Collection-style document store.
//!
//! [`DocumentStore`] is the narrow interface the core needs from persistence: schema-less JSON
//! documents grouped in named collections ("Users", "Reminders", "General", "Applications"),
//! queried with exact-field-match filters. [`KnowledgeStore`] backs it with sled, one tree per
//! collection, keys generated by sled so iteration follows insertion order.

use crate::error::{CoreError, CoreResult};
use serde_json::{Map, Value};
use std::path::Path;

/// A stored document. Always a JSON object.
pub type Document = Map<String, Value>;

pub const USERS: &str = "Users";
pub const REMINDERS: &str = "Reminders";
pub const GENERAL: &str = "General";
pub const APPLICATIONS: &str = "Applications";

/// Exact-field-match filter. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// Field-level update applied by [`DocumentStore::update_one`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Map<String, Value>,
    unset: Vec<String>,
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn unset(field: impl Into<String>) -> Self {
        Self {
            set: Map::new(),
            unset: vec![field.into()],
        }
    }

    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    fn apply(&self, doc: &mut Document) {
        for (k, v) in &self.set {
            doc.insert(k.clone(), v.clone());
        }
        for k in &self.unset {
            doc.remove(k);
        }
    }
}

/// Persistent store collaborator.
pub trait DocumentStore: Send + Sync {
    fn find_one(&self, collection: &str, filter: &Filter) -> CoreResult<Option<Document>>;

    fn find_many(&self, collection: &str, filter: &Filter) -> CoreResult<Vec<Document>>;

    /// Inserts a document and returns its generated id.
    fn insert_one(&self, collection: &str, doc: Document) -> CoreResult<String>;

    /// Updates the first matching document. Returns `false` when nothing matched.
    fn update_one(&self, collection: &str, filter: &Filter, update: &Update) -> CoreResult<bool>;

    /// Deletes the first matching document. Returns `false` when nothing matched.
    fn delete_one(&self, collection: &str, filter: &Filter) -> CoreResult<bool>;

    fn count(&self, collection: &str) -> CoreResult<usize> {
        Ok(self.find_many(collection, &Filter::all())?.len())
    }
}

/// Sled-backed [`DocumentStore`].
pub struct KnowledgeStore {
    db: sled::Db,
}

impl KnowledgeStore {
    /// Opens or creates the store at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store that is discarded on drop.
    pub fn temporary() -> CoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn scan(&self, collection: &str) -> CoreResult<Vec<(sled::IVec, Document)>> {
        let tree = self.db.open_tree(collection)?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (k, v) = item?;
            match serde_json::from_slice::<Value>(&v)? {
                Value::Object(doc) => out.push((k, doc)),
                other => {
                    tracing::warn!(
                        target: "teodoro::store",
                        collection = collection,
                        kind = %value_kind(&other),
                        "Skipping non-object document"
                    );
                }
            }
        }
        Ok(out)
    }

    fn first_match(&self, collection: &str, filter: &Filter) -> CoreResult<Option<(sled::IVec, Document)>> {
        Ok(self
            .scan(collection)?
            .into_iter()
            .find(|(_, doc)| filter.matches(doc)))
    }
}

impl DocumentStore for KnowledgeStore {
    fn find_one(&self, collection: &str, filter: &Filter) -> CoreResult<Option<Document>> {
        Ok(self.first_match(collection, filter)?.map(|(_, doc)| doc))
    }

    fn find_many(&self, collection: &str, filter: &Filter) -> CoreResult<Vec<Document>> {
        Ok(self
            .scan(collection)?
            .into_iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(_, doc)| doc)
            .collect())
    }

    fn insert_one(&self, collection: &str, doc: Document) -> CoreResult<String> {
        let id = self.db.generate_id()?;
        let tree = self.db.open_tree(collection)?;
        let bytes = serde_json::to_vec(&Value::Object(doc))?;
        tree.insert(id.to_be_bytes(), bytes.as_slice())?;
        tracing::info!(
            target: "teodoro::store",
            collection = collection,
            id = id,
            bytes = bytes.len(),
            action = "INSERT",
            "[{}] inserted document {:016x}",
            collection,
            id
        );
        Ok(format!("{:016x}", id))
    }

    fn update_one(&self, collection: &str, filter: &Filter, update: &Update) -> CoreResult<bool> {
        let Some((key, mut doc)) = self.first_match(collection, filter)? else {
            return Ok(false);
        };
        update.apply(&mut doc);
        let tree = self.db.open_tree(collection)?;
        tree.insert(key, serde_json::to_vec(&Value::Object(doc))?)?;
        tracing::info!(
            target: "teodoro::store",
            collection = collection,
            set = update.set.len(),
            unset = update.unset.len(),
            action = "UPDATE",
            "[{}] updated document",
            collection
        );
        Ok(true)
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> CoreResult<bool> {
        let Some((key, _)) = self.first_match(collection, filter)? else {
            return Ok(false);
        };
        let tree = self.db.open_tree(collection)?;
        let removed = tree.remove(key)?.is_some();
        if removed {
            tracing::info!(
                target: "teodoro::store",
                collection = collection,
                action = "REMOVE",
                "[{}] removed document",
                collection
            );
        }
        Ok(removed)
    }

    fn count(&self, collection: &str) -> CoreResult<usize> {
        let tree = self.db.open_tree(collection)?;
        Ok(tree.len())
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builds a [`Document`] from a `serde_json::json!` object literal.
pub fn document(value: Value) -> CoreResult<Document> {
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(CoreError::fatal(format!(
            "expected a JSON object document, got {}",
            value_kind(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_find_update_delete() {
        let store = KnowledgeStore::temporary().unwrap();
        store
            .insert_one(USERS, document(json!({"nombre": "ana", "ciudad": "Soria"})).unwrap())
            .unwrap();
        store
            .insert_one(USERS, document(json!({"nombre": "luis"})).unwrap())
            .unwrap();

        let ana = store.find_one(USERS, &Filter::eq("nombre", "ana")).unwrap().unwrap();
        assert_eq!(ana["ciudad"], "Soria");

        assert!(store
            .update_one(USERS, &Filter::eq("nombre", "ana"), &Update::unset("ciudad"))
            .unwrap());
        let ana = store.find_one(USERS, &Filter::eq("nombre", "ana")).unwrap().unwrap();
        assert!(ana.get("ciudad").is_none());

        assert!(store.delete_one(USERS, &Filter::eq("nombre", "luis")).unwrap());
        assert!(!store.delete_one(USERS, &Filter::eq("nombre", "luis")).unwrap());
        assert_eq!(store.count(USERS).unwrap(), 1);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let store = KnowledgeStore::temporary().unwrap();
        for n in ["primero", "segundo", "tercero"] {
            store.insert_one(GENERAL, document(json!({"n": n})).unwrap()).unwrap();
        }
        let all = store.find_many(GENERAL, &Filter::all()).unwrap();
        let names: Vec<_> = all.iter().map(|d| d["n"].as_str().unwrap()).collect();
        assert_eq!(names, ["primero", "segundo", "tercero"]);
    }

    #[test]
    fn filter_requires_every_field() {
        let doc = document(json!({"usuario": "ana", "hora": "10:00"})).unwrap();
        assert!(Filter::eq("usuario", "ana").matches(&doc));
        assert!(!Filter::eq("usuario", "ana").and("hora", "11:00").matches(&doc));
        assert!(Filter::all().matches(&doc));
    }
}

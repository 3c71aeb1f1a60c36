// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! In-memory storage backend.
//!
//! Collections are plain vectors in insertion order; primary keys are a
//! process-wide monotone counter. Used by the test suites and the demo
//! server; production deployments implement [`Storage`] over their actual
//! relational store.

use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use riptide_core::{Error, Item, Result, item::ID_FIELD};

use crate::Storage;

#[derive(Default)]
pub struct MemoryStorage {
	collections: RwLock<HashMap<String, Vec<Item>>>,
	next_id: AtomicU64,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			collections: RwLock::new(HashMap::new()),
			next_id: AtomicU64::new(1),
		}
	}

	/// Seed a collection without going through the engine (no id assignment,
	/// no notification). Test and demo setup only.
	pub fn seed(&self, collection: &str, items: Vec<Item>) {
		self.collections.write().insert(collection.to_string(), items);
	}
}

#[async_trait]
impl Storage for MemoryStorage {
	async fn get_all(&self, collection: &str) -> Result<Vec<Item>> {
		Ok(self.collections.read().get(collection).cloned().unwrap_or_default())
	}

	async fn insert(&self, collection: &str, mut item: Item) -> Result<Item> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		item.set(ID_FIELD, id);

		let mut collections = self.collections.write();
		collections.entry(collection.to_string()).or_default().push(item.clone());
		Ok(item)
	}

	async fn replace(&self, collection: &str, item: Item) -> Result<Item> {
		let id = item.id().cloned().ok_or_else(|| Error::Storage("replace without primary key".to_string()))?;

		let mut collections = self.collections.write();
		let items = collections.get_mut(collection).ok_or_else(|| Error::not_found(collection, &id))?;
		let slot = items
			.iter_mut()
			.find(|existing| existing.id() == Some(&id))
			.ok_or_else(|| Error::not_found(collection, &id))?;
		*slot = item.clone();
		Ok(item)
	}

	async fn delete(&self, collection: &str, id: &Value) -> Result<()> {
		let mut collections = self.collections.write();
		let items = collections.get_mut(collection).ok_or_else(|| Error::not_found(collection, id))?;
		let before = items.len();
		items.retain(|existing| existing.id() != Some(id));
		if items.len() == before {
			return Err(Error::not_found(collection, id));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_insert_assigns_monotone_ids() {
		let storage = MemoryStorage::new();
		let a = storage.insert("tasks", Item::new().with("title", "first")).await.unwrap();
		let b = storage.insert("tasks", Item::new().with("title", "second")).await.unwrap();

		assert_eq!(a.id(), Some(&Value::from(1)));
		assert_eq!(b.id(), Some(&Value::from(2)));
		assert_eq!(storage.get_all("tasks").await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_replace_is_full_replacement() {
		let storage = MemoryStorage::new();
		let item = storage.insert("tasks", Item::new().with("title", "draft").with("done", false)).await.unwrap();

		let replacement = Item::new().with("id", item.id().unwrap().clone()).with("title", "final");
		storage.replace("tasks", replacement.clone()).await.unwrap();

		let all = storage.get_all("tasks").await.unwrap();
		assert_eq!(all, vec![replacement]);
		// The dropped field is gone, not merged.
		assert!(all[0].get("done").is_none());
	}

	#[tokio::test]
	async fn test_replace_and_delete_require_existence() {
		let storage = MemoryStorage::new();
		storage.insert("tasks", Item::new()).await.unwrap();

		let ghost = Item::new().with("id", 999);
		assert_eq!(storage.replace("tasks", ghost).await.unwrap_err().code(), "NOT_FOUND");
		assert_eq!(storage.delete("tasks", &Value::from(999)).await.unwrap_err().code(), "NOT_FOUND");
		assert_eq!(storage.delete("nope", &Value::from(1)).await.unwrap_err().code(), "NOT_FOUND");
	}

	#[tokio::test]
	async fn test_get_all_of_unknown_collection_is_empty() {
		let storage = MemoryStorage::new();
		assert!(storage.get_all("missing").await.unwrap().is_empty());
	}
}

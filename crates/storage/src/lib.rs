// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Storage collaborator interface.
//!
//! The sync engine delegates all persistence to this trait: one call, one
//! atomic operation. Cross-call transactions are out of scope; a write
//! followed by notification is not atomic with respect to concurrent reads.
//! Backend faults are translated to [`Error::Storage`] with the opaque cause
//! preserved in the message.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use riptide_core::{Item, Result};

pub use memory::MemoryStorage;

/// External storage collaborator, one atomic CRUD call at a time.
#[async_trait]
pub trait Storage: Send + Sync {
	/// The full item set of a collection, in storage order.
	async fn get_all(&self, collection: &str) -> Result<Vec<Item>>;

	/// Persist a new item; the primary key is assigned here and returned on
	/// the persisted item.
	async fn insert(&self, collection: &str, item: Item) -> Result<Item>;

	/// Full replacement of an existing item, keyed by its `"id"` field.
	/// Fails with `NotFound` when the id does not exist.
	async fn replace(&self, collection: &str, item: Item) -> Result<Item>;

	/// Delete by primary key. Fails with `NotFound` when absent.
	async fn delete(&self, collection: &str, id: &Value) -> Result<()>;
}

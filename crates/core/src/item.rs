// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The item model: a collection row is a JSON object.
//!
//! Items are schemaless on this layer; the storage collaborator owns the
//! actual relational shape. The `"id"` field is the primary key and is always
//! storage-assigned, never caller-supplied.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Primary key field name, assigned by the storage collaborator on insert.
pub const ID_FIELD: &str = "id";

/// A single row of a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(pub Map<String, Value>);

impl Item {
	pub fn new() -> Self {
		Self(Map::new())
	}

	/// The storage-assigned primary key, if the item has been persisted.
	pub fn id(&self) -> Option<&Value> {
		self.0.get(ID_FIELD)
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.0.get(field)
	}

	pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
		self.0.insert(field.into(), value.into());
	}

	/// Builder-style `set`, mainly for tests and demo data.
	pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
		self.set(field, value);
		self
	}
}

impl From<Map<String, Value>> for Item {
	fn from(map: Map<String, Value>) -> Self {
		Self(map)
	}
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Process-wide collection registry.
//!
//! Collections (and their subscription indices) are explicitly owned state,
//! constructed at registration time and torn down with the engine; nothing
//! here is ambient or global. The engine also carries the identity
//! collaborator so command handlers resolve it at composition time.

use std::sync::Arc;

use dashmap::DashMap;

use riptide_auth::{CollectionPolicy, IdentityProvider};
use riptide_core::{Error, Result};
use riptide_storage::Storage;

use crate::{collection::Collection, subscription::ConnectionId};

pub struct Engine {
	storage: Arc<dyn Storage>,
	identity: Arc<dyn IdentityProvider>,
	collections: DashMap<String, Arc<Collection>>,
}

impl Engine {
	pub fn new(storage: Arc<dyn Storage>, identity: Arc<dyn IdentityProvider>) -> Self {
		Self {
			storage,
			identity,
			collections: DashMap::new(),
		}
	}

	/// Register a collection under a name with its authorization policy.
	/// Registering an existing name replaces its policy; standing
	/// subscriptions survive only on fresh registrations.
	pub fn register(&self, name: impl Into<String>, policy: CollectionPolicy) -> Arc<Collection> {
		let name = name.into();
		let collection = Arc::new(Collection::new(&name, policy, self.storage.clone(), self.identity.clone()));
		self.collections.insert(name, collection.clone());
		collection
	}

	/// Look up a registered collection. Commands that target an unregistered
	/// name fail here; the registry is its own meta-collection for the error.
	pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
		self.collections
			.get(name)
			.map(|entry| entry.value().clone())
			.ok_or_else(|| Error::not_found("collections", name))
	}

	pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
		&self.identity
	}

	/// Deregister a closed connection from every collection's index.
	pub fn drop_connection(&self, connection_id: ConnectionId) {
		for entry in self.collections.iter() {
			entry.value().drop_connection(connection_id);
		}
	}
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The named logical table abstraction.
//!
//! A collection executes CRUD through the storage collaborator, applies the
//! prefilter pipeline to reads and consults the authorization gate before
//! every operation; authorization failures never reach storage. Every
//! successful write triggers the change notifier.

use std::sync::Arc;

use serde_json::Value;

use riptide_auth::{CollectionPolicy, IdentityProvider, Operation, Principal};
use riptide_core::{Error, Item, Prefilter, Result, apply, item::ID_FIELD};
use riptide_storage::Storage;

use crate::{
	WriteKind,
	subscription::{CollectionSubscriptions, ConnectionId, Subscription},
};

pub struct Collection {
	name: String,
	policy: CollectionPolicy,
	storage: Arc<dyn Storage>,
	identity: Arc<dyn IdentityProvider>,
	pub(crate) subscriptions: CollectionSubscriptions,
}

impl std::fmt::Debug for Collection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Collection").field("name", &self.name).finish_non_exhaustive()
	}
}

impl Collection {
	pub(crate) fn new(
		name: impl Into<String>,
		policy: CollectionPolicy,
		storage: Arc<dyn Storage>,
		identity: Arc<dyn IdentityProvider>,
	) -> Self {
		Self {
			name: name.into(),
			policy,
			storage,
			identity,
			subscriptions: CollectionSubscriptions::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn policy(&self) -> &CollectionPolicy {
		&self.policy
	}

	/// Evaluate the gate for one operation against the caller's CURRENT
	/// authentication state and role set. Called on every operation and on
	/// every notification push; never cached.
	pub fn authorize(&self, operation: Operation, principal: &Principal) -> Result<()> {
		let authenticated = self.identity.is_authenticated(principal);
		let roles = self.identity.current_roles(principal);
		self.policy.authorize(&self.name, operation, authenticated, &roles)
	}

	/// Authorized read: the full item set shaped by the pipeline.
	pub async fn values(&self, principal: &Principal, filters: &[Prefilter]) -> Result<Vec<Item>> {
		self.authorize(Operation::Query, principal)?;
		let items = self.storage.get_all(&self.name).await?;
		apply(items, filters)
	}

	/// Non-subscribing point-in-time read; same path as [`values`].
	///
	/// [`values`]: Collection::values
	pub async fn snapshot(&self, principal: &Principal, filters: &[Prefilter]) -> Result<Vec<Item>> {
		self.values(principal, filters).await
	}

	/// Persist a new item and fan out to subscribers.
	///
	/// The primary key is storage-assigned; a caller-supplied `"id"` field is
	/// discarded before insert.
	pub async fn add(&self, principal: &Principal, mut item: Item) -> Result<Item> {
		self.authorize(Operation::Create, principal)?;
		item.0.remove(ID_FIELD);

		let persisted = self.storage.insert(&self.name, item).await?;
		self.notify_change(WriteKind::Created, &persisted).await;
		Ok(persisted)
	}

	/// Full replacement of an existing item.
	pub async fn update(&self, principal: &Principal, item: Item) -> Result<Item> {
		self.authorize(Operation::Update, principal)?;
		if item.id().is_none() {
			return Err(Error::not_found(&self.name, "(unset)"));
		}

		let persisted = self.storage.replace(&self.name, item).await?;
		self.notify_change(WriteKind::Updated, &persisted).await;
		Ok(persisted)
	}

	/// Delete by primary key. A failed remove triggers no fan-out.
	pub async fn remove(&self, principal: &Principal, id: &Value) -> Result<()> {
		self.authorize(Operation::Remove, principal)?;
		self.storage.delete(&self.name, id).await?;

		let removed = Item::new().with(ID_FIELD, id.clone());
		self.notify_change(WriteKind::Removed, &removed).await;
		Ok(())
	}

	/// Register a standing subscription, replacing any prior one with the
	/// same reference id on the same connection. The caller must authorize
	/// Query before registering; registration itself does not read storage.
	pub fn subscribe(&self, subscription: Subscription) {
		self.subscriptions.subscribe(subscription);
	}

	/// Remove one subscription; absent reference ids are a no-op.
	pub fn unsubscribe(&self, connection_id: ConnectionId, reference_id: &str) -> bool {
		self.subscriptions.unsubscribe(connection_id, reference_id)
	}

	/// Remove every subscription owned by a closed connection.
	pub fn drop_connection(&self, connection_id: ConnectionId) {
		self.subscriptions.drop_connection(connection_id);
	}

	pub(crate) fn storage(&self) -> &Arc<dyn Storage> {
		&self.storage
	}
}

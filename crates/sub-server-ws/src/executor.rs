// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Command decoding and dispatch.
//!
//! Every fault produces an error response carrying the originating reference
//! id. The one exception is a frame so malformed that no reference id can be
//! extracted: there is nothing to correlate an error to, so the frame is
//! dropped with a logged warning.

use std::sync::Arc;

use serde_json::Value;

use riptide_auth::Operation;
use riptide_core::{Error, Item, Prefilter, Result};
use riptide_engine::{Engine, Subscription};

use crate::{
	connection::{Connection, ConnectionRegistry},
	protocol::{Request, RequestPayload, Response, ResponsePayload},
};

pub struct CommandExecutor {
	engine: Arc<Engine>,
	registry: Arc<ConnectionRegistry>,
}

impl CommandExecutor {
	pub fn new(engine: Arc<Engine>, registry: Arc<ConnectionRegistry>) -> Self {
		Self {
			engine,
			registry,
		}
	}

	/// Decode and execute one frame. `None` means no response is delivered:
	/// either the frame was undecodable (dropped with a warning) or the
	/// command is fire-and-forget.
	pub async fn execute(&self, connection: &Arc<Connection>, raw: &str) -> Option<Response> {
		let value: Value = match serde_json::from_str(raw) {
			Ok(value) => value,
			Err(e) => {
				tracing::warn!(connection = %connection.id(), error = %e, "dropping undecodable frame");
				return None;
			}
		};

		// The reference id is extracted before full decoding so that a
		// malformed command can still be answered.
		let Some(reference_id) = value.get("id").and_then(Value::as_str).map(str::to_string) else {
			tracing::warn!(connection = %connection.id(), "dropping frame without reference id");
			return None;
		};

		let request: Request = match serde_json::from_value(value) {
			Ok(request) => request,
			Err(e) => {
				return Some(Response::error(reference_id, &Error::UnknownCommand(e.to_string())));
			}
		};

		let payload = match self.dispatch(connection, &request).await {
			Ok(payload) => payload,
			Err(e) => return Some(Response::error(request.id, &e)),
		};
		Some(Response::new(request.id, payload))
	}

	async fn dispatch(&self, connection: &Arc<Connection>, request: &Request) -> Result<ResponsePayload> {
		match &request.payload {
			RequestPayload::Subscribe {
				collection,
				filters,
			} => self.subscribe(connection, &request.id, collection, filters).await,
			RequestPayload::Unsubscribe => Ok(self.unsubscribe(connection, &request.id)),
			RequestPayload::Query {
				collection,
				filters,
			} => self.query(connection, collection, filters).await,
			RequestPayload::Create {
				collection,
				item,
			} => self.create(connection, collection, item.clone()).await,
			RequestPayload::Update {
				collection,
				item,
			} => self.update(connection, collection, item.clone()).await,
			RequestPayload::Remove {
				collection,
				id,
			} => self.remove(connection, collection, id).await,
			RequestPayload::SubscribeUsers => self.subscribe_users(connection, &request.id).await,
			RequestPayload::DeleteUser {
				id,
			} => self.delete_user(connection, id).await,
		}
	}

	/// Register a standing subscription and return the initial result set.
	///
	/// Order matters: authorize BEFORE registering (a denied caller leaves no
	/// trace in either index), register before the initial read so a write
	/// racing the subscribe is not lost, compute the initial result last.
	/// Both indices are updated under the connection's lock; commands run
	/// concurrently on one connection, and a racing subscribe with the same
	/// reference id must not leave a stale engine-side registration behind.
	async fn subscribe(
		&self,
		connection: &Arc<Connection>,
		reference_id: &str,
		name: &str,
		filters: &[Prefilter],
	) -> Result<ResponsePayload> {
		let collection = self.engine.collection(name)?;
		collection.authorize(Operation::Query, connection.principal())?;

		connection.track_subscription(reference_id, name, |moved_from| {
			// Resubscribe moved this reference id to another collection.
			if let Some(previous) = moved_from.and_then(|old| self.engine.collection(old).ok()) {
				previous.unsubscribe(connection.id(), reference_id);
			}
			collection.subscribe(Subscription {
				connection_id: connection.id(),
				reference_id: reference_id.to_string(),
				principal: connection.principal().clone(),
				filters: filters.to_vec(),
				push_tx: connection.push_tx(),
			});
		});

		let items = match collection.values(connection.principal(), filters).await {
			Ok(items) => items,
			Err(e) => {
				// An errored subscribe leaves no registration behind.
				self.remove_subscription(connection, reference_id);
				return Err(e);
			}
		};
		Ok(ResponsePayload::Items {
			collection: name.to_string(),
			items,
		})
	}

	/// Symmetric removal from both indices; an absent reference id is a
	/// no-op, not a fault.
	fn unsubscribe(&self, connection: &Arc<Connection>, reference_id: &str) -> ResponsePayload {
		self.remove_subscription(connection, reference_id);
		connection.clear_users_subscription(reference_id);
		ResponsePayload::Unsubscribed
	}

	fn remove_subscription(&self, connection: &Arc<Connection>, reference_id: &str) {
		connection.untrack_subscription(reference_id, |name| {
			if let Ok(collection) = self.engine.collection(name) {
				collection.unsubscribe(connection.id(), reference_id);
			}
		});
	}

	async fn query(
		&self,
		connection: &Arc<Connection>,
		name: &str,
		filters: &[Prefilter],
	) -> Result<ResponsePayload> {
		let collection = self.engine.collection(name)?;
		let items = collection.snapshot(connection.principal(), filters).await?;
		Ok(ResponsePayload::Items {
			collection: name.to_string(),
			items,
		})
	}

	async fn create(&self, connection: &Arc<Connection>, name: &str, item: Item) -> Result<ResponsePayload> {
		let collection = self.engine.collection(name)?;
		let item = collection.add(connection.principal(), item).await?;
		Ok(ResponsePayload::Created {
			item,
		})
	}

	async fn update(&self, connection: &Arc<Connection>, name: &str, item: Item) -> Result<ResponsePayload> {
		let collection = self.engine.collection(name)?;
		let item = collection.update(connection.principal(), item).await?;
		Ok(ResponsePayload::Updated {
			item,
		})
	}

	async fn remove(&self, connection: &Arc<Connection>, name: &str, id: &Value) -> Result<ResponsePayload> {
		let collection = self.engine.collection(name)?;
		collection.remove(connection.principal(), id).await?;
		Ok(ResponsePayload::Removed)
	}

	/// Identity-collection subscription. Gated by the `users` collection's
	/// Query rule when one is registered; otherwise a valid bearer identity
	/// is required.
	async fn subscribe_users(&self, connection: &Arc<Connection>, reference_id: &str) -> Result<ResponsePayload> {
		self.authorize_users(connection, Operation::Query)?;

		connection.set_users_subscription(reference_id);
		let users = self.engine.identity().users().await?;
		Ok(ResponsePayload::Users {
			users,
		})
	}

	/// Delete a user through the identity collaborator, then push the
	/// refreshed user list to every users subscriber.
	async fn delete_user(&self, connection: &Arc<Connection>, user_id: &str) -> Result<ResponsePayload> {
		self.authorize_users(connection, Operation::Remove)?;

		self.engine.identity().delete_user(user_id).await?;

		match self.engine.identity().users().await {
			Ok(users) => self.registry.broadcast_users(&users).await,
			Err(e) => {
				tracing::warn!(error = %e, "user list unavailable after delete, skipping broadcast");
			}
		}
		Ok(ResponsePayload::UserDeleted)
	}

	fn authorize_users(&self, connection: &Arc<Connection>, operation: Operation) -> Result<()> {
		if let Ok(users) = self.engine.collection("users") {
			return users.authorize(operation, connection.principal());
		}
		let identity = self.engine.identity();
		if !identity.is_authenticated(connection.principal()) {
			return Err(Error::Unauthorized);
		}
		Ok(())
	}
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! One logical client session and the process-wide connection registry.
//!
//! A connection owns its outbound channel (the writer task holds the actual
//! socket sink) and its set of active subscription references, guarded by a
//! single short-hold mutex. The registry supports add/remove and iteration
//! for broadcast, mirroring the engine-side per-collection indices.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use riptide_auth::Principal;
use riptide_engine::{ConnectionId, PushUpdate};

use crate::protocol::Response;

pub struct Connection {
	id: ConnectionId,
	principal: Principal,
	bearer_valid: bool,
	/// Channel to the writer task that owns the socket sink. Closed senders
	/// suppress delivery: a response finishing after the transport died is
	/// silently discarded.
	outbound: mpsc::Sender<Message>,
	/// Channel the engine pushes subscription updates into.
	push_tx: mpsc::Sender<PushUpdate>,
	/// reference id → collection name. Guarded by the connection's mutex;
	/// hold times are short and never span an await.
	subscriptions: Mutex<HashMap<String, String>>,
	/// Reference id of the identity-collection subscription, if any.
	users_subscription: Mutex<Option<String>>,
}

impl Connection {
	pub fn new(
		id: ConnectionId,
		principal: Principal,
		bearer_valid: bool,
		outbound: mpsc::Sender<Message>,
		push_tx: mpsc::Sender<PushUpdate>,
	) -> Self {
		Self {
			id,
			principal,
			bearer_valid,
			outbound,
			push_tx,
			subscriptions: Mutex::new(HashMap::new()),
			users_subscription: Mutex::new(None),
		}
	}

	pub fn id(&self) -> ConnectionId {
		self.id
	}

	pub fn principal(&self) -> &Principal {
		&self.principal
	}

	pub fn bearer_valid(&self) -> bool {
		self.bearer_valid
	}

	/// The channel engine subscriptions push into.
	pub fn push_tx(&self) -> mpsc::Sender<PushUpdate> {
		self.push_tx.clone()
	}

	/// Serialize and enqueue a response frame. Errors are deliberately
	/// swallowed: a closed outbound channel means the transport is gone and
	/// the response has nowhere to go.
	pub async fn send(&self, response: &Response) {
		let json = match serde_json::to_string(response) {
			Ok(json) => json,
			Err(e) => {
				tracing::error!(connection = %self.id, error = %e, "failed to serialize response");
				return;
			}
		};
		let _ = self.outbound.send(Message::Text(json.into())).await;
	}

	pub(crate) async fn send_raw(&self, message: Message) {
		let _ = self.outbound.send(message).await;
	}

	/// Track a subscription reference under the connection's lock. The
	/// `register` callback runs while the lock is still held, with the
	/// collection the reference id moved from (if the resubscribe moved it),
	/// so commands racing on the same connection can never observe the
	/// reference map and the engine-side indices out of step.
	pub fn track_subscription<F>(&self, reference_id: &str, collection: &str, register: F)
	where
		F: FnOnce(Option<&str>),
	{
		let mut subscriptions = self.subscriptions.lock();
		let moved_from = subscriptions
			.insert(reference_id.to_string(), collection.to_string())
			.filter(|old| old != collection);
		register(moved_from.as_deref());
	}

	/// Stop tracking a reference id. The `deregister` callback runs under
	/// the same lock with the collection the reference pointed at. Absent
	/// ids return `false` without invoking it, so unsubscribing twice is a
	/// no-op.
	pub fn untrack_subscription<F>(&self, reference_id: &str, deregister: F) -> bool
	where
		F: FnOnce(&str),
	{
		let mut subscriptions = self.subscriptions.lock();
		match subscriptions.remove(reference_id) {
			Some(collection) => {
				deregister(&collection);
				true
			}
			None => false,
		}
	}

	pub fn set_users_subscription(&self, reference_id: &str) {
		*self.users_subscription.lock() = Some(reference_id.to_string());
	}

	/// The users-subscription reference id, if this connection holds one.
	pub fn users_subscription(&self) -> Option<String> {
		self.users_subscription.lock().clone()
	}

	pub fn clear_users_subscription(&self, reference_id: &str) {
		let mut slot = self.users_subscription.lock();
		if slot.as_deref() == Some(reference_id) {
			*slot = None;
		}
	}
}

/// Process-wide registry of all open connections.
#[derive(Default)]
pub struct ConnectionRegistry {
	connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl ConnectionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&self, connection: Arc<Connection>) {
		self.connections.insert(connection.id(), connection);
	}

	pub fn remove(&self, id: ConnectionId) {
		self.connections.remove(&id);
	}

	pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
		self.connections.get(&id).map(|entry| entry.value().clone())
	}

	pub fn len(&self) -> usize {
		self.connections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.connections.is_empty()
	}

	/// Broadcast to every connection holding a users subscription.
	pub async fn broadcast_users(&self, users: &[riptide_core::Item]) {
		let targets: Vec<_> = self
			.connections
			.iter()
			.filter_map(|entry| {
				entry.value().users_subscription().map(|reference| (entry.value().clone(), reference))
			})
			.collect();

		for (connection, reference) in targets {
			connection
				.send(&Response::new(
					reference,
					crate::protocol::ResponsePayload::Users {
						users: users.to_vec(),
					},
				))
				.await;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use uuid::Uuid;

	use super::*;

	fn connection() -> (Arc<Connection>, mpsc::Receiver<Message>) {
		let (outbound, rx) = mpsc::channel(8);
		let (push_tx, _push_rx) = mpsc::channel(8);
		let connection = Arc::new(Connection::new(Uuid::now_v7(), Principal::anonymous(), false, outbound, push_tx));
		(connection, rx)
	}

	#[test]
	fn test_track_reports_moved_collection_only() {
		let (connection, _rx) = connection();
		let mut moved: Option<String> = None;

		connection.track_subscription("r1", "tasks", |m| moved = m.map(str::to_string));
		assert_eq!(moved, None);
		// Same collection again: a replace, nothing to clean elsewhere.
		connection.track_subscription("r1", "tasks", |m| moved = m.map(str::to_string));
		assert_eq!(moved, None);
		// Moved to another collection: the old one must be cleaned up.
		connection.track_subscription("r1", "notes", |m| moved = m.map(str::to_string));
		assert_eq!(moved.as_deref(), Some("tasks"));

		let mut removed: Option<String> = None;
		assert!(connection.untrack_subscription("r1", |c| removed = Some(c.to_string())));
		assert_eq!(removed.as_deref(), Some("notes"));
		assert!(!connection.untrack_subscription("r1", |_| panic!("deregister ran for an absent id")));
	}

	#[test]
	fn test_users_subscription_slot() {
		let (connection, _rx) = connection();
		assert_eq!(connection.users_subscription(), None);
		connection.set_users_subscription("r7");
		assert_eq!(connection.users_subscription(), Some("r7".to_string()));
		// Clearing a different reference leaves the slot untouched.
		connection.clear_users_subscription("r8");
		assert_eq!(connection.users_subscription(), Some("r7".to_string()));
		connection.clear_users_subscription("r7");
		assert_eq!(connection.users_subscription(), None);
	}

	#[tokio::test]
	async fn test_send_after_writer_death_is_suppressed() {
		let (connection, rx) = connection();
		drop(rx);
		// Must not panic or error: the transport is simply gone.
		connection.send(&Response::error("r1", &riptide_core::Error::Unauthorized)).await;
	}

	#[test]
	fn test_registry_add_remove() {
		let registry = ConnectionRegistry::new();
		let (connection, _rx) = connection();
		let id = connection.id();

		registry.add(connection);
		assert_eq!(registry.len(), 1);
		assert!(registry.get(id).is_some());

		registry.remove(id);
		assert!(registry.is_empty());
	}
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Standing subscriptions and the per-collection subscription index.
//!
//! The index maps a pipeline identity (the structural hash of the ordered
//! filter list) to the subscriptions using an equivalent pipeline shape, so
//! the change notifier re-executes each shape once per write instead of once
//! per subscriber.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use riptide_auth::Principal;
use riptide_core::{Item, PipelineKey, Prefilter, pipeline_key};

/// Unique identifier of a client connection, assigned at accept time.
pub type ConnectionId = Uuid;

/// A freshly computed result set pushed to a subscription's connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PushUpdate {
	pub collection: String,
	/// Caller-chosen reference id of the subscription this update answers.
	pub reference_id: String,
	pub items: Vec<Item>,
}

/// A standing registration: a connection's interest in a collection,
/// narrowed by a prefilter pipeline.
///
/// Identity is `(connection_id, reference_id)`; reference ids are unique per
/// connection only. The principal is carried for re-authorization on every
/// push; the subscription never caches roles.
#[derive(Debug, Clone)]
pub struct Subscription {
	pub connection_id: ConnectionId,
	pub reference_id: String,
	pub principal: Principal,
	pub filters: Vec<Prefilter>,
	/// The owning connection's outbound channel.
	pub push_tx: mpsc::Sender<PushUpdate>,
}

struct PipelineGroup {
	filters: Vec<Prefilter>,
	subscribers: Vec<Subscription>,
}

/// Per-collection subscription index, owned by the collection itself.
///
/// Mutations (subscribe, unsubscribe, connection drop) and fan-out reads are
/// mutually exclusive per collection; different collections are independent.
#[derive(Default)]
pub struct CollectionSubscriptions {
	groups: RwLock<HashMap<PipelineKey, PipelineGroup>>,
}

impl CollectionSubscriptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a subscription, replacing any prior subscription with the
	/// same `(connection_id, reference_id)`; resubscribing the same
	/// reference id never duplicates.
	pub fn subscribe(&self, subscription: Subscription) {
		let key = pipeline_key(&subscription.filters);
		let mut groups = self.groups.write();

		Self::remove_locked(&mut groups, subscription.connection_id, &subscription.reference_id);

		groups.entry(key)
			.or_insert_with(|| PipelineGroup {
				filters: subscription.filters.clone(),
				subscribers: Vec::new(),
			})
			.subscribers
			.push(subscription);
	}

	/// Remove one subscription. A missing reference id is a no-op, not a
	/// fault, so unsubscribing twice succeeds.
	pub fn unsubscribe(&self, connection_id: ConnectionId, reference_id: &str) -> bool {
		let mut groups = self.groups.write();
		Self::remove_locked(&mut groups, connection_id, reference_id)
	}

	/// Remove every subscription owned by a connection (transport closed).
	pub fn drop_connection(&self, connection_id: ConnectionId) {
		let mut groups = self.groups.write();
		for group in groups.values_mut() {
			group.subscribers.retain(|s| s.connection_id != connection_id);
		}
		groups.retain(|_, group| !group.subscribers.is_empty());
	}

	fn remove_locked(
		groups: &mut HashMap<PipelineKey, PipelineGroup>,
		connection_id: ConnectionId,
		reference_id: &str,
	) -> bool {
		let mut removed = false;
		for group in groups.values_mut() {
			let before = group.subscribers.len();
			group.subscribers.retain(|s| !(s.connection_id == connection_id && s.reference_id == reference_id));
			removed |= group.subscribers.len() != before;
		}
		groups.retain(|_, group| !group.subscribers.is_empty());
		removed
	}

	/// Snapshot of the pipeline groups for fan-out: the lock is released
	/// before any storage I/O or channel send happens.
	pub fn snapshot(&self) -> Vec<(Vec<Prefilter>, Vec<Subscription>)> {
		self.groups
			.read()
			.values()
			.map(|group| (group.filters.clone(), group.subscribers.clone()))
			.collect()
	}

	pub fn is_empty(&self) -> bool {
		self.groups.read().is_empty()
	}

	#[cfg(test)]
	pub fn group_count(&self) -> usize {
		self.groups.read().len()
	}

	#[cfg(test)]
	pub fn subscriber_count(&self) -> usize {
		self.groups.read().values().map(|g| g.subscribers.len()).sum()
	}
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Change propagation.
//!
//! Triggered after every successful write with the committed item and the
//! operation kind. Pushes the full freshly computed result set per
//! subscription, never a diff. Each distinct pipeline shape is re-executed
//! once, not once per subscriber.

use riptide_auth::Operation;
use riptide_core::{Item, apply};

use crate::{collection::Collection, subscription::PushUpdate};

/// The kind of write that triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
	Created,
	Updated,
	Removed,
}

impl Collection {
	/// Re-evaluate every subscription on this collection and push updated
	/// result sets to qualifying connections.
	///
	/// Enqueued strictly after the triggering write's storage call returned;
	/// a subscriber whose Query capability has been revoked since subscribing
	/// is skipped silently; the client simply stops receiving updates, so
	/// the shape of the access policy never leaks.
	pub(crate) async fn notify_change(&self, kind: WriteKind, item: &Item) {
		let groups = self.subscriptions.snapshot();
		if groups.is_empty() {
			return;
		}

		tracing::debug!(
			collection = self.name(),
			?kind,
			id = %item.id().cloned().unwrap_or_default(),
			groups = groups.len(),
			"notifying subscriptions"
		);

		let items = match self.storage().get_all(self.name()).await {
			Ok(items) => items,
			Err(e) => {
				tracing::warn!(collection = self.name(), error = %e, "fan-out read failed, skipping notification");
				return;
			}
		};

		for (filters, subscribers) in groups {
			// One pipeline execution per distinct shape.
			let result = match apply(items.clone(), &filters) {
				Ok(result) => result,
				Err(e) => {
					tracing::warn!(collection = self.name(), error = %e, "pipeline failed during fan-out");
					continue;
				}
			};

			for subscription in subscribers {
				if self.authorize(Operation::Query, &subscription.principal).is_err() {
					// Intentional silent skip; see module docs.
					tracing::debug!(
						collection = self.name(),
						connection = %subscription.connection_id,
						reference = subscription.reference_id,
						"query capability revoked, skipping push"
					);
					continue;
				}

				let update = PushUpdate {
					collection: self.name().to_string(),
					reference_id: subscription.reference_id.clone(),
					items: result.clone(),
				};

				// A full or closed channel never blocks the writer; the
				// connection's own cleanup removes dead subscriptions.
				if let Err(e) = subscription.push_tx.try_send(update) {
					tracing::warn!(
						collection = self.name(),
						connection = %subscription.connection_id,
						reference = subscription.reference_id,
						error = %e,
						"failed to push update"
					);
				}
			}
		}
	}
}

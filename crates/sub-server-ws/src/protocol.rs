// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Wire protocol: JSON request and response envelopes.
//!
//! The command catalog is a closed set; an unrecognized `type` fails decoding
//! and is answered with an `UNKNOWN_COMMAND` error when a reference id could
//! be extracted, or dropped with a warning when the frame is not even an
//! object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use riptide_core::{Error, Item, Prefilter};
use riptide_engine::ConnectionId;

/// Inbound message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Caller-supplied reference id, echoed on every response.
	pub id: String,
	#[serde(flatten)]
	pub payload: RequestPayload,
}

/// The closed command catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RequestPayload {
	/// Standing registration on a collection, narrowed by a pipeline.
	Subscribe {
		collection: String,
		#[serde(default)]
		filters: Vec<Prefilter>,
	},
	/// Remove the subscription registered under this frame's reference id.
	Unsubscribe,
	/// Non-subscribing point-in-time read.
	Query {
		collection: String,
		#[serde(default)]
		filters: Vec<Prefilter>,
	},
	Create {
		collection: String,
		item: Item,
	},
	Update {
		collection: String,
		item: Item,
	},
	Remove {
		collection: String,
		id: Value,
	},
	/// Identity-collection variant with elevated handling.
	SubscribeUsers,
	DeleteUser {
		id: String,
	},
}

/// Outbound message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Reference id of the command this answers. Empty only for the
	/// accept-time `Connected` frame, which has no correlating command.
	#[serde(default)]
	pub id: String,
	#[serde(flatten)]
	pub payload: ResponsePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ResponsePayload {
	/// Sent once after a successful upgrade.
	Connected {
		connection_id: ConnectionId,
		bearer_valid: bool,
	},
	/// Initial subscription result, query snapshot, or push notification.
	Items {
		collection: String,
		items: Vec<Item>,
	},
	Created {
		item: Item,
	},
	Updated {
		item: Item,
	},
	Removed,
	Unsubscribed,
	Users {
		users: Vec<Item>,
	},
	UserDeleted,
	Error {
		code: String,
		message: String,
	},
}

impl Response {
	pub fn new(id: impl Into<String>, payload: ResponsePayload) -> Self {
		Self {
			id: id.into(),
			payload,
		}
	}

	/// Convert a fault into its wire form, tagged with the originating
	/// reference id.
	pub fn error(id: impl Into<String>, error: &Error) -> Self {
		Self::new(
			id,
			ResponsePayload::Error {
				code: error.code().to_string(),
				message: error.to_string(),
			},
		)
	}

	pub fn is_error(&self) -> bool {
		matches!(self.payload, ResponsePayload::Error { .. })
	}
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Error taxonomy shared across the engine and the server subsystems.
//!
//! Every fault that can surface on the wire carries a stable machine-readable
//! code next to its human-readable message. The presence of an error response
//! is the sole failure signal of the protocol; there is no separate status
//! field.

use thiserror::Error;

/// Faults produced by Riptide components.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	/// The operation demands a valid bearer identity and none was presented.
	#[error("authentication required")]
	Unauthorized,

	/// Authenticated, but the caller's role set lacks the capability.
	#[error("missing {operation} capability on collection '{collection}'")]
	Forbidden {
		collection: String,
		operation: String,
	},

	/// The operation targets an item that does not exist.
	#[error("no item '{id}' in collection '{collection}'")]
	NotFound {
		collection: String,
		id: String,
	},

	/// Malformed pagination or ordering argument.
	#[error("invalid filter argument: {0}")]
	InvalidFilterArgument(String),

	/// The inbound frame decoded, but names no known command.
	#[error("unknown command: {0}")]
	UnknownCommand(String),

	/// Storage collaborator failure, opaque cause preserved.
	#[error("storage error: {0}")]
	Storage(String),

	/// Connection-level failure, not attributable to a single command.
	#[error("transport error: {0}")]
	Transport(String),
}

impl Error {
	/// Stable wire code for this fault.
	pub fn code(&self) -> &'static str {
		match self {
			Error::Unauthorized => "UNAUTHORIZED",
			Error::Forbidden {
				..
			} => "FORBIDDEN",
			Error::NotFound {
				..
			} => "NOT_FOUND",
			Error::InvalidFilterArgument(_) => "INVALID_FILTER",
			Error::UnknownCommand(_) => "UNKNOWN_COMMAND",
			Error::Storage(_) => "STORAGE_ERROR",
			Error::Transport(_) => "TRANSPORT_ERROR",
		}
	}

	pub fn not_found(collection: impl Into<String>, id: impl ToString) -> Self {
		Error::NotFound {
			collection: collection.into(),
			id: id.to_string(),
		}
	}

	pub fn forbidden(collection: impl Into<String>, operation: impl Into<String>) -> Self {
		Error::Forbidden {
			collection: collection.into(),
			operation: operation.into(),
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Per-collection, per-operation capability rules.

use serde::{Deserialize, Serialize};

use riptide_core::{Error, Result};

/// The four gated collection operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
	Query,
	Create,
	Update,
	Remove,
}

impl Operation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::Query => "query",
			Operation::Create => "create",
			Operation::Update => "update",
			Operation::Remove => "remove",
		}
	}
}

/// Rule for a single operation on a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationRule {
	/// Whether the operation demands a valid bearer identity at all.
	pub require_authentication: bool,
	/// Roles permitted to perform the operation; `None` permits any caller
	/// (subject to the authentication layer).
	pub allowed_roles: Option<Vec<String>>,
}

impl OperationRule {
	/// Open to everyone, authenticated or not.
	pub fn open() -> Self {
		Self::default()
	}

	/// Requires a valid bearer identity, any role.
	pub fn authenticated() -> Self {
		Self {
			require_authentication: true,
			allowed_roles: None,
		}
	}

	/// Requires a valid bearer identity holding one of the given roles.
	pub fn roles<I, S>(roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			require_authentication: true,
			allowed_roles: Some(roles.into_iter().map(Into::into).collect()),
		}
	}
}

/// The authorization gate for one collection: one rule per operation.
///
/// Both layers of a rule are independently queryable so a caller can
/// introspect its permissions before attempting an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPolicy {
	pub query: OperationRule,
	pub create: OperationRule,
	pub update: OperationRule,
	pub remove: OperationRule,
}

impl CollectionPolicy {
	/// Every operation open to everyone.
	pub fn open() -> Self {
		Self::default()
	}

	/// Every operation requires a valid bearer identity.
	pub fn authenticated() -> Self {
		Self {
			query: OperationRule::authenticated(),
			create: OperationRule::authenticated(),
			update: OperationRule::authenticated(),
			remove: OperationRule::authenticated(),
		}
	}

	pub fn with_query(mut self, rule: OperationRule) -> Self {
		self.query = rule;
		self
	}

	pub fn with_create(mut self, rule: OperationRule) -> Self {
		self.create = rule;
		self
	}

	pub fn with_update(mut self, rule: OperationRule) -> Self {
		self.update = rule;
		self
	}

	pub fn with_remove(mut self, rule: OperationRule) -> Self {
		self.remove = rule;
		self
	}

	fn rule(&self, operation: Operation) -> &OperationRule {
		match operation {
			Operation::Query => &self.query,
			Operation::Create => &self.create,
			Operation::Update => &self.update,
			Operation::Remove => &self.remove,
		}
	}

	/// Layer (a): does the operation demand a valid bearer identity?
	pub fn requires_authentication(&self, operation: Operation) -> bool {
		self.rule(operation).require_authentication
	}

	/// Layer (b): does the caller's role set intersect the permitted roles?
	pub fn roles_permit(&self, operation: Operation, roles: &[String]) -> bool {
		match &self.rule(operation).allowed_roles {
			None => true,
			Some(allowed) => roles.iter().any(|r| allowed.contains(r)),
		}
	}

	/// Combined check: both layers must pass.
	///
	/// Returns `Unauthorized` when the authentication layer fails and
	/// `Forbidden` when the role layer fails, tagged with the collection and
	/// operation for the wire.
	pub fn authorize(
		&self,
		collection: &str,
		operation: Operation,
		authenticated: bool,
		roles: &[String],
	) -> Result<()> {
		if self.requires_authentication(operation) && !authenticated {
			return Err(Error::Unauthorized);
		}
		if !self.roles_permit(operation, roles) {
			return Err(Error::forbidden(collection, operation.as_str()));
		}
		Ok(())
	}
}

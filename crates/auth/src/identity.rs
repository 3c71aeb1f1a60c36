// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Identity collaborator interface.
//!
//! The engine never verifies credentials itself; it resolves the caller's
//! authentication state and current role set through this trait on every
//! evaluation. The trait is statically typed and resolved at composition
//! time; there is no dynamic service lookup.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use riptide_core::{Error, Item, Result};

/// Opaque caller identity captured at accept time.
///
/// Immutable for the connection's lifetime. Roles are deliberately absent:
/// they are resolved through [`IdentityProvider::current_roles`] on every
/// authorization evaluation so mid-session role changes take effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
	/// Bearer token presented at upgrade time, if any.
	pub token: Option<String>,
	/// Resolved user id, if the token was valid.
	pub user_id: Option<String>,
}

impl Principal {
	pub fn anonymous() -> Self {
		Self::default()
	}
}

/// External identity collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
	/// Resolve a bearer token into a principal. An invalid or absent token
	/// yields an anonymous principal; upgrade is not refused for it.
	fn authenticate(&self, token: Option<&str>) -> Principal;

	/// Whether the principal carries a valid bearer identity right now.
	fn is_authenticated(&self, principal: &Principal) -> bool;

	/// The principal's current role set. Queried on every authorization
	/// evaluation, never cached by callers.
	fn current_roles(&self, principal: &Principal) -> Vec<String>;

	/// All known users, as items (without credential material).
	async fn users(&self) -> Result<Vec<Item>>;

	async fn find_user_by_id(&self, id: &str) -> Result<Option<Item>>;

	/// Delete a user and its role assignments.
	async fn delete_user(&self, id: &str) -> Result<()>;
}

/// A user record of the in-memory identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticUser {
	pub id: String,
	pub username: String,
	pub token: String,
	pub roles: Vec<String>,
}

/// In-memory identity provider for tests and the demo server.
///
/// Tokens map straight to users; `set_roles` mutates role assignments at
/// runtime, which is what the silent re-authorization drop during fan-out is
/// tested against.
#[derive(Default)]
pub struct StaticIdentity {
	users: RwLock<Vec<StaticUser>>,
}

impl StaticIdentity {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_user(&self, user: StaticUser) {
		self.users.write().push(user);
	}

	pub fn with_user(self, user: StaticUser) -> Self {
		self.add_user(user);
		self
	}

	/// Replace a user's role set. Takes effect on the next evaluation.
	pub fn set_roles<I, S>(&self, user_id: &str, roles: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut users = self.users.write();
		if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
			user.roles = roles.into_iter().map(Into::into).collect();
		}
	}

	fn to_item(user: &StaticUser) -> Item {
		// Tokens never leave the provider.
		Item::new()
			.with("id", user.id.clone())
			.with("username", user.username.clone())
			.with("roles", user.roles.clone())
	}
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
	fn authenticate(&self, token: Option<&str>) -> Principal {
		let Some(token) = token else {
			return Principal::anonymous();
		};
		let users = self.users.read();
		match users.iter().find(|u| u.token == token) {
			Some(user) => Principal {
				token: Some(token.to_string()),
				user_id: Some(user.id.clone()),
			},
			None => Principal::anonymous(),
		}
	}

	fn is_authenticated(&self, principal: &Principal) -> bool {
		// Validity is re-derived, not trusted from the principal: a deleted
		// user stops being authenticated mid-session.
		match &principal.user_id {
			Some(id) => self.users.read().iter().any(|u| &u.id == id),
			None => false,
		}
	}

	fn current_roles(&self, principal: &Principal) -> Vec<String> {
		let Some(id) = &principal.user_id else {
			return Vec::new();
		};
		self.users
			.read()
			.iter()
			.find(|u| &u.id == id)
			.map(|u| u.roles.clone())
			.unwrap_or_default()
	}

	async fn users(&self) -> Result<Vec<Item>> {
		Ok(self.users.read().iter().map(Self::to_item).collect())
	}

	async fn find_user_by_id(&self, id: &str) -> Result<Option<Item>> {
		Ok(self.users.read().iter().find(|u| u.id == id).map(Self::to_item))
	}

	async fn delete_user(&self, id: &str) -> Result<()> {
		let mut users = self.users.write();
		let before = users.len();
		users.retain(|u| u.id != id);
		if users.len() == before {
			return Err(Error::not_found("users", id));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn provider() -> StaticIdentity {
		StaticIdentity::new().with_user(StaticUser {
			id: "u1".into(),
			username: "amy".into(),
			token: "amy-token".into(),
			roles: vec!["admin".into()],
		})
	}

	#[test]
	fn test_authenticate_resolves_token() {
		let identity = provider();
		let principal = identity.authenticate(Some("amy-token"));
		assert_eq!(principal.user_id.as_deref(), Some("u1"));
		assert!(identity.is_authenticated(&principal));

		let anonymous = identity.authenticate(Some("bogus"));
		assert_eq!(anonymous, Principal::anonymous());
		assert!(!identity.is_authenticated(&anonymous));
	}

	#[test]
	fn test_roles_reflect_runtime_changes() {
		let identity = provider();
		let principal = identity.authenticate(Some("amy-token"));
		assert_eq!(identity.current_roles(&principal), vec!["admin".to_string()]);

		identity.set_roles("u1", ["viewer"]);
		assert_eq!(identity.current_roles(&principal), vec!["viewer".to_string()]);
	}

	#[tokio::test]
	async fn test_delete_user_revokes_authentication() {
		let identity = provider();
		let principal = identity.authenticate(Some("amy-token"));

		identity.delete_user("u1").await.unwrap();
		assert!(!identity.is_authenticated(&principal));
		assert!(identity.current_roles(&principal).is_empty());
		assert_eq!(identity.delete_user("u1").await.unwrap_err().code(), "NOT_FOUND");
	}

	#[tokio::test]
	async fn test_user_items_omit_tokens() {
		let identity = provider();
		let users = identity.users().await.unwrap();
		assert_eq!(users.len(), 1);
		assert_eq!(users[0].get("username"), Some(&serde_json::Value::from("amy")));
		assert!(users[0].get("token").is_none());
	}
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Authorization gate and identity collaborator interface.
//!
//! The gate evaluates two independent layers per collection and operation:
//! an authentication requirement and a role capability. Both layers are
//! re-evaluated on every operation and on every notification push; roles are
//! never cached beyond a single evaluation, because role assignments can
//! change mid-session.

pub mod gate;
pub mod identity;

pub use gate::{CollectionPolicy, Operation, OperationRule};
pub use identity::{IdentityProvider, Principal, StaticIdentity, StaticUser};

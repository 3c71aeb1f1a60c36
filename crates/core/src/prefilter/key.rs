// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Structural pipeline identity.
//!
//! Subscriptions that share an equivalent pipeline shape are grouped so the
//! change notifier re-executes each shape once per write instead of once per
//! subscriber. The grouping key is a deterministic hash of the ordered filter
//! list; it is an amortization key, not a semantic equality proof.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use super::Prefilter;

/// Deterministic structural hash of an ordered prefilter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineKey(pub u64);

impl std::fmt::Display for PipelineKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:016x}", self.0)
	}
}

/// Compute the identity of a pipeline.
///
/// Hashes the canonical JSON serialization of the ordered filter list, so two
/// pipelines with the same filters in the same order always collide into one
/// group and pipelines differing in any filter, argument or position do not.
pub fn pipeline_key(filters: &[Prefilter]) -> PipelineKey {
	let bytes = serde_json::to_vec(filters).expect("prefilter serialization cannot fail");
	PipelineKey(xxh3_64(&bytes))
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use async_trait::async_trait;
use riptide_core::Result;

/// Health of a running subsystem, as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
	Healthy,
	Warning {
		description: String,
	},
	Failed {
		description: String,
	},
}

/// Lifecycle interface implemented by every server subsystem.
///
/// `start` is idempotent; `shutdown` drains in-flight work before returning.
#[async_trait]
pub trait Subsystem: Send + Sync {
	fn name(&self) -> &'static str;

	async fn start(&mut self) -> Result<()>;

	async fn shutdown(&mut self) -> Result<()>;

	fn is_running(&self) -> bool;

	fn health_status(&self) -> HealthStatus;
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Demo server: in-memory storage, static identities and a couple of
//! collections behind the WebSocket subsystem.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use riptide_auth::{CollectionPolicy, OperationRule, StaticIdentity, StaticUser};
use riptide_core::Item;
use riptide_engine::Engine;
use riptide_storage::MemoryStorage;
use riptide_sub_api::Subsystem;
use riptide_sub_server_ws::{WsConfig, WsSubsystem};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let storage = Arc::new(MemoryStorage::new());
	storage.seed(
		"tasks",
		vec![
			Item::new().with("id", 1).with("title", "write the readme").with("done", false),
			Item::new().with("id", 2).with("title", "wire up the demo").with("done", true),
		],
	);

	let identity = Arc::new(
		StaticIdentity::new()
			.with_user(StaticUser {
				id: "u-admin".into(),
				username: "admin".into(),
				token: "admin-token".into(),
				roles: vec!["admin".into()],
			})
			.with_user(StaticUser {
				id: "u-demo".into(),
				username: "demo".into(),
				token: "demo-token".into(),
				roles: vec![],
			}),
	);

	let engine = Arc::new(Engine::new(storage, identity));
	engine.register("tasks", CollectionPolicy::open());
	engine.register(
		"notes",
		CollectionPolicy::authenticated().with_remove(OperationRule::roles(["admin"])),
	);

	let mut server = WsSubsystem::new(WsConfig::default(), engine);
	server.start().await?;
	if let Some(addr) = server.local_addr() {
		tracing::info!("riptide listening on ws://{addr}");
	}

	tokio::signal::ctrl_c().await?;
	tracing::info!("shutting down");
	server.shutdown().await?;
	Ok(())
}

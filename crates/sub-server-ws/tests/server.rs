// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! End-to-end tests over a real socket: handshake, command round-trips and
//! push delivery.

use std::{
	sync::{Arc, Once},
	time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing_subscriber::EnvFilter;

use riptide_auth::{CollectionPolicy, StaticIdentity, StaticUser};
use riptide_engine::Engine;
use riptide_storage::MemoryStorage;
use riptide_sub_api::Subsystem;
use riptide_sub_server_ws::{WsConfig, WsSubsystem};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn identity_with_users() -> StaticIdentity {
	StaticIdentity::new()
		.with_user(StaticUser {
			id: "u-amy".into(),
			username: "amy".into(),
			token: "amy-token".into(),
			roles: vec!["admin".into()],
		})
		.with_user(StaticUser {
			id: "u-bob".into(),
			username: "bob".into(),
			token: "bob-token".into(),
			roles: vec![],
		})
}

fn init_tracing() {
	static INIT: Once = Once::new();
	INIT.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
			.with_test_writer()
			.try_init();
	});
}

async fn start(engine: Arc<Engine>, secret: Option<&str>) -> (WsSubsystem, u16) {
	init_tracing();
	let config = WsConfig {
		bind_addr: "127.0.0.1:0".to_string(),
		secret: secret.map(str::to_string),
		..WsConfig::default()
	};
	let mut subsystem = WsSubsystem::new(config, engine);
	subsystem.start().await.unwrap();
	let port = subsystem.port().unwrap();
	(subsystem, port)
}

async fn connect(port: u16, query: &str) -> Client {
	let (client, _) = connect_async(format!("ws://127.0.0.1:{port}/{query}")).await.unwrap();
	client
}

async fn next_frame(client: &mut Client) -> Value {
	loop {
		let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
			.await
			.expect("timed out waiting for frame")
			.expect("stream ended")
			.expect("read error");
		if let Message::Text(text) = frame {
			return serde_json::from_str(&text).unwrap();
		}
	}
}

async fn send(client: &mut Client, frame: Value) {
	client.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Read frames until the one answering `id` arrives, returning any pushes
/// seen on the way.
async fn await_response(client: &mut Client, id: &str) -> (Value, Vec<Value>) {
	let mut pushes = Vec::new();
	loop {
		let frame = next_frame(client).await;
		if frame["id"] == id {
			return (frame, pushes);
		}
		pushes.push(frame);
	}
}

/// Read frames until both the response answering `response_id` and a push
/// tagged `push_id` have arrived. Push delivery runs concurrently with the
/// command, so their relative order on the wire is not fixed.
async fn await_response_and_push(client: &mut Client, response_id: &str, push_id: &str) -> (Value, Value) {
	let mut response = None;
	let mut push = None;
	while response.is_none() || push.is_none() {
		let frame = next_frame(client).await;
		if frame["id"] == response_id {
			response = Some(frame);
		} else if frame["id"] == push_id {
			push = Some(frame);
		}
	}
	(response.unwrap(), push.unwrap())
}

#[tokio::test]
async fn test_connected_frame_reports_bearer_validity() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(identity_with_users())));
	let (_subsystem, port) = start(engine, None).await;

	let mut anonymous = connect(port, "").await;
	let frame = next_frame(&mut anonymous).await;
	assert_eq!(frame["type"], "Connected");
	assert_eq!(frame["id"], "");
	assert_eq!(frame["payload"]["bearer_valid"], false);
	assert!(frame["payload"]["connection_id"].is_string());

	let mut amy = connect(port, "?bearer=amy-token").await;
	let frame = next_frame(&mut amy).await;
	assert_eq!(frame["payload"]["bearer_valid"], true);
}

#[tokio::test]
async fn test_subscribe_pushes_full_sorted_result_sets() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(StaticIdentity::new())));
	engine.register("tasks", CollectionPolicy::open());
	let (_subsystem, port) = start(engine, None).await;

	let mut client = connect(port, "").await;
	next_frame(&mut client).await;

	send(
		&mut client,
		json!({"id": "s1", "type": "Subscribe", "payload": {"collection": "tasks", "filters": [
			{"type": "OrderBy", "payload": {"field": "title"}},
			{"type": "ThenBy", "payload": {"field": "id"}}
		]}}),
	)
	.await;
	let (initial, _) = await_response(&mut client, "s1").await;
	assert_eq!(initial["type"], "Items");
	assert_eq!(initial["payload"]["items"], json!([]));

	send(&mut client, json!({"id": "c1", "type": "Create", "payload": {"collection": "tasks", "item": {"title": "bob"}}}))
		.await;
	let (created, push) = await_response_and_push(&mut client, "c1", "s1").await;
	assert_eq!(created["type"], "Created");
	assert_eq!(push["type"], "Items");
	assert_eq!(push["payload"]["items"][0]["title"], "bob");

	send(&mut client, json!({"id": "c2", "type": "Create", "payload": {"collection": "tasks", "item": {"title": "amy"}}}))
		.await;
	let (_, push) = await_response_and_push(&mut client, "c2", "s1").await;

	// The push carries the complete re-evaluated result set, not a delta.
	let items = push["payload"]["items"].as_array().unwrap();
	assert_eq!(items.len(), 2);
	assert_eq!(items[0]["title"], "amy");
	assert_eq!(items[1]["title"], "bob");
}

#[tokio::test]
async fn test_query_page_beyond_count_is_empty() {
	let storage = Arc::new(MemoryStorage::new());
	storage.seed(
		"tasks",
		(1..=3).map(|n| riptide_core::Item::new().with("id", n)).collect(),
	);
	let engine = Arc::new(Engine::new(storage, Arc::new(StaticIdentity::new())));
	engine.register("tasks", CollectionPolicy::open());
	let (_subsystem, port) = start(engine, None).await;

	let mut client = connect(port, "").await;
	next_frame(&mut client).await;

	send(
		&mut client,
		json!({"id": "q1", "type": "Query", "payload": {"collection": "tasks", "filters": [
			{"type": "Skip", "payload": 5},
			{"type": "Take", "payload": 5}
		]}}),
	)
	.await;
	let (response, _) = await_response(&mut client, "q1").await;
	assert_eq!(response["type"], "Items");
	assert_eq!(response["payload"]["items"], json!([]));
}

#[tokio::test]
async fn test_remove_missing_item_is_not_found() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(StaticIdentity::new())));
	engine.register("tasks", CollectionPolicy::open());
	let (_subsystem, port) = start(engine, None).await;

	let mut client = connect(port, "").await;
	next_frame(&mut client).await;

	send(&mut client, json!({"id": "d1", "type": "Remove", "payload": {"collection": "tasks", "id": 999}})).await;
	let (response, _) = await_response(&mut client, "d1").await;
	assert_eq!(response["type"], "Error");
	assert_eq!(response["payload"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_secret_gate_rejects_handshake() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(StaticIdentity::new())));
	let (_subsystem, port) = start(engine, Some("s3cret")).await;

	assert!(connect_async(format!("ws://127.0.0.1:{port}/")).await.is_err());
	assert!(connect_async(format!("ws://127.0.0.1:{port}/?secret=wrong")).await.is_err());

	let mut client = connect(port, "?secret=s3cret").await;
	assert_eq!(next_frame(&mut client).await["type"], "Connected");
}

#[tokio::test]
async fn test_unauthorized_subscribe_is_refused() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(identity_with_users())));
	engine.register("private", CollectionPolicy::authenticated());
	let (_subsystem, port) = start(engine, None).await;

	let mut client = connect(port, "").await;
	next_frame(&mut client).await;

	send(&mut client, json!({"id": "s1", "type": "Subscribe", "payload": {"collection": "private"}})).await;
	let (response, _) = await_response(&mut client, "s1").await;
	assert_eq!(response["type"], "Error");
	assert_eq!(response["payload"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unsubscribe_without_subscription_succeeds() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(StaticIdentity::new())));
	let (_subsystem, port) = start(engine, None).await;

	let mut client = connect(port, "").await;
	next_frame(&mut client).await;

	send(&mut client, json!({"id": "never-subscribed", "type": "Unsubscribe"})).await;
	let (response, _) = await_response(&mut client, "never-subscribed").await;
	assert_eq!(response["type"], "Unsubscribed");
}

#[tokio::test]
async fn test_users_subscription_sees_deletions() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(identity_with_users())));
	let (_subsystem, port) = start(engine, None).await;

	let mut amy = connect(port, "?bearer=amy-token").await;
	next_frame(&mut amy).await;

	send(&mut amy, json!({"id": "su1", "type": "SubscribeUsers"})).await;
	let (response, _) = await_response(&mut amy, "su1").await;
	assert_eq!(response["type"], "Users");
	assert_eq!(response["payload"]["users"].as_array().unwrap().len(), 2);

	send(&mut amy, json!({"id": "du1", "type": "DeleteUser", "payload": {"id": "u-bob"}})).await;
	let (response, pushes) = await_response(&mut amy, "du1").await;
	assert_eq!(response["type"], "UserDeleted");

	// The refreshed user list was pushed under the users-subscription
	// reference before the command's own response.
	assert_eq!(pushes.len(), 1);
	assert_eq!(pushes[0]["id"], "su1");
	let users = pushes[0]["payload"]["users"].as_array().unwrap();
	assert_eq!(users.len(), 1);
	assert_eq!(users[0]["username"], "amy");
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
	let engine = Arc::new(Engine::new(Arc::new(MemoryStorage::new()), Arc::new(StaticIdentity::new())));
	let (mut subsystem, port) = start(engine, None).await;
	assert!(subsystem.is_running());

	let mut client = connect(port, "").await;
	next_frame(&mut client).await;

	subsystem.shutdown().await.unwrap();

	// The server sends a close frame and the stream ends.
	let ended = tokio::time::timeout(Duration::from_secs(5), async {
		while let Some(frame) = client.next().await {
			if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
				break;
			}
		}
	})
	.await;
	assert!(ended.is_ok());
	assert_eq!(subsystem.active_connections(), 0);
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Per-connection lifecycle: handshake, frame loop and teardown.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::{
	net::TcpStream,
	sync::{mpsc, watch},
};
use tokio_tungstenite::{
	accept_hdr_async,
	tungstenite::{
		Message,
		handshake::server::{ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse},
		http::StatusCode,
	},
};
use uuid::Uuid;

use riptide_engine::Engine;

use crate::{
	connection::{Connection, ConnectionRegistry},
	executor::CommandExecutor,
	protocol::{Response, ResponsePayload},
	subsystem::WsConfig,
};

/// Query parameters extracted during the HTTP upgrade.
#[derive(Default)]
struct UpgradeParams {
	secret: Option<String>,
	bearer: Option<String>,
}

fn parse_query(query: &str) -> UpgradeParams {
	let mut params = UpgradeParams::default();
	for pair in query.split('&') {
		let (key, value) = match pair.split_once('=') {
			Some(split) => split,
			None => continue,
		};
		let value = urlencoding::decode(value).map(|v| v.into_owned()).unwrap_or_else(|_| value.to_string());
		match key {
			"secret" => params.secret = Some(value),
			"bearer" => params.bearer = Some(value),
			_ => {}
		}
	}
	params
}

fn reject_handshake(status: StatusCode, body: &str) -> ErrorResponse {
	let mut response = ErrorResponse::new(Some(body.to_string()));
	*response.status_mut() = status;
	response
}

/// Handle a single accepted TCP stream until the peer disconnects or the
/// server shuts down.
///
/// The secret gate runs inside the handshake callback: a mismatch rejects the
/// upgrade itself with a plain HTTP 401 so an unauthorized peer never reaches
/// the message loop.
pub async fn handle_connection(
	stream: TcpStream,
	engine: Arc<Engine>,
	registry: Arc<ConnectionRegistry>,
	config: Arc<WsConfig>,
	mut shutdown_rx: watch::Receiver<bool>,
) {
	let mut params = UpgradeParams::default();
	let required_secret = config.secret.clone();

	let callback = |request: &HandshakeRequest, response: HandshakeResponse| {
		params = request.uri().query().map(parse_query).unwrap_or_default();

		if let Some(required) = &required_secret {
			if params.secret.as_deref() != Some(required.as_str()) {
				return Err(reject_handshake(StatusCode::UNAUTHORIZED, "secret does not match"));
			}
		}
		Ok(response)
	};

	let ws = match accept_hdr_async(stream, callback).await {
		Ok(ws) => ws,
		Err(e) => {
			tracing::debug!(error = %e, "websocket handshake failed");
			return;
		}
	};

	let identity = engine.identity();
	let principal = identity.authenticate(params.bearer.as_deref());
	let bearer_valid = params.bearer.is_some() && identity.is_authenticated(&principal);

	let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(config.channel_capacity);
	let (push_tx, mut push_rx) = mpsc::channel(config.channel_capacity);

	let connection = Arc::new(Connection::new(Uuid::now_v7(), principal, bearer_valid, outbound_tx, push_tx));
	let connection_id = connection.id();
	registry.add(connection.clone());
	tracing::debug!(connection = %connection_id, bearer_valid, "connection established");

	// The writer task owns the sink; everything else reaches the socket
	// through the outbound channel.
	let (mut sink, mut stream) = ws.split();
	let writer = tokio::spawn(async move {
		while let Some(message) = outbound_rx.recv().await {
			if sink.send(message).await.is_err() {
				break;
			}
		}
	});

	// Forward engine push updates as Items frames tagged with the
	// subscription's reference id.
	let push_connection = connection.clone();
	let forwarder = tokio::spawn(async move {
		while let Some(update) = push_rx.recv().await {
			push_connection
				.send(&Response::new(
					update.reference_id,
					ResponsePayload::Items {
						collection: update.collection,
						items: update.items,
					},
				))
				.await;
		}
	});

	// The Connected frame carries no reference id, there is no command to
	// correlate it to.
	connection
		.send(&Response::new(
			"",
			ResponsePayload::Connected {
				connection_id,
				bearer_valid,
			},
		))
		.await;

	let executor = Arc::new(CommandExecutor::new(engine.clone(), registry.clone()));

	loop {
		tokio::select! {
			biased;

			result = shutdown_rx.changed() => {
				if result.is_err() || *shutdown_rx.borrow() {
					connection.send_raw(Message::Close(None)).await;
					break;
				}
			}

			frame = stream.next() => {
				match frame {
					Some(Ok(Message::Text(text))) => {
						spawn_command(executor.clone(), connection.clone(), text.to_string());
					}
					Some(Ok(Message::Ping(payload))) => {
						connection.send_raw(Message::Pong(payload)).await;
					}
					Some(Ok(Message::Close(_))) => break,
					Some(Ok(Message::Binary(_))) => {
						tracing::debug!(connection = %connection_id, "ignoring binary frame");
					}
					Some(Ok(_)) => {}
					Some(Err(e)) => {
						tracing::debug!(connection = %connection_id, error = %e, "read error");
						break;
					}
					None => break,
				}
			}
		}
	}

	registry.remove(connection_id);
	engine.drop_connection(connection_id);
	forwarder.abort();
	writer.abort();
	tracing::debug!(connection = %connection_id, "connection closed");
}

/// Run one command concurrently with the read loop. The monitor task logs a
/// panic in the command task instead of letting it vanish silently; the
/// connection itself survives.
fn spawn_command(executor: Arc<CommandExecutor>, connection: Arc<Connection>, text: String) {
	let connection_id = connection.id();
	let task = tokio::spawn(async move {
		if let Some(response) = executor.execute(&connection, &text).await {
			connection.send(&response).await;
		}
	});
	tokio::spawn(async move {
		if let Err(e) = task.await {
			tracing::error!(connection = %connection_id, error = %e, "command task aborted");
		}
	});
}

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! WebSocket server lifecycle.
//!
//! `WsSubsystem` binds the listener, limits concurrent connections with a
//! semaphore, tracks the active count for health reporting and drains
//! connections on shutdown through a watch channel every handler observes.

use std::{
	net::SocketAddr,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::{
	net::TcpListener,
	spawn,
	sync::{Semaphore, watch},
	time::{Instant, sleep},
};

use riptide_core::{Error, Result};
use riptide_engine::Engine;
use riptide_sub_api::{HealthStatus, Subsystem};

use crate::{connection::ConnectionRegistry, handler::handle_connection};

pub struct WsConfig {
	/// Address and port to bind to, e.g. "0.0.0.0:8090".
	pub bind_addr: String,
	/// Upper bound on concurrent connections.
	pub max_connections: usize,
	/// When set, every upgrade must carry a matching `secret` query
	/// parameter or the handshake is rejected with 401.
	pub secret: Option<String>,
	/// Capacity of the per-connection outbound and push channels.
	pub channel_capacity: usize,
}

impl Default for WsConfig {
	fn default() -> Self {
		Self {
			bind_addr: "0.0.0.0:8090".to_string(),
			max_connections: 1024,
			secret: None,
			channel_capacity: 64,
		}
	}
}

pub struct WsSubsystem {
	config: Arc<WsConfig>,
	engine: Arc<Engine>,
	registry: Arc<ConnectionRegistry>,
	/// Actual bound address (available after start, matters for port 0).
	actual_addr: RwLock<Option<SocketAddr>>,
	running: Arc<AtomicBool>,
	active_connections: Arc<AtomicUsize>,
	shutdown_tx: Option<watch::Sender<bool>>,
	connection_semaphore: Arc<Semaphore>,
}

impl WsSubsystem {
	pub fn new(config: WsConfig, engine: Arc<Engine>) -> Self {
		let max_connections = config.max_connections;
		Self {
			config: Arc::new(config),
			engine,
			registry: Arc::new(ConnectionRegistry::new()),
			actual_addr: RwLock::new(None),
			running: Arc::new(AtomicBool::new(false)),
			active_connections: Arc::new(AtomicUsize::new(0)),
			shutdown_tx: None,
			connection_semaphore: Arc::new(Semaphore::new(max_connections)),
		}
	}

	/// The actual bound address (available after start).
	pub fn local_addr(&self) -> Option<SocketAddr> {
		*self.actual_addr.read()
	}

	pub fn port(&self) -> Option<u16> {
		self.local_addr().map(|a| a.port())
	}

	pub fn active_connections(&self) -> usize {
		self.active_connections.load(Ordering::SeqCst)
	}

	pub fn registry(&self) -> Arc<ConnectionRegistry> {
		self.registry.clone()
	}
}

#[async_trait]
impl Subsystem for WsSubsystem {
	fn name(&self) -> &'static str {
		"WebSocket"
	}

	async fn start(&mut self) -> Result<()> {
		// Idempotent: starting a running subsystem is a no-op.
		if self.running.load(Ordering::SeqCst) {
			return Ok(());
		}

		let addr = self.config.bind_addr.clone();
		let listener = TcpListener::bind(&addr)
			.await
			.map_err(|e| Error::Transport(format!("failed to bind {addr}: {e}")))?;

		let actual_addr =
			listener.local_addr().map_err(|e| Error::Transport(format!("bound address unavailable: {e}")))?;
		*self.actual_addr.write() = Some(actual_addr);
		tracing::info!("websocket server bound to {}", actual_addr);

		let (tx, mut rx) = watch::channel(false);
		let config = self.config.clone();
		let engine = self.engine.clone();
		let registry = self.registry.clone();
		let running = self.running.clone();
		let active_connections = self.active_connections.clone();
		let semaphore = self.connection_semaphore.clone();

		spawn(async move {
			running.store(true, Ordering::SeqCst);

			loop {
				tokio::select! {
					biased;

					result = rx.changed() => {
						if result.is_err() || *rx.borrow() {
							tracing::info!("websocket server shutting down");
							break;
						}
					}

					accept = listener.accept() => {
						match accept {
							Ok((stream, peer)) => {
								let permit = match semaphore.clone().try_acquire_owned() {
									Ok(p) => p,
									Err(_) => {
										tracing::warn!("connection limit reached, rejecting {}", peer);
										continue;
									}
								};

								let engine = engine.clone();
								let registry = registry.clone();
								let config = config.clone();
								let shutdown_rx = rx.clone();
								let active = active_connections.clone();

								active.fetch_add(1, Ordering::SeqCst);
								tracing::debug!("accepted connection from {}", peer);

								spawn(async move {
									handle_connection(stream, engine, registry, config, shutdown_rx).await;
									active.fetch_sub(1, Ordering::SeqCst);
									drop(permit);
								});
							}
							Err(e) => {
								tracing::warn!("accept error: {}", e);
							}
						}
					}
				}
			}

			running.store(false, Ordering::SeqCst);
			tracing::info!("websocket server stopped");
		});

		self.shutdown_tx = Some(tx);
		Ok(())
	}

	async fn shutdown(&mut self) -> Result<()> {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.send(true);
		}

		// Wait for active connections to drain, bounded by a deadline.
		let active = self.active_connections.clone();
		let deadline = Instant::now() + Duration::from_secs(30);
		while active.load(Ordering::SeqCst) > 0 {
			if Instant::now() > deadline {
				tracing::warn!(
					"websocket shutdown timeout with {} connections still active",
					active.load(Ordering::SeqCst)
				);
				break;
			}
			sleep(Duration::from_millis(100)).await;
		}
		tracing::debug!("websocket server shutdown completed");

		Ok(())
	}

	fn is_running(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}

	fn health_status(&self) -> HealthStatus {
		if self.running.load(Ordering::SeqCst) {
			let active = self.active_connections.load(Ordering::SeqCst);
			let max = self.config.max_connections;

			if active > max * 90 / 100 {
				HealthStatus::Warning {
					description: format!("high connection count: {}/{}", active, max),
				}
			} else {
				HealthStatus::Healthy
			}
		} else if self.shutdown_tx.is_some() {
			HealthStatus::Warning {
				description: "starting up".to_string(),
			}
		} else {
			HealthStatus::Failed {
				description: "not running".to_string(),
			}
		}
	}
}

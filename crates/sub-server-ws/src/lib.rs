// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! WebSocket server subsystem for Riptide.
//!
//! One upgraded bidirectional message connection per client: inbound frames
//! decode to commands, command handlers run against the engine, and push
//! notifications flow back whenever a write touches a subscribed collection.
//!
//! # Message protocol
//!
//! All messages are JSON. Every inbound frame carries a caller-supplied `id`
//! (the reference id) next to a `type`/`payload` pair; every outbound frame
//! echoes the reference id of the command it answers. The presence of an
//! `Error` payload is the sole failure signal.
//!
//! ```json
//! {"id": "r1", "type": "Subscribe", "payload": {"collection": "users", "filters": []}}
//! ```

pub mod connection;
pub mod executor;
pub mod handler;
pub mod protocol;
pub mod subsystem;

pub use connection::{Connection, ConnectionRegistry};
pub use executor::CommandExecutor;
pub use handler::handle_connection;
pub use protocol::{Request, RequestPayload, Response, ResponsePayload};
pub use subsystem::{WsConfig, WsSubsystem};

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The Riptide sync engine: named collections over a storage collaborator,
//! standing subscriptions and the change notifier that re-pushes affected
//! result sets after every successful write.
//!
//! The engine is transport-agnostic: subscribers are mpsc senders, so the
//! WebSocket layer (or a test) wires a connection's outbound channel in
//! without the engine knowing about sockets.

pub mod collection;
pub mod engine;
pub mod notify;
pub mod subscription;

pub use collection::Collection;
pub use engine::Engine;
pub use notify::WriteKind;
pub use subscription::{ConnectionId, PushUpdate, Subscription};

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Subsystem API crate providing common interfaces for Riptide subsystems.
//!
//! This crate contains the lifecycle trait server subsystems implement and
//! the host drives: start, graceful shutdown and health reporting.

pub mod subsystem;

pub use subsystem::{HealthStatus, Subsystem};

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Core types shared by every Riptide crate.
//!
//! This crate contains the item model, the error taxonomy and the prefilter
//! pipeline that shapes collection reads. It has no knowledge of transports,
//! storage backends or identity providers.

pub mod error;
pub mod item;
pub mod prefilter;

pub use error::{Error, Result};
pub use item::Item;
pub use prefilter::{CompareOp, PipelineKey, Prefilter, apply, pipeline_key};

// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The prefilter pipeline: composable, ordered query-shaping operations.
//!
//! A pipeline is an ordered list of [`Prefilter`]s applied to a collection's
//! item sequence. Application is pure and deterministic: the same pipeline on
//! the same underlying set always yields the same output sequence. Filters
//! execute in the order supplied and the executor never reorders them:
//! ordering filters must precede pagination filters for paging to be
//! meaningful, and a misordered pipeline is the caller's responsibility.

mod compare;
mod key;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use compare::compare_values;
pub use key::{PipelineKey, pipeline_key};

use crate::{
	Error, Result,
	item::{ID_FIELD, Item},
};

/// Comparison operator of a `Where` prefilter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	/// String containment, or array membership for array fields.
	Contains,
}

/// One query-shaping operation.
///
/// `OrderBy` starts a sort key run and `ThenBy` extends it; the run is
/// executed as a single stable sort when a non-ordering filter (or the end of
/// the pipeline) is reached. Ties left after all explicit sort keys are
/// broken by the `"id"` field so that `Skip`/`Take` paging is reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Prefilter {
	Where {
		field: String,
		op: CompareOp,
		value: Value,
	},
	OrderBy {
		field: String,
		#[serde(default)]
		descending: bool,
	},
	ThenBy {
		field: String,
		#[serde(default)]
		descending: bool,
	},
	Skip(i64),
	Take(i64),
}

/// Apply a pipeline to an ordered item sequence.
///
/// Pure: the input vector is consumed, no external state is touched. A
/// negative `Skip`/`Take` argument fails with
/// [`Error::InvalidFilterArgument`]; it is never silently clamped. Skipping
/// past the end of the sequence yields an empty sequence.
pub fn apply(items: Vec<Item>, filters: &[Prefilter]) -> Result<Vec<Item>> {
	validate(filters)?;

	let mut out = items;
	let mut sort_keys: Vec<(&str, bool)> = Vec::new();

	for filter in filters {
		match filter {
			Prefilter::OrderBy {
				field,
				descending,
			} => {
				// OrderBy restarts the key run.
				flush_sort(&mut out, &mut sort_keys);
				sort_keys.push((field, *descending));
			}
			Prefilter::ThenBy {
				field,
				descending,
			} => {
				// A leading ThenBy degenerates to OrderBy.
				sort_keys.push((field, *descending));
			}
			other => {
				flush_sort(&mut out, &mut sort_keys);
				apply_one(&mut out, other);
			}
		}
	}
	flush_sort(&mut out, &mut sort_keys);

	Ok(out)
}

fn validate(filters: &[Prefilter]) -> Result<()> {
	for filter in filters {
		match filter {
			Prefilter::Skip(n) if *n < 0 => {
				return Err(Error::InvalidFilterArgument(format!("Skip({n}) is negative")));
			}
			Prefilter::Take(n) if *n < 0 => {
				return Err(Error::InvalidFilterArgument(format!("Take({n}) is negative")));
			}
			_ => {}
		}
	}
	Ok(())
}

fn apply_one(items: &mut Vec<Item>, filter: &Prefilter) {
	match filter {
		Prefilter::Where {
			field,
			op,
			value,
		} => {
			items.retain(|item| matches(item.get(field), *op, value));
		}
		Prefilter::Skip(n) => {
			let n = (*n as usize).min(items.len());
			items.drain(..n);
		}
		Prefilter::Take(n) => {
			items.truncate(*n as usize);
		}
		Prefilter::OrderBy {
			..
		}
		| Prefilter::ThenBy {
			..
		} => unreachable!("ordering filters are handled by the sort key run"),
	}
}

fn flush_sort(items: &mut [Item], sort_keys: &mut Vec<(&str, bool)>) {
	if sort_keys.is_empty() {
		return;
	}

	items.sort_by(|a, b| {
		for (field, descending) in sort_keys.iter() {
			let ord = compare_values(
				a.get(field).unwrap_or(&Value::Null),
				b.get(field).unwrap_or(&Value::Null),
			);
			let ord = if *descending {
				ord.reverse()
			} else {
				ord
			};
			if ord.is_ne() {
				return ord;
			}
		}
		// Stable secondary key: the primary key, always ascending.
		compare_values(a.get(ID_FIELD).unwrap_or(&Value::Null), b.get(ID_FIELD).unwrap_or(&Value::Null))
	});
	sort_keys.clear();
}

fn matches(field_value: Option<&Value>, op: CompareOp, target: &Value) -> bool {
	let value = field_value.unwrap_or(&Value::Null);
	match op {
		CompareOp::Eq => compare_values(value, target).is_eq(),
		CompareOp::Ne => compare_values(value, target).is_ne(),
		CompareOp::Lt => compare_values(value, target).is_lt(),
		CompareOp::Le => compare_values(value, target).is_le(),
		CompareOp::Gt => compare_values(value, target).is_gt(),
		CompareOp::Ge => compare_values(value, target).is_ge(),
		CompareOp::Contains => match (value, target) {
			(Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
			(Value::Array(entries), needle) => entries.iter().any(|e| compare_values(e, needle).is_eq()),
			_ => false,
		},
	}
}

impl Prefilter {
	pub fn order_by(field: impl Into<String>) -> Self {
		Prefilter::OrderBy {
			field: field.into(),
			descending: false,
		}
	}

	pub fn order_by_desc(field: impl Into<String>) -> Self {
		Prefilter::OrderBy {
			field: field.into(),
			descending: true,
		}
	}

	pub fn then_by(field: impl Into<String>) -> Self {
		Prefilter::ThenBy {
			field: field.into(),
			descending: false,
		}
	}

	pub fn where_field(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
		Prefilter::Where {
			field: field.into(),
			op,
			value: value.into(),
		}
	}
}

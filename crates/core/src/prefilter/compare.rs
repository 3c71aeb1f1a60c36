// Copyright (c) 2025 Riptide Contributors
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Total order over JSON values used by `OrderBy`/`ThenBy` and `Where`.
//!
//! Comparison rule: values of different kinds order by kind rank
//! (null < bool < number < string < array < object), so null is the smallest
//! value. Within a kind: bools false < true, numbers numerically, strings by
//! ordinal (byte) order. Arrays and objects compare by their canonical JSON
//! text; they rarely appear as sort keys but the order must still be total
//! for paging to be reproducible.

use std::cmp::Ordering;

use serde_json::Value;

/// Compare two JSON values under the documented total order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
	match (a, b) {
		(Value::Null, Value::Null) => Ordering::Equal,
		(Value::Bool(a), Value::Bool(b)) => a.cmp(b),
		(Value::Number(a), Value::Number(b)) => {
			let a = a.as_f64().unwrap_or(f64::NAN);
			let b = b.as_f64().unwrap_or(f64::NAN);
			a.partial_cmp(&b).unwrap_or(Ordering::Equal)
		}
		(Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
		(a, b) if kind_rank(a) == kind_rank(b) => {
			let a = a.to_string();
			let b = b.to_string();
			a.cmp(&b)
		}
		(a, b) => kind_rank(a).cmp(&kind_rank(b)),
	}
}

fn kind_rank(value: &Value) -> u8 {
	match value {
		Value::Null => 0,
		Value::Bool(_) => 1,
		Value::Number(_) => 2,
		Value::String(_) => 3,
		Value::Array(_) => 4,
		Value::Object(_) => 5,
	}
}

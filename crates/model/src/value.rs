//! Kind-tagged primitive values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A primitive value carried by attributes and action parameters.
///
/// The wire form is a two-field object `{"k": <kind>, "v": <value>}` so the
/// receiving side never has to infer a numeric kind from JSON alone. Integer
/// and floating forms round-trip exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "k", content = "v")]
pub enum Value {
	/// UTF-8 string.
	#[serde(rename = "s")]
	String(String),
	/// Signed 64-bit integer.
	#[serde(rename = "i")]
	I64(i64),
	/// IEEE-754 double.
	#[serde(rename = "d")]
	F64(f64),
	/// Boolean.
	#[serde(rename = "b")]
	Bool(bool),
	/// Absent value.
	#[serde(rename = "n")]
	Null,
}

impl Value {
	/// Returns the kind tag used on the wire.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::String(_) => "s",
			Self::I64(_) => "i",
			Self::F64(_) => "d",
			Self::Bool(_) => "b",
			Self::Null => "n",
		}
	}

	/// Returns true for [`Value::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	/// Borrows the string payload, if this is a string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the integer payload, if this is an integer.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::I64(i) => Some(*i),
			_ => None,
		}
	}

	/// Returns the floating payload, if this is a double.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::F64(f) => Some(*f),
			_ => None,
		}
	}

	/// Returns the boolean payload, if this is a boolean.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}
}

impl Default for Value {
	fn default() -> Self {
		Self::Null
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::String(s) => write!(f, "{s}"),
			Self::I64(i) => write!(f, "{i}"),
			Self::F64(v) => write!(f, "{v}"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Null => write!(f, "null"),
		}
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::String(s.to_owned())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::String(s)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Self::I64(i)
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Self::F64(f)
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(opt: Option<T>) -> Self {
		match opt {
			Some(v) => v.into(),
			None => Self::Null,
		}
	}
}

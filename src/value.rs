use std::fmt::{self, Display};
use std::rc::Rc;

use crate::Store;

/// A value held by a store property or produced by an expression.
///
/// Equality is strict: primitives compare by value (so `NaN` is never equal to
/// itself), arrays and stores compare by identity.
#[derive(Clone, Debug, Default)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	Array(Rc<[Value]>),
	Object(Store),
}

impl Value {
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Undefined => "undefined",
			Value::Null => "null",
			Value::Bool(_) => "boolean",
			Value::Number(_) => "number",
			Value::String(_) => "string",
			Value::Array(_) => "array",
			Value::Object(_) => "object",
		}
	}

	/// Only plain key-value objects take part in property interception.
	pub fn as_store(&self) -> Option<&Store> {
		match self {
			Value::Object(store) => Some(store),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Undefined | Value::Null => false,
			Value::Bool(b) => *b,
			Value::Number(n) => *n != 0.0 && !n.is_nan(),
			Value::String(s) => !s.is_empty(),
			Value::Array(_) | Value::Object(_) => true,
		}
	}

	/// Numeric coercion used by arithmetic operators.
	pub fn to_number(&self) -> f64 {
		match self {
			Value::Undefined => f64::NAN,
			Value::Null => 0.0,
			Value::Bool(b) => f64::from(u8::from(*b)),
			Value::Number(n) => *n,
			Value::String(s) => {
				let s = s.trim();
				if s.is_empty() {
					0.0
				} else {
					s.parse().unwrap_or(f64::NAN)
				}
			}
			Value::Array(_) | Value::Object(_) => f64::NAN,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) => true,
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
			(Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
	if n.is_nan() {
		f.write_str("NaN")
	} else if n.is_infinite() {
		f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
	} else if n == 0.0 {
		f.write_str("0")
	} else if n.abs() >= 1e21 || n.abs() < 1e-6 {
		// Exponent form with an explicit sign: `1e+21`, `1.5e-7`.
		let text = format!("{:e}", n);
		match text.split_once('e') {
			Some((mantissa, exponent)) if !exponent.starts_with('-') => {
				write!(f, "{}e+{}", mantissa, exponent)
			}
			_ => f.write_str(&text),
		}
	} else {
		write!(f, "{}", n)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Null => f.write_str("null"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Number(n) => write_number(f, *n),
			Value::String(s) => f.write_str(s),
			Value::Array(items) => {
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					// Holes print as empty strings.
					if !matches!(item, Value::Undefined | Value::Null) {
						Display::fmt(item, f)?;
					}
				}
				Ok(())
			}
			Value::Object(_) => f.write_str("[object Object]"),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(value.into())
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Number(value.into())
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(value.into())
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Value::String(value)
	}
}

impl From<Store> for Value {
	fn from(value: Store) -> Self {
		Value::Object(value)
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Value::Array(value.into())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

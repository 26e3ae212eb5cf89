use std::{cmp::Ordering, collections::BTreeMap, fmt};

use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// A single directory attribute value, already decoded from its wire representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
	Bool(bool),
	Integer(i64),
	Float(f64),
	Time(#[serde(with = "crate::time_serde")] OffsetDateTime),
	Text(String),
	List(Vec<String>),
}
impl AttrValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Text(value) => Some(value.as_str()),
			Self::List(values) => values.first().map(String::as_str),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(value) => Some(*value),
			Self::Integer(value) => Some(*value != 0),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Integer(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_time(&self) -> Option<OffsetDateTime> {
		match self {
			Self::Time(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Integer(value) => Some(*value as f64),
			Self::Float(value) => Some(*value),
			_ => None,
		}
	}

	/// Case-insensitive substring test against the value's display form.
	pub fn contains_text(&self, needle: &str) -> bool {
		let needle = needle.trim().to_lowercase();

		if needle.is_empty() {
			return false;
		}

		match self {
			Self::List(values) => values.iter().any(|value| value.to_lowercase().contains(&needle)),
			other => other.to_string().to_lowercase().contains(&needle),
		}
	}

	/// Total order used by aggregation. Numbers compare numerically across integer and float;
	/// otherwise values of different kinds order by kind.
	pub fn total_cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Self::Bool(a), Self::Bool(b)) => a.cmp(b),
			(Self::Integer(a), Self::Integer(b)) => a.cmp(b),
			(Self::Time(a), Self::Time(b)) => a.cmp(b),
			(Self::Text(a), Self::Text(b)) => a.cmp(b),
			(Self::List(a), Self::List(b)) => a.cmp(b),
			(a, b) => match (a.as_f64(), b.as_f64()) {
				(Some(x), Some(y)) => x.total_cmp(&y),
				_ => a.kind_rank().cmp(&b.kind_rank()),
			},
		}
	}

	fn kind_rank(&self) -> u8 {
		match self {
			Self::Bool(_) => 0,
			Self::Integer(_) | Self::Float(_) => 1,
			Self::Time(_) => 2,
			Self::Text(_) => 3,
			Self::List(_) => 4,
		}
	}
}

impl fmt::Display for AttrValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bool(value) => write!(f, "{value}"),
			Self::Integer(value) => write!(f, "{value}"),
			Self::Float(value) => write!(f, "{value}"),
			Self::Time(value) => match value.format(&Rfc3339) {
				Ok(text) => f.write_str(&text),
				Err(_) => write!(f, "{value}"),
			},
			Self::Text(value) => f.write_str(value),
			Self::List(values) => f.write_str(&values.join("; ")),
		}
	}
}

/// A resolved directory account. Identity is the stable `key` (distinguished name), never the
/// attribute values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
	pub key: String,
	pub attributes: BTreeMap<String, AttrValue>,
}
impl Candidate {
	pub fn new(key: impl Into<String>) -> Self {
		Self { key: key.into(), attributes: BTreeMap::new() }
	}

	pub fn with(mut self, name: impl Into<String>, value: AttrValue) -> Self {
		self.attributes.insert(name.into(), value);

		self
	}

	pub fn get(&self, name: &str) -> Option<&AttrValue> {
		self.attributes.get(name).or_else(|| {
			self.attributes
				.iter()
				.find(|(key, _)| key.eq_ignore_ascii_case(name))
				.map(|(_, value)| value)
		})
	}

	pub fn text(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(AttrValue::as_str)
	}

	/// Drops every attribute that is neither in `keep` nor contains `text`.
	pub fn trim_attributes(&mut self, keep: &[String], text: &str) {
		self.attributes.retain(|name, value| {
			keep.iter().any(|wanted| wanted.eq_ignore_ascii_case(name)) || value.contains_text(text)
		});
	}
}

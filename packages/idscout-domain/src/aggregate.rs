use std::{cmp::Ordering, fmt, str::FromStr};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{candidate::AttrValue, filetime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AggregationMethod {
	Maximum,
	Minimum,
	Count,
	Median,
	Mode,
	Sum,
	Mean,
}
impl AggregationMethod {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Maximum => "Maximum",
			Self::Minimum => "Minimum",
			Self::Count => "Count",
			Self::Median => "Median",
			Self::Mode => "Mode",
			Self::Sum => "Sum",
			Self::Mean => "Mean",
		}
	}
}

impl FromStr for AggregationMethod {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"max" | "maximum" => Ok(Self::Maximum),
			"min" | "minimum" => Ok(Self::Minimum),
			"count" => Ok(Self::Count),
			"median" => Ok(Self::Median),
			"mode" => Ok(Self::Mode),
			"sum" => Ok(Self::Sum),
			// Average is accepted as an alias and never reaches dispatch.
			"mean" | "average" | "avg" => Ok(Self::Mean),
			other => Err(format!("Unknown aggregation method: {other}.")),
		}
	}
}

impl fmt::Display for AggregationMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One replica's answer for a single property. `None` when the replica failed or the attribute
/// is unset there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaValue {
	pub replica: String,
	pub value: Option<AttrValue>,
}
impl ReplicaValue {
	pub fn new(replica: impl Into<String>, value: Option<AttrValue>) -> Self {
		Self { replica: replica.into(), value }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
	pub property: String,
	pub method: AggregationMethod,
	pub value: Option<AttrValue>,
	pub source_replicas: Vec<String>,
	pub mode_count: Option<usize>,
	pub warnings: Vec<String>,
}
impl AggregationResult {
	pub fn field_name(&self) -> String {
		format!("{}_{}", self.property, self.method)
	}

	pub fn provenance_field_name(&self) -> String {
		format!("{}_DC", self.field_name())
	}

	/// Writes the `<property>_<method>` fields (and `_ModeCount` for Mode) into `record`.
	pub fn write_fields(&self, record: &mut Map<String, Value>) {
		let value = match &self.value {
			Some(value) => serde_json::to_value(value).unwrap_or(Value::Null),
			None => Value::Null,
		};

		record.insert(self.field_name(), value);
		record.insert(
			self.provenance_field_name(),
			Value::Array(self.source_replicas.iter().cloned().map(Value::String).collect()),
		);

		if let Some(count) = self.mode_count {
			record.insert(format!("{}_ModeCount", self.property), Value::from(count));
		}
	}
}

/// Reduces per-replica values with `method`. Only non-null values participate; provenance lists
/// every replica whose value equals the result (Count lists every contributing replica).
pub fn reduce(
	property: &str,
	method: AggregationMethod,
	values: &[ReplicaValue],
) -> AggregationResult {
	let present: Vec<(&str, &AttrValue)> = values
		.iter()
		.filter_map(|entry| entry.value.as_ref().map(|value| (entry.replica.as_str(), value)))
		.collect();
	let mut result = AggregationResult {
		property: property.to_string(),
		method,
		value: None,
		source_replicas: Vec::new(),
		mode_count: None,
		warnings: Vec::new(),
	};

	if present.is_empty() {
		if method == AggregationMethod::Count {
			result.value = Some(AttrValue::Integer(0));
		}

		return result;
	}

	match method {
		AggregationMethod::Maximum => {
			result.value = extreme(&present, Ordering::Greater);
		},
		AggregationMethod::Minimum => {
			result.value = extreme(&present, Ordering::Less);
		},
		AggregationMethod::Count => {
			result.value = Some(AttrValue::Integer(present.len() as i64));
			result.source_replicas =
				present.iter().map(|(replica, _)| replica.to_string()).collect();

			return result;
		},
		AggregationMethod::Median => {
			let mut sorted: Vec<&AttrValue> = present.iter().map(|(_, value)| *value).collect();

			sorted.sort_by(|a, b| a.total_cmp(b));

			// Upper-middle element for even counts.
			result.value = sorted.get(sorted.len() / 2).map(|value| (*value).clone());
		},
		AggregationMethod::Mode => {
			let (value, count) = mode(&present);

			result.value = Some(value);
			result.mode_count = Some(count);
		},
		AggregationMethod::Sum | AggregationMethod::Mean => {
			result.value = sum_or_mean(&present, method, &mut result.warnings);
		},
	}

	if let Some(value) = &result.value {
		result.source_replicas = present
			.iter()
			.filter(|(_, candidate)| candidate.total_cmp(value) == Ordering::Equal)
			.map(|(replica, _)| replica.to_string())
			.collect();
	}

	result
}

fn extreme(present: &[(&str, &AttrValue)], wanted: Ordering) -> Option<AttrValue> {
	let mut best: Option<&AttrValue> = None;

	for (_, value) in present {
		match best {
			Some(current) if value.total_cmp(current) != wanted => {},
			_ => best = Some(*value),
		}
	}

	best.cloned()
}

/// Most frequent value; ties go to the value encountered first.
fn mode(present: &[(&str, &AttrValue)]) -> (AttrValue, usize) {
	let mut tallies: Vec<(&AttrValue, usize)> = Vec::new();

	for (_, value) in present {
		match tallies.iter_mut().find(|(seen, _)| seen.total_cmp(value) == Ordering::Equal) {
			Some((_, count)) => *count += 1,
			None => tallies.push((*value, 1)),
		}
	}

	let mut best = (present[0].1, 0);

	for (value, count) in tallies {
		if count > best.1 {
			best = (value, count);
		}
	}

	(best.0.clone(), best.1)
}

fn sum_or_mean(
	present: &[(&str, &AttrValue)],
	method: AggregationMethod,
	warnings: &mut Vec<String>,
) -> Option<AttrValue> {
	let count = present.len();

	if present.iter().all(|(_, value)| matches!(value, AttrValue::Time(_))) {
		let total: i128 =
			present.iter().filter_map(|(_, value)| value.as_time()).map(filetime::to_ticks).sum();
		let ticks = match method {
			AggregationMethod::Mean => total / count as i128,
			_ => total,
		};

		if let Some(at) = filetime::from_ticks(ticks) {
			return Some(AttrValue::Time(at));
		}

		warnings.push(format!(
			"{method} of time values is not a representable date; returning the raw tick count."
		));

		return Some(match i64::try_from(ticks) {
			Ok(ticks) => AttrValue::Integer(ticks),
			Err(_) => AttrValue::Float(ticks as f64),
		});
	}

	let numbers: Option<Vec<&AttrValue>> = present
		.iter()
		.map(|(_, value)| value.as_f64().map(|_| *value))
		.collect();
	let Some(numbers) = numbers else {
		warnings.push(format!("{method} requires numeric or time values; skipping."));

		return None;
	};
	let all_integers = numbers.iter().all(|value| matches!(value, AttrValue::Integer(_)));

	if all_integers && method == AggregationMethod::Sum {
		let total =
			numbers.iter().filter_map(|value| value.as_i64()).try_fold(0_i64, i64::checked_add);

		if let Some(total) = total {
			return Some(AttrValue::Integer(total));
		}
	}

	let total: f64 = numbers.iter().filter_map(|value| value.as_f64()).sum();

	Some(match method {
		AggregationMethod::Mean => AttrValue::Float(total / count as f64),
		_ => AttrValue::Float(total),
	})
}

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
	attributes::{AttributeSetName, SearchAttributes},
	query::{SearchQuery, StrategyHint},
};

/// Anything that can describe itself as named attribute values, e.g. a parsed input record.
pub trait NamedAttributes {
	fn named_attributes(&self) -> Vec<(String, String)>;

	/// Whole-input text used when no named attribute is searchable.
	fn fallback_text(&self) -> String;
}

/// The effective search text inferred from a structured input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
	pub text: String,
	pub attribute: Option<String>,
	pub warning: Option<String>,
}

/// Infers the attribute set from the shape of free text.
pub fn classify(text: &str) -> AttributeSetName {
	let trimmed = text.trim();

	if !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit()) {
		return AttributeSetName::Number;
	}
	if trimmed.contains('@') {
		return AttributeSetName::Email;
	}

	AttributeSetName::Freetext
}

/// Ordered attribute names to scan for `query`.
pub fn plan(query: &SearchQuery, attrs: &SearchAttributes) -> Vec<String> {
	let name = match query.hint {
		StrategyHint::Thorough => return attrs.thorough_union(),
		StrategyHint::Email => AttributeSetName::Email,
		StrategyHint::Number => AttributeSetName::Number,
		StrategyHint::Name => AttributeSetName::Name,
		StrategyHint::Freetext => AttributeSetName::Freetext,
		StrategyHint::Auto => classify(&query.text),
	};

	attrs.set(name).attributes.clone()
}

/// Picks the first input property, in attribute-set specificity order, that names a searchable
/// attribute and carries a value.
pub fn infer_search_target(input: &dyn NamedAttributes, attrs: &SearchAttributes) -> SearchTarget {
	let named = input.named_attributes();

	for attribute in attrs.in_specificity_order() {
		let found = named.iter().find(|(name, value)| {
			name.eq_ignore_ascii_case(attribute) && !value.trim().is_empty()
		});

		if let Some((name, value)) = found {
			return SearchTarget {
				text: value.trim().to_string(),
				attribute: Some(name.clone()),
				warning: None,
			};
		}
	}

	let text = input.fallback_text();
	let warning = format!(
		"Input has no searchable attribute ({}); searching its text form instead.",
		named.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(", ")
	);

	SearchTarget { text, attribute: None, warning: Some(warning) }
}

impl NamedAttributes for Map<String, Value> {
	fn named_attributes(&self) -> Vec<(String, String)> {
		self.iter()
			.filter_map(|(name, value)| json_text(value).map(|text| (name.clone(), text)))
			.collect()
	}

	fn fallback_text(&self) -> String {
		Value::Object(self.clone()).to_string()
	}
}

impl NamedAttributes for BTreeMap<String, String> {
	fn named_attributes(&self) -> Vec<(String, String)> {
		self.iter().map(|(name, value)| (name.clone(), value.clone())).collect()
	}

	fn fallback_text(&self) -> String {
		self.values().map(String::as_str).collect::<Vec<_>>().join(" ")
	}
}

impl NamedAttributes for Vec<(String, String)> {
	fn named_attributes(&self) -> Vec<(String, String)> {
		self.clone()
	}

	fn fallback_text(&self) -> String {
		self.iter().map(|(_, value)| value.as_str()).collect::<Vec<_>>().join(" ")
	}
}

fn json_text(value: &Value) -> Option<String> {
	match value {
		Value::String(text) => Some(text.clone()),
		Value::Number(number) => Some(number.to_string()),
		Value::Bool(flag) => Some(flag.to_string()),
		Value::Array(items) => items.iter().find_map(json_text),
		Value::Null | Value::Object(_) => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	fn attrs() -> SearchAttributes {
		SearchAttributes::new(
			strings(&["sAMAccountName", "mail", "displayName"]),
			strings(&["sAMAccountName", "displayName", "givenName"]),
			strings(&["mail", "userPrincipalName"]),
			strings(&["employeeID", "telephoneNumber"]),
			strings(&["displayName", "sn"]),
		)
	}

	#[test]
	fn auto_hint_classifies_input_shape() {
		let attrs = attrs();

		assert_eq!(plan(&SearchQuery::new("004512"), &attrs), strings(&[
			"employeeID",
			"telephoneNumber"
		]));
		assert_eq!(plan(&SearchQuery::new("jo@corp.example"), &attrs), strings(&[
			"mail",
			"userPrincipalName"
		]));
		assert_eq!(plan(&SearchQuery::new("Jo Lee"), &attrs), strings(&[
			"sAMAccountName",
			"displayName",
			"givenName"
		]));
	}

	#[test]
	fn explicit_hint_wins_over_shape() {
		let query = SearchQuery::new("12345").with_hint(StrategyHint::Name);

		assert_eq!(plan(&query, &attrs()), strings(&["displayName", "sn"]));
	}

	#[test]
	fn thorough_hint_unions_sets() {
		let query = SearchQuery::new("x").with_hint(StrategyHint::Thorough);

		assert_eq!(plan(&query, &attrs()).len(), 7);
	}

	#[test]
	fn structured_input_uses_most_specific_attribute() {
		let mut input = Map::new();

		input.insert("DisplayName".to_string(), Value::String("Jo Lee".to_string()));
		input.insert("Mail".to_string(), Value::String("jo@corp.example".to_string()));

		let target = infer_search_target(&input, &attrs());

		assert_eq!(target.text, "jo@corp.example");
		assert_eq!(target.attribute.as_deref(), Some("Mail"));
		assert!(target.warning.is_none());
	}

	#[test]
	fn structured_input_without_known_attributes_falls_back_with_warning() {
		let input = vec![("Badge".to_string(), "B-7".to_string())];
		let target = infer_search_target(&input, &attrs());

		assert_eq!(target.text, "B-7");
		assert!(target.attribute.is_none());
		assert!(target.warning.is_some_and(|warning| warning.contains("Badge")));
	}
}

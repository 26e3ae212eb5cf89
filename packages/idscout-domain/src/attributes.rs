use std::collections::HashSet;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeSetName {
	Basic,
	Freetext,
	Email,
	Number,
	Name,
}
impl AttributeSetName {
	/// Order in which sets are consulted when a structured input names its own attributes.
	pub const SPECIFICITY: [Self; 5] =
		[Self::Email, Self::Number, Self::Basic, Self::Name, Self::Freetext];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Basic => "Basic",
			Self::Freetext => "Freetext",
			Self::Email => "Email",
			Self::Number => "Number",
			Self::Name => "Name",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSet {
	pub name: AttributeSetName,
	pub attributes: Vec<String>,
}
impl AttributeSet {
	pub fn new(name: AttributeSetName, attributes: Vec<String>) -> Self {
		Self { name, attributes }
	}

	pub fn contains(&self, attribute: &str) -> bool {
		self.attributes.iter().any(|name| name.eq_ignore_ascii_case(attribute))
	}

	fn retain_allowed(&self, allowed: &HashSet<String>, removed: &mut Vec<String>) -> Self {
		let mut attributes = Vec::with_capacity(self.attributes.len());

		for attribute in &self.attributes {
			if allowed.contains(&attribute.to_ascii_lowercase()) {
				attributes.push(attribute.clone());
			} else if !removed.iter().any(|name| name.eq_ignore_ascii_case(attribute)) {
				removed.push(attribute.clone());
			}
		}

		Self { name: self.name, attributes }
	}
}

/// The named search sets. Built once, pruned once against the schema, then shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchAttributes {
	basic: AttributeSet,
	freetext: AttributeSet,
	email: AttributeSet,
	number: AttributeSet,
	name: AttributeSet,
}
impl SearchAttributes {
	pub fn new(
		basic: Vec<String>,
		freetext: Vec<String>,
		email: Vec<String>,
		number: Vec<String>,
		name: Vec<String>,
	) -> Self {
		Self {
			basic: AttributeSet::new(AttributeSetName::Basic, basic),
			freetext: AttributeSet::new(AttributeSetName::Freetext, freetext),
			email: AttributeSet::new(AttributeSetName::Email, email),
			number: AttributeSet::new(AttributeSetName::Number, number),
			name: AttributeSet::new(AttributeSetName::Name, name),
		}
	}

	pub fn from_config(cfg: &idscout_config::Attributes) -> Self {
		Self::new(
			cfg.basic.clone(),
			cfg.freetext.clone(),
			cfg.email.clone(),
			cfg.number.clone(),
			cfg.name.clone(),
		)
	}

	/// Removes attributes missing from `allowed` (compared case-insensitively) from every set.
	/// Returns the pruned sets and the distinct names that were dropped.
	pub fn pruned<I, S>(&self, allowed: I) -> (Self, Vec<String>)
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let allowed: HashSet<String> =
			allowed.into_iter().map(|name| name.as_ref().trim().to_ascii_lowercase()).collect();
		let mut removed = Vec::new();
		let pruned = Self {
			basic: self.basic.retain_allowed(&allowed, &mut removed),
			freetext: self.freetext.retain_allowed(&allowed, &mut removed),
			email: self.email.retain_allowed(&allowed, &mut removed),
			number: self.number.retain_allowed(&allowed, &mut removed),
			name: self.name.retain_allowed(&allowed, &mut removed),
		};

		(pruned, removed)
	}

	pub fn set(&self, name: AttributeSetName) -> &AttributeSet {
		match name {
			AttributeSetName::Basic => &self.basic,
			AttributeSetName::Freetext => &self.freetext,
			AttributeSetName::Email => &self.email,
			AttributeSetName::Number => &self.number,
			AttributeSetName::Name => &self.name,
		}
	}

	/// Freetext, Email and Number merged, first occurrence wins.
	pub fn thorough_union(&self) -> Vec<String> {
		let mut out: Vec<String> = Vec::new();

		for set in [&self.freetext, &self.email, &self.number] {
			for attribute in &set.attributes {
				if !out.iter().any(|name| name.eq_ignore_ascii_case(attribute)) {
					out.push(attribute.clone());
				}
			}
		}

		out
	}

	pub fn in_specificity_order(&self) -> impl Iterator<Item = &str> {
		AttributeSetName::SPECIFICITY
			.into_iter()
			.flat_map(|name| self.set(name).attributes.iter().map(String::as_str))
	}

	pub fn is_searchable(&self, attribute: &str) -> bool {
		AttributeSetName::SPECIFICITY.into_iter().any(|name| self.set(name).contains(attribute))
	}
}

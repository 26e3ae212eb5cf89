use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Caller guidance for which attribute set to search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyHint {
	#[default]
	Auto,
	Thorough,
	Email,
	Number,
	Name,
	Freetext,
}
impl StrategyHint {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Auto => "auto",
			Self::Thorough => "thorough",
			Self::Email => "email",
			Self::Number => "number",
			Self::Name => "name",
			Self::Freetext => "freetext",
		}
	}
}

impl FromStr for StrategyHint {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"auto" | "" => Ok(Self::Auto),
			"thorough" => Ok(Self::Thorough),
			"email" | "mail" => Ok(Self::Email),
			"number" | "phone" | "id" => Ok(Self::Number),
			"name" => Ok(Self::Name),
			"freetext" | "text" => Ok(Self::Freetext),
			other => Err(format!("Unknown strategy hint: {other}.")),
		}
	}
}

/// The escalating fuzzy-matching techniques, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
	Basic,
	Broad,
	NamePermutation,
	EmailDecomposition,
	Substring,
}
impl Strategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Basic => "basic",
			Self::Broad => "broad",
			Self::NamePermutation => "name_permutation",
			Self::EmailDecomposition => "email_decomposition",
			Self::Substring => "substring",
		}
	}

	/// Substring explosion matches on fragments and carries a high false-positive rate.
	pub fn is_speculative(self) -> bool {
		matches!(self, Self::Substring)
	}
}

impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
	pub text: String,
	pub hint: StrategyHint,
	pub thorough: bool,
	pub allow_substrings: bool,
	pub min_token_length: usize,
	pub recursion_depth: u32,
}
impl SearchQuery {
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			hint: StrategyHint::Auto,
			thorough: false,
			allow_substrings: false,
			min_token_length: 3,
			recursion_depth: 0,
		}
	}

	pub fn with_hint(mut self, hint: StrategyHint) -> Self {
		self.hint = hint;

		self
	}

	pub fn with_thorough(mut self, thorough: bool) -> Self {
		self.thorough = thorough;

		self
	}

	pub fn with_substrings(mut self, allow_substrings: bool) -> Self {
		self.allow_substrings = allow_substrings;

		self
	}

	pub fn with_min_token_length(mut self, min_token_length: usize) -> Self {
		self.min_token_length = min_token_length.max(1);

		self
	}

	/// A nested search one level deeper. Substring explosion never propagates into children.
	pub fn subquery(&self, text: impl Into<String>, hint: StrategyHint) -> Self {
		Self {
			text: text.into(),
			hint,
			thorough: self.thorough,
			allow_substrings: false,
			min_token_length: self.min_token_length,
			recursion_depth: self.recursion_depth + 1,
		}
	}
}

use std::fmt;

use serde::Serialize;
use time::Duration;

/// Domain-wide password rules and the lockout observation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainPasswordPolicy {
	pub min_length: u32,
	pub complexity_enabled: bool,
	/// Bad-password counters reset once this much time passes without a new failure.
	pub lockout_observation_window: Duration,
}
impl Default for DomainPasswordPolicy {
	fn default() -> Self {
		Self {
			min_length: 7,
			complexity_enabled: true,
			lockout_observation_window: Duration::minutes(30),
		}
	}
}

/// Result of checking a clear password against the account's policy without authenticating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationStatus {
	Success,
	TooShort,
	TooLong,
	NotComplex,
	HistoryConflict,
	Other,
}
impl ValidationStatus {
	/// The password cannot be the account's current one.
	pub fn rules_out_password(self) -> bool {
		matches!(self, Self::TooShort | Self::TooLong | Self::NotComplex)
	}
}

impl fmt::Display for ValidationStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = match self {
			Self::Success => "success",
			Self::TooShort => "too short",
			Self::TooLong => "too long",
			Self::NotComplex => "not complex",
			Self::HistoryConflict => "history conflict",
			Self::Other => "other",
		};

		f.write_str(text)
	}
}

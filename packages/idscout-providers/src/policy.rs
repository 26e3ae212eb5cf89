use idscout_domain::policy::{DomainPasswordPolicy, ValidationStatus};

/// Longest password Active Directory accepts.
pub const MAX_PASSWORD_LENGTH: usize = 256;

const MIN_NAME_FRAGMENT: usize = 3;
const REQUIRED_CATEGORIES: usize = 3;

/// Evaluates the domain password rules locally. A password the rules reject cannot be the
/// account's current password, so it never needs to reach the directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyRulesValidator;
impl PolicyRulesValidator {
	pub fn validate(
		&self,
		account_name: &str,
		password: &str,
		policy: &DomainPasswordPolicy,
	) -> ValidationStatus {
		let length = password.chars().count();

		if length < policy.min_length as usize {
			return ValidationStatus::TooShort;
		}
		if length > MAX_PASSWORD_LENGTH {
			return ValidationStatus::TooLong;
		}
		if policy.complexity_enabled && !is_complex(account_name, password) {
			return ValidationStatus::NotComplex;
		}

		ValidationStatus::Success
	}
}

/// Three of the four character categories, and no account name longer than two characters.
fn is_complex(account_name: &str, password: &str) -> bool {
	let name = account_name.trim().to_lowercase();

	if name.chars().count() >= MIN_NAME_FRAGMENT && password.to_lowercase().contains(&name) {
		return false;
	}

	let categories = [
		password.chars().any(char::is_uppercase),
		password.chars().any(char::is_lowercase),
		password.chars().any(|ch| ch.is_ascii_digit()),
		password.chars().any(|ch| !ch.is_alphanumeric()),
	];

	categories.iter().filter(|present| **present).count() >= REQUIRED_CATEGORIES
}

#[cfg(test)]
mod tests {
	use super::*;

	fn policy(min_length: u32, complexity_enabled: bool) -> DomainPasswordPolicy {
		DomainPasswordPolicy { min_length, complexity_enabled, ..Default::default() }
	}

	#[test]
	fn length_rules_come_first() {
		let validator = PolicyRulesValidator;

		assert_eq!(
			validator.validate("alee", "Ab1!", &policy(8, true)),
			ValidationStatus::TooShort
		);
		assert_eq!(
			validator.validate("alee", &"Ab1!".repeat(65), &policy(8, true)),
			ValidationStatus::TooLong
		);
	}

	#[test]
	fn complexity_needs_three_categories() {
		let validator = PolicyRulesValidator;

		assert_eq!(
			validator.validate("alee", "lowercase1", &policy(8, true)),
			ValidationStatus::NotComplex
		);
		assert_eq!(
			validator.validate("alee", "Summer2024", &policy(8, true)),
			ValidationStatus::Success
		);
		assert_eq!(
			validator.validate("alee", "lowercase1", &policy(8, false)),
			ValidationStatus::Success
		);
	}

	#[test]
	fn account_name_inside_password_is_not_complex() {
		assert_eq!(
			PolicyRulesValidator.validate("alee", "xALEE2024!", &policy(8, true)),
			ValidationStatus::NotComplex
		);
	}
}

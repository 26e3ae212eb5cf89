//! Account health as seen by the credential verifier, and the ordered gates that decide whether
//! an authentication attempt is safe.

use std::fmt;

use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};

use crate::candidate::Candidate;

pub const ACCOUNT_NAME: &str = "sAMAccountName";
pub const DISPLAY_NAME: &str = "displayName";
pub const ACCOUNT_EXPIRATION: &str = "AccountExpirationDate";
pub const ENABLED: &str = "Enabled";
pub const LOCKED_OUT: &str = "LockedOut";
pub const LAST_BAD_PASSWORD: &str = "LastBadPasswordAttempt";
pub const PASSWORD_EXPIRED: &str = "PasswordExpired";
pub const CONTACT_PROPERTIES: [&str; 3] = ["mail", "telephoneNumber", "mobile"];

/// The fixed property set requested when resolving identities for verification.
pub fn verification_properties() -> Vec<String> {
	[
		ACCOUNT_NAME,
		DISPLAY_NAME,
		ACCOUNT_EXPIRATION,
		ENABLED,
		LOCKED_OUT,
		LAST_BAD_PASSWORD,
		PASSWORD_EXPIRED,
	]
	.iter()
	.map(|name| name.to_string())
	.collect()
}

/// Health-relevant fields of a candidate. Anything the directory did not report stays `None`
/// and never blocks a test on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
	pub account_name: Option<String>,
	pub display_name: Option<String>,
	pub expires_at: Option<OffsetDateTime>,
	pub enabled: Option<bool>,
	pub locked_out: Option<bool>,
	pub password_expired: Option<bool>,
	pub last_bad_password: Option<OffsetDateTime>,
}
impl AccountState {
	pub fn from_candidate(candidate: &Candidate) -> Self {
		Self {
			account_name: candidate.text(ACCOUNT_NAME).map(str::to_string),
			display_name: candidate.text(DISPLAY_NAME).map(str::to_string),
			expires_at: candidate.get(ACCOUNT_EXPIRATION).and_then(|value| value.as_time()),
			enabled: candidate.get(ENABLED).and_then(|value| value.as_bool()),
			locked_out: candidate.get(LOCKED_OUT).and_then(|value| value.as_bool()),
			password_expired: candidate.get(PASSWORD_EXPIRED).and_then(|value| value.as_bool()),
			last_bad_password: candidate.get(LAST_BAD_PASSWORD).and_then(|value| value.as_time()),
		}
	}
}

/// Why a password was not tested against an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafeReason {
	EmptyPassword,
	AccountExpired { at: OffsetDateTime },
	AccountDisabled,
	AccountLocked,
	PasswordExpired,
	PolicyRejected { status: String },
	RecentFailure { at: OffsetDateTime, replicas: Vec<String>, until: OffsetDateTime },
}

impl fmt::Display for UnsafeReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::EmptyPassword => f.write_str("Password is empty; not tested."),
			Self::AccountExpired { at } => {
				write!(f, "Account expired at {}; not tested.", rfc3339(*at))
			},
			Self::AccountDisabled => f.write_str("Account is disabled; not tested."),
			Self::AccountLocked => f.write_str("Account is locked out; not tested."),
			Self::PasswordExpired => f.write_str("Password is expired; not tested."),
			Self::PolicyRejected { status } => write!(
				f,
				"Password cannot satisfy the domain policy ({status}); it cannot be current. Not tested."
			),
			Self::RecentFailure { at, replicas, until } => write!(
				f,
				"Last bad password at {} (replicas: {}) is inside the lockout observation window; unsafe until {}.",
				rfc3339(*at),
				replicas.join(", "),
				rfc3339(*until)
			),
		}
	}
}

/// Cheap checks in fixed order, first failure wins. None of them touch the directory.
pub fn cheap_gate(
	password: &str,
	state: &AccountState,
	now: OffsetDateTime,
) -> Option<UnsafeReason> {
	if password.is_empty() {
		return Some(UnsafeReason::EmptyPassword);
	}
	if let Some(at) = state.expires_at.filter(|at| *at <= now) {
		return Some(UnsafeReason::AccountExpired { at });
	}
	if state.enabled == Some(false) {
		return Some(UnsafeReason::AccountDisabled);
	}
	if state.locked_out == Some(true) {
		return Some(UnsafeReason::AccountLocked);
	}
	if state.password_expired == Some(true) {
		return Some(UnsafeReason::PasswordExpired);
	}

	None
}

/// Fails when the most recent bad password across replicas is still inside the observation
/// window.
pub fn recent_failure_gate(
	last_bad_password: Option<OffsetDateTime>,
	replicas: &[String],
	window: Duration,
	now: OffsetDateTime,
) -> Option<UnsafeReason> {
	let at = last_bad_password?;
	let until = at + window;

	if until <= now {
		return None;
	}

	Some(UnsafeReason::RecentFailure { at, replicas: replicas.to_vec(), until })
}

fn rfc3339(at: OffsetDateTime) -> String {
	at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

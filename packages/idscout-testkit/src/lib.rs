//! Shared fixtures for idscout tests: a complete configuration and directory account builders.

use time::OffsetDateTime;

use idscout_config::{
	Attributes, Config, Directory, Monitor, Output, Resolver, Schema, Service, Verifier,
};
use idscout_domain::{
	account,
	candidate::{AttrValue, Candidate},
};

/// A configuration that passes validation and points at no real directory.
pub fn test_config() -> Config {
	let attributes = Attributes::default();
	let mut allowed = Vec::new();

	for name in attributes
		.basic
		.iter()
		.chain(&attributes.freetext)
		.chain(&attributes.email)
		.chain(&attributes.number)
		.chain(&attributes.name)
	{
		if !allowed.contains(name) {
			allowed.push(name.clone());
		}
	}

	Config {
		service: Service { log_level: "info".to_string() },
		directory: Directory {
			url: "ldaps://dc01.corp.example:636".to_string(),
			base_dn: "DC=corp,DC=example".to_string(),
			bind_dn: "CN=svc-idscout,OU=Service,DC=corp,DC=example".to_string(),
			bind_password: Some("bind-secret".to_string()),
			replicas: Vec::new(),
			object_class: "user".to_string(),
			connect_timeout_ms: 1_000,
			use_starttls: false,
			use_ssl: true,
			replica_port: 636,
		},
		schema: Schema { allowed_attributes: allowed },
		attributes,
		resolver: Resolver::default(),
		verifier: Verifier::default(),
		monitor: Monitor::default(),
		output: Output::default(),
	}
}

/// Builds a user account the way the directory provider decodes one.
#[derive(Debug, Clone)]
pub struct AccountFixture {
	candidate: Candidate,
}
impl AccountFixture {
	/// A healthy, enabled, unlocked account under `OU=Staff`.
	pub fn new(account_name: &str, display_name: &str) -> Self {
		let key = format!("CN={display_name},OU=Staff,DC=corp,DC=example");
		let given = display_name.split_whitespace().next().unwrap_or(display_name);
		let surname = display_name.split_whitespace().last().unwrap_or(display_name);
		let candidate = Candidate::new(key)
			.with(account::ACCOUNT_NAME, text(account_name))
			.with(account::DISPLAY_NAME, text(display_name))
			.with("name", text(display_name))
			.with("cn", text(display_name))
			.with("givenName", text(given))
			.with("sn", text(surname))
			.with(account::ENABLED, AttrValue::Bool(true))
			.with(account::LOCKED_OUT, AttrValue::Bool(false))
			.with(account::PASSWORD_EXPIRED, AttrValue::Bool(false));

		Self { candidate }
	}

	pub fn key(&self) -> &str {
		&self.candidate.key
	}

	pub fn mail(self, mail: &str) -> Self {
		self.with("mail", text(mail)).with("userPrincipalName", text(mail))
	}

	pub fn phone(self, phone: &str) -> Self {
		self.with("telephoneNumber", text(phone))
	}

	pub fn employee_id(self, id: &str) -> Self {
		self.with("employeeID", text(id))
	}

	pub fn disabled(self) -> Self {
		self.with(account::ENABLED, AttrValue::Bool(false))
	}

	pub fn locked(self) -> Self {
		self.with(account::LOCKED_OUT, AttrValue::Bool(true))
	}

	pub fn password_expired(self) -> Self {
		self.with(account::PASSWORD_EXPIRED, AttrValue::Bool(true))
	}

	pub fn expires_at(self, at: OffsetDateTime) -> Self {
		self.with(account::ACCOUNT_EXPIRATION, AttrValue::Time(at))
	}

	pub fn last_bad_password(self, at: OffsetDateTime) -> Self {
		self.with(account::LAST_BAD_PASSWORD, AttrValue::Time(at))
	}

	pub fn with(mut self, name: &str, value: AttrValue) -> Self {
		self.candidate = self.candidate.with(name, value);

		self
	}

	pub fn build(self) -> Candidate {
		self.candidate
	}
}

pub fn text(value: &str) -> AttrValue {
	AttrValue::Text(value.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_passes_validation() {
		idscout_config::validate(&test_config()).expect("Test config should validate.");
	}

	#[test]
	fn fixtures_start_healthy() {
		let candidate = AccountFixture::new("jdoe", "John Doe").mail("jdoe@corp.example").build();
		let state = account::AccountState::from_candidate(&candidate);

		assert_eq!(candidate.key, "CN=John Doe,OU=Staff,DC=corp,DC=example");
		assert_eq!(state.account_name.as_deref(), Some("jdoe"));
		assert_eq!(state.enabled, Some(true));
		assert_eq!(state.locked_out, Some(false));
		assert_eq!(candidate.text("sn"), Some("Doe"));
	}
}

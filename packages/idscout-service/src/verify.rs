use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, IdScoutService, Resolution, Result};
use idscout_domain::{
	account::{self, AccountState, UnsafeReason},
	aggregate::AggregationMethod,
	candidate::{AttrValue, Candidate},
	policy::{DomainPasswordPolicy, ValidationStatus},
	query::StrategyHint,
	tokenize,
};

/// One claimed `identifier`/`password` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialLine {
	pub identifier: String,
	pub password: String,
}
impl CredentialLine {
	pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
		Self { identifier: identifier.into(), password: password.into() }
	}

	/// Splits at the first `delimiter`; the password keeps any later occurrences of it.
	pub fn parse(line: &str, delimiter: &str) -> Option<Self> {
		let line = line.trim_end_matches(['\r', '\n']);
		let (identifier, password) = line.split_once(delimiter)?;
		let identifier = identifier.trim();

		if identifier.is_empty() {
			return None;
		}

		Some(Self::new(identifier, password))
	}
}

/// The verdict for one (identifier, candidate) pair. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
	pub identifier: String,
	pub found: bool,
	pub candidate_key: Option<String>,
	pub account_name: Option<String>,
	pub display_name: Option<String>,
	pub password_checked: bool,
	pub password_valid: bool,
	pub suspicious: bool,
	pub notes: Vec<String>,
	#[serde(with = "idscout_domain::time_serde::option")]
	pub safe_until: Option<OffsetDateTime>,
	pub password: String,
}
impl VerificationOutcome {
	fn unmatched(line: &CredentialLine, notes: Vec<String>) -> Self {
		Self {
			identifier: line.identifier.clone(),
			found: false,
			candidate_key: None,
			account_name: None,
			display_name: None,
			password_checked: false,
			password_valid: false,
			suspicious: false,
			notes,
			safe_until: None,
			password: line.password.clone(),
		}
	}

	/// Accounts matched, but too many to single one out.
	fn ambiguous(line: &CredentialLine, notes: Vec<String>) -> Self {
		Self { found: true, ..Self::unmatched(line, notes) }
	}

	fn for_candidate(
		line: &CredentialLine,
		candidate: &Candidate,
		state: &AccountState,
		notes: Vec<String>,
	) -> Self {
		Self {
			found: true,
			candidate_key: Some(candidate.key.clone()),
			account_name: state.account_name.clone(),
			display_name: state.display_name.clone(),
			..Self::unmatched(line, notes)
		}
	}

	fn skipped(mut self, reason: UnsafeReason) -> Self {
		tracing::info!(
			identifier = %self.identifier,
			account = self.account_name.as_deref().unwrap_or_default(),
			reason = ?reason,
			"Password not tested."
		);

		self.notes.push(reason.to_string());

		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
	pub batch_id: Uuid,
	pub outcomes: Vec<VerificationOutcome>,
}
impl BatchReport {
	pub fn tested(&self) -> impl Iterator<Item = &VerificationOutcome> {
		self.outcomes.iter().filter(|outcome| outcome.password_checked)
	}
}

impl IdScoutService {
	pub async fn domain_policy(&self) -> Result<DomainPasswordPolicy> {
		self.collaborators.directory.domain_password_policy(None).await.map_err(|err| {
			let message = format!("Reading the domain password policy failed: {err}");

			Error::Directory { message }
		})
	}

	/// Verifies lines one at a time so at most one authentication attempt is in flight. The
	/// domain policy is read once, before any line is touched.
	pub async fn verify_batch(&self, lines: &[CredentialLine]) -> Result<BatchReport> {
		let batch_id = Uuid::new_v4();
		let policy = self.domain_policy().await?;
		let mut outcomes = Vec::with_capacity(lines.len());

		tracing::info!(%batch_id, lines = lines.len(), "Verification batch started.");

		for line in lines {
			outcomes.extend(self.verify(line, &policy).await?);
		}

		tracing::info!(
			%batch_id,
			outcomes = outcomes.len(),
			tested = outcomes.iter().filter(|outcome| outcome.password_checked).count(),
			"Verification batch finished."
		);

		Ok(BatchReport { batch_id, outcomes })
	}

	/// Resolves the identifier, then tests the password against each candidate that passes every
	/// safety gate.
	pub async fn verify(
		&self,
		line: &CredentialLine,
		policy: &DomainPasswordPolicy,
	) -> Result<Vec<VerificationOutcome>> {
		let properties = account::verification_properties();
		let identifier = line.identifier.trim();
		let mut notes = Vec::new();
		let mut resolution = self.resolve(self.query(identifier), &properties).await?;

		note_resolution(&mut notes, &resolution);

		if resolution.candidates.is_empty()
			&& let Some((local, _)) = tokenize::split_email(identifier)
		{
			notes.push(format!("No account matched '{identifier}'; retrying with '{local}'."));

			let retry = self.query(local).with_thorough(true).with_hint(StrategyHint::Name);

			resolution = self.resolve(retry, &properties).await?;

			note_resolution(&mut notes, &resolution);
		}

		let found = resolution.candidates.len();

		if found == 0 {
			notes.push("No matching account.".to_string());

			return Ok(vec![VerificationOutcome::unmatched(line, notes)]);
		}

		let max_hits = self.cfg.verifier.max_hits as usize;

		if found > max_hits {
			notes.push(format!(
				"{found} candidates exceed the limit of {max_hits}; assumed false positive. \
				 No password tested."
			));

			return Ok(vec![VerificationOutcome::ambiguous(line, notes)]);
		}

		let mut outcomes = Vec::with_capacity(found);

		for candidate in &resolution.candidates {
			outcomes.push(self.verify_candidate(line, candidate, policy, notes.clone()).await);
		}

		Ok(outcomes)
	}

	async fn verify_candidate(
		&self,
		line: &CredentialLine,
		candidate: &Candidate,
		policy: &DomainPasswordPolicy,
		notes: Vec<String>,
	) -> VerificationOutcome {
		let state = AccountState::from_candidate(candidate);
		let mut outcome = VerificationOutcome::for_candidate(line, candidate, &state, notes);
		let now = OffsetDateTime::now_utc();

		if let Some(reason) = account::cheap_gate(&line.password, &state, now) {
			return outcome.skipped(reason);
		}

		let Some(account_name) = state.account_name.as_deref() else {
			outcome.notes.push("Candidate has no account name; not tested.".to_string());

			return outcome;
		};

		let validator = &self.collaborators.validator;

		match validator.validate(account_name, &line.password, policy, None).await {
			Ok(status) if status.rules_out_password() => {
				let status = status.to_string();

				return outcome.skipped(UnsafeReason::PolicyRejected { status });
			},
			Ok(ValidationStatus::HistoryConflict) => {
				outcome.notes.push("Password matches the account's password history.".to_string());
			},
			Ok(ValidationStatus::Other) => {
				let note = "Password policy check was inconclusive; proceeding.";

				outcome.notes.push(note.to_string());
			},
			Ok(_) => {},
			Err(err) => {
				tracing::warn!(
					error = %err,
					account = account_name,
					"Password policy check failed."
				);

				outcome.suspicious = true;
				outcome.notes.push(format!(
					"Password policy check failed unexpectedly ({err}); result suspicious."
				));
			},
		}

		let properties = [account::LAST_BAD_PASSWORD.to_string()];
		let lookup = self
			.aggregate_across_replicas(
				&candidate.key,
				&properties,
				None,
				AggregationMethod::Maximum,
			)
			.await;
		let (last_bad_password, replicas) = match lookup.result(account::LAST_BAD_PASSWORD) {
			Some(result) => {
				let at = result.value.as_ref().and_then(AttrValue::as_time);

				(at, result.source_replicas.clone())
			},
			None => (None, Vec::new()),
		};

		outcome.notes.extend(lookup.warnings);

		if let Some(reason) = account::recent_failure_gate(
			last_bad_password,
			&replicas,
			policy.lockout_observation_window,
			now,
		) {
			return outcome.skipped(reason);
		}

		let attempted_at = OffsetDateTime::now_utc();

		match self.collaborators.auth.try_authenticate(account_name, &line.password).await {
			Ok(valid) => {
				outcome.password_valid = valid;
				outcome.notes.push(
					if valid { "Password is valid." } else { "Password was rejected." }.to_string(),
				);

				tracing::info!(account = account_name, valid, "Password tested.");
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					account = account_name,
					"Authentication attempt failed."
				);

				outcome.suspicious = true;
				outcome.notes.push(format!(
					"Authentication attempt failed unexpectedly ({err}); result suspicious."
				));
			},
		}

		// An attempt that errored may still have reached the directory.
		outcome.password_checked = true;
		outcome.safe_until = Some(attempted_at + policy.lockout_observation_window);

		outcome
	}
}

fn note_resolution(notes: &mut Vec<String>, resolution: &Resolution) {
	for run in resolution.trace.iter().filter(|run| run.hits > 0) {
		let marker = if run.speculative { " (speculative)" } else { "" };

		notes.push(format!(
			"The {} search for '{}' at depth {} matched {} account(s){marker}.",
			run.strategy, run.text, run.depth, run.hits
		));
	}

	notes.extend(resolution.warnings.iter().cloned());
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lines_split_at_the_first_delimiter() {
		assert_eq!(
			CredentialLine::parse("alee:pa:ss:word\r\n", ":"),
			Some(CredentialLine::new("alee", "pa:ss:word"))
		);
		assert_eq!(CredentialLine::parse("alee", ":"), None);
		assert_eq!(CredentialLine::parse(" :secret", ":"), None);
	}

	#[test]
	fn empty_passwords_survive_parsing() {
		assert_eq!(CredentialLine::parse("alee:", ":"), Some(CredentialLine::new("alee", "")));
	}
}

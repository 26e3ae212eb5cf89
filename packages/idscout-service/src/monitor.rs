use std::time::Duration as StdDuration;

use futures::future;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::{self as tokio_time, Instant};
use tokio_util::sync::CancellationToken;

use crate::{IdScoutService, VerificationOutcome};
use idscout_domain::{
	account::{self, AccountState},
	aggregate::AggregationMethod,
	candidate::{AttrValue, Candidate},
};

#[derive(Debug, Clone, Serialize)]
pub struct LockoutAlert {
	pub candidate_key: String,
	pub account_name: String,
	pub display_name: Option<String>,
	pub contact: Vec<String>,
	#[serde(with = "idscout_domain::time_serde::option")]
	pub last_bad_password: Option<OffsetDateTime>,
	pub last_bad_password_replicas: Vec<String>,
	#[serde(with = "idscout_domain::time_serde")]
	pub detected_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorStatus {
	Completed,
	/// Every window closed, but some accounts could not be read on their final pass.
	Incomplete,
	Cancelled,
	NothingToWatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
	pub status: MonitorStatus,
	pub alerts: Vec<LockoutAlert>,
	pub watched: usize,
	pub passes: u32,
	pub unresolved_at_cancel: usize,
	/// Accounts whose lock state was unreadable when their window closed.
	pub unverified: Vec<String>,
	pub warnings: Vec<String>,
}
impl MonitorReport {
	fn nothing_to_watch() -> Self {
		Self {
			status: MonitorStatus::NothingToWatch,
			alerts: Vec::new(),
			watched: 0,
			passes: 0,
			unresolved_at_cancel: 0,
			unverified: Vec::new(),
			warnings: Vec::new(),
		}
	}
}

#[derive(Debug, Clone)]
struct Watched {
	candidate_key: String,
	account_name: String,
	display_name: Option<String>,
	deadline: Instant,
}

#[derive(Debug)]
enum LockState {
	Locked(Box<LockoutAlert>),
	Clear,
	Unknown(String),
}

#[derive(Debug)]
struct Poll {
	state: LockState,
	warnings: Vec<String>,
}

impl IdScoutService {
	/// Polls every tested account until it locks or its observation window closes. Accounts are
	/// polled concurrently; passes are `monitor.poll_interval_secs` apart and the wait between
	/// them ends early on `cancel`.
	pub async fn monitor_lockouts(
		&self,
		outcomes: &[VerificationOutcome],
		cancel: CancellationToken,
	) -> MonitorReport {
		let mut watch = watch_set(outcomes);

		if watch.is_empty() {
			tracing::info!("No tested accounts to monitor.");

			return MonitorReport::nothing_to_watch();
		}

		let interval = StdDuration::from_secs(self.cfg.monitor.poll_interval_secs);
		let mut report = MonitorReport {
			status: MonitorStatus::Completed,
			watched: watch.len(),
			..MonitorReport::nothing_to_watch()
		};

		tracing::info!(accounts = report.watched, "Lockout monitor started.");

		loop {
			if cancel.is_cancelled() {
				return cancelled(report, watch.len());
			}

			report.passes += 1;

			let polls = future::join_all(watch.iter().map(|account| self.poll(account))).await;
			let now = Instant::now();
			let mut remaining = Vec::with_capacity(watch.len());

			for (account, poll) in watch.into_iter().zip(polls) {
				report.warnings.extend(poll.warnings);

				match poll.state {
					LockState::Locked(alert) => {
						tracing::warn!(
							account = %alert.account_name,
							contact = %alert.contact.join(", "),
							"Account locked out after testing."
						);

						report.alerts.push(*alert);
					},
					LockState::Unknown(reason) => {
						report.warnings.push(format!(
							"Pass {}: lock state of {} is unknown: {reason}",
							report.passes, account.account_name
						));

						if now >= account.deadline {
							tracing::warn!(
								account = %account.account_name,
								"Observation window closed without a readable lock state."
							);

							report.unverified.push(account.account_name);
						} else {
							remaining.push(account);
						}
					},
					LockState::Clear if now >= account.deadline => {
						tracing::debug!(
							account = %account.account_name,
							"Observation window closed."
						);
					},
					LockState::Clear => remaining.push(account),
				}
			}

			watch = remaining;

			let Some(wait_until) = watch.iter().map(|account| account.deadline).max() else {
				if !report.unverified.is_empty() {
					report.status = MonitorStatus::Incomplete;
				}

				tracing::info!(
					passes = report.passes,
					alerts = report.alerts.len(),
					unverified = report.unverified.len(),
					"Lockout monitor finished."
				);

				return report;
			};
			let next_pass = (now + interval).min(wait_until);

			tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					return cancelled(report, watch.len());
				},
				_ = tokio_time::sleep_until(next_pass) => {},
			}
		}
	}

	/// Current lock state from the default server, plus the replica-wide last failure time.
	async fn poll(&self, target: &Watched) -> Poll {
		let mut properties = vec![
			account::LOCKED_OUT.to_string(),
			account::ACCOUNT_NAME.to_string(),
			account::DISPLAY_NAME.to_string(),
		];

		properties.extend(account::CONTACT_PROPERTIES.iter().map(|name| name.to_string()));

		let last_bad = [account::LAST_BAD_PASSWORD.to_string()];
		let (current, failures) = tokio::join!(
			self.collaborators.directory.get_account(&target.candidate_key, &properties, None),
			self.aggregate_across_replicas(
				&target.candidate_key,
				&last_bad,
				None,
				AggregationMethod::Maximum,
			),
		);
		let warnings = failures.warnings.clone();
		let candidate = match current {
			Ok(Some(candidate)) => candidate,
			Ok(None) => {
				tracing::warn!(account = %target.account_name, "Monitored account disappeared.");

				let state = LockState::Unknown("the account was not found".to_string());

				return Poll { state, warnings };
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					account = %target.account_name,
					"Polling lock state failed."
				);

				return Poll { state: LockState::Unknown(err.to_string()), warnings };
			},
		};
		let state = AccountState::from_candidate(&candidate);

		match state.locked_out {
			Some(true) => {},
			Some(false) => return Poll { state: LockState::Clear, warnings },
			None => {
				let state = LockState::Unknown("the lock flag was not returned".to_string());

				return Poll { state, warnings };
			},
		}

		let (last_bad_password, last_bad_password_replicas) =
			match failures.result(account::LAST_BAD_PASSWORD) {
				Some(result) => (
					result.value.as_ref().and_then(AttrValue::as_time),
					result.source_replicas.clone(),
				),
				None => (None, Vec::new()),
			};

		let alert = LockoutAlert {
			candidate_key: target.candidate_key.clone(),
			account_name: state.account_name.unwrap_or_else(|| target.account_name.clone()),
			display_name: state.display_name.or_else(|| target.display_name.clone()),
			contact: contact_values(&candidate),
			last_bad_password,
			last_bad_password_replicas,
			detected_at: OffsetDateTime::now_utc(),
		};

		Poll { state: LockState::Locked(Box::new(alert)), warnings }
	}
}

fn cancelled(mut report: MonitorReport, unresolved: usize) -> MonitorReport {
	tracing::warn!(
		unresolved,
		"Lockout monitor cancelled before every observation window closed."
	);

	report.status = MonitorStatus::Cancelled;
	report.unresolved_at_cancel = unresolved;

	report
}

/// Tested accounts keyed by candidate, each keeping its latest `safe_until`.
fn watch_set(outcomes: &[VerificationOutcome]) -> Vec<Watched> {
	let now_utc = OffsetDateTime::now_utc();
	let now = Instant::now();
	let mut watch: Vec<Watched> = Vec::new();

	for outcome in outcomes.iter().filter(|outcome| outcome.password_checked) {
		let (Some(key), Some(name), Some(safe_until)) =
			(&outcome.candidate_key, &outcome.account_name, outcome.safe_until)
		else {
			continue;
		};
		let remaining = StdDuration::try_from(safe_until - now_utc).unwrap_or(StdDuration::ZERO);
		let deadline = now + remaining;

		match watch.iter_mut().find(|account| &account.candidate_key == key) {
			Some(existing) => existing.deadline = existing.deadline.max(deadline),
			None => watch.push(Watched {
				candidate_key: key.clone(),
				account_name: name.clone(),
				display_name: outcome.display_name.clone(),
				deadline,
			}),
		}
	}

	watch
}

fn contact_values(candidate: &Candidate) -> Vec<String> {
	let mut contact = Vec::new();

	for name in account::CONTACT_PROPERTIES {
		match candidate.get(name) {
			Some(AttrValue::List(values)) => contact.extend(values.iter().cloned()),
			Some(value) => contact.push(value.to_string()),
			None => {},
		}
	}

	contact.retain(|value| !value.trim().is_empty());

	contact
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tested(key: &str, minutes: i64) -> VerificationOutcome {
		VerificationOutcome {
			identifier: key.to_string(),
			found: true,
			candidate_key: Some(key.to_string()),
			account_name: Some(key.to_lowercase()),
			display_name: None,
			password_checked: true,
			password_valid: false,
			suspicious: false,
			notes: Vec::new(),
			safe_until: Some(OffsetDateTime::now_utc() + time::Duration::minutes(minutes)),
			password: "secret".to_string(),
		}
	}

	#[test]
	fn watch_set_keeps_tested_accounts_once() {
		let mut untested = tested("CN=C", 10);

		untested.password_checked = false;
		untested.safe_until = None;

		let outcomes = vec![tested("CN=A", 5), tested("CN=B", 5), tested("CN=A", 20), untested];
		let watch = watch_set(&outcomes);

		assert_eq!(watch.len(), 2);
		assert!(watch[0].deadline > watch[1].deadline);
	}

	#[test]
	fn elapsed_windows_get_an_immediate_deadline() {
		let watch = watch_set(&[tested("CN=A", -5)]);

		assert!(watch[0].deadline <= Instant::now());
	}

	#[test]
	fn contact_values_flatten_lists() {
		let candidate = Candidate::new("CN=A")
			.with("mail", AttrValue::Text("a@corp.example".to_string()))
			.with(
				"telephoneNumber",
				AttrValue::List(vec!["+1 555 0100".to_string(), " ".to_string()]),
			);

		assert_eq!(contact_values(&candidate), vec!["a@corp.example", "+1 555 0100"]);
	}
}

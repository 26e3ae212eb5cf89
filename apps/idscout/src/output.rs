use std::{
	fs::OpenOptions,
	io::{self, Write},
	path::Path,
};

use color_eyre::eyre;
use serde::Serialize;
use uuid::Uuid;

use idscout_service::{LockoutAlert, MonitorReport, MonitorStatus, VerificationOutcome};

/// One JSON object per line, on stdout or appended to a file.
pub struct JsonLines {
	writer: Box<dyn Write + Send>,
}
impl JsonLines {
	/// Opens the destination up front so an unwritable path fails before any directory work.
	pub fn open(path: Option<&Path>) -> color_eyre::Result<Self> {
		let writer: Box<dyn Write + Send> = match path {
			Some(path) => {
				let file = OpenOptions::new().create(true).append(true).open(path).map_err(|err| {
					eyre::eyre!("Output destination {} is not writable: {err}.", path.display())
				})?;

				Box::new(io::BufWriter::new(file))
			},
			None => Box::new(io::stdout()),
		};

		Ok(Self { writer })
	}

	pub fn write<T>(&mut self, record: &T) -> color_eyre::Result<()>
	where
		T: Serialize + ?Sized,
	{
		serde_json::to_writer(&mut self.writer, record)?;

		self.writer.write_all(b"\n")?;
		self.writer.flush()?;

		Ok(())
	}
}

#[derive(Debug, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum BatchRecord<'a> {
	Verification {
		batch_id: Uuid,
		#[serde(flatten)]
		outcome: &'a VerificationOutcome,
	},
	LockoutAlert {
		batch_id: Uuid,
		#[serde(flatten)]
		alert: &'a LockoutAlert,
	},
	Monitor {
		batch_id: Uuid,
		status: MonitorStatus,
		watched: usize,
		passes: u32,
		alerts: usize,
		unresolved_at_cancel: usize,
		unverified: &'a [String],
		warnings: &'a [String],
	},
}
impl<'a> BatchRecord<'a> {
	pub fn monitor(batch_id: Uuid, report: &'a MonitorReport) -> Self {
		Self::Monitor {
			batch_id,
			status: report.status,
			watched: report.watched,
			passes: report.passes,
			alerts: report.alerts.len(),
			unresolved_at_cancel: report.unresolved_at_cancel,
			unverified: &report.unverified,
			warnings: &report.warnings,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verification_records_are_tagged_and_flat() {
		let outcome = VerificationOutcome {
			identifier: "jdoe".to_string(),
			found: true,
			candidate_key: Some("CN=John Doe,DC=corp".to_string()),
			account_name: Some("jdoe".to_string()),
			display_name: None,
			password_checked: false,
			password_valid: false,
			suspicious: false,
			notes: vec!["Password is empty; not tested.".to_string()],
			safe_until: None,
			password: String::new(),
		};
		let record = BatchRecord::Verification { batch_id: Uuid::nil(), outcome: &outcome };
		let value = serde_json::to_value(&record).expect("Serialize failed.");

		assert_eq!(value["record"], "verification");
		assert_eq!(value["identifier"], "jdoe");
		assert_eq!(value["batch_id"], Uuid::nil().to_string());
		assert!(value["safe_until"].is_null());
	}

	#[test]
	fn incomplete_monitor_summaries_name_unverified_accounts() {
		let report = MonitorReport {
			status: MonitorStatus::Incomplete,
			alerts: Vec::new(),
			watched: 1,
			passes: 3,
			unresolved_at_cancel: 0,
			unverified: vec!["jdoe".to_string()],
			warnings: vec!["Pass 3: lock state of jdoe is unknown: timeout".to_string()],
		};
		let value = serde_json::to_value(BatchRecord::monitor(Uuid::nil(), &report))
			.expect("Serialize failed.");

		assert_eq!(value["record"], "monitor");
		assert_eq!(value["status"], "Incomplete");
		assert_eq!(value["unverified"][0], "jdoe");
		assert_eq!(value["warnings"].as_array().map(Vec::len), Some(1));
	}

	#[test]
	fn unwritable_destination_fails_up_front() {
		let path =
			std::env::temp_dir().join("idscout-missing-dir").join("nested").join("out.jsonl");

		assert!(JsonLines::open(Some(&path)).is_err());
	}
}

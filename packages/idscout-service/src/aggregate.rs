use futures::future;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::IdScoutService;
use idscout_domain::{
	aggregate::{self, AggregationMethod, AggregationResult, ReplicaValue},
	candidate::Candidate,
};

const DEFAULT_REPLICA: &str = "default";

/// One replica's view of an account in "return all" mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaRecord {
	pub replica: String,
	pub candidate: Option<Candidate>,
	pub error: Option<String>,
}
impl ReplicaRecord {
	/// Flat record of the replica's attribute values plus a `Replica` provenance field.
	pub fn to_record(&self, identity: &str) -> Map<String, Value> {
		let mut record = Map::new();

		record.insert("Identity".to_string(), Value::String(identity.to_string()));

		if let Some(candidate) = &self.candidate {
			for (name, value) in &candidate.attributes {
				record.insert(name.clone(), serde_json::to_value(value).unwrap_or(Value::Null));
			}
		}

		record.insert("Replica".to_string(), Value::String(self.replica.clone()));

		if let Some(error) = &self.error {
			record.insert("Error".to_string(), Value::String(error.clone()));
		}

		record
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaAggregate {
	pub identity: String,
	pub results: Vec<AggregationResult>,
	pub warnings: Vec<String>,
}
impl ReplicaAggregate {
	pub fn result(&self, property: &str) -> Option<&AggregationResult> {
		self.results.iter().find(|result| result.property.eq_ignore_ascii_case(property))
	}

	/// One flat record with `<property>_<method>` and `<property>_<method>_DC` fields.
	pub fn to_record(&self) -> Map<String, Value> {
		let mut record = Map::new();

		record.insert("Identity".to_string(), Value::String(self.identity.clone()));

		for result in &self.results {
			result.write_fields(&mut record);
		}

		record
	}
}

impl IdScoutService {
	/// Reads `properties` for `identity` from every replica concurrently. A failing replica is
	/// reported in its record and never aborts the others.
	pub async fn collect_across_replicas(
		&self,
		identity: &str,
		properties: &[String],
		replicas: Option<&[String]>,
	) -> (Vec<ReplicaRecord>, Vec<String>) {
		let mut warnings = Vec::new();
		let targets = match replicas {
			Some(replicas) if !replicas.is_empty() => replicas.to_vec(),
			_ => self.discover_replicas(&mut warnings).await,
		};
		let directory = &self.collaborators.directory;
		let records = future::join_all(targets.iter().map(|replica| async move {
			let target = (replica != DEFAULT_REPLICA).then_some(replica.as_str());

			match directory.get_account(identity, properties, target).await {
				Ok(candidate) => ReplicaRecord { replica: replica.clone(), candidate, error: None },
				Err(err) => {
					tracing::warn!(error = %err, %replica, "Replica query failed.");

					ReplicaRecord {
						replica: replica.clone(),
						candidate: None,
						error: Some(err.to_string()),
					}
				},
			}
		}))
		.await;

		for record in &records {
			if let Some(error) = &record.error {
				warnings.push(format!("Replica {} did not answer: {error}.", record.replica));
			}
		}

		(records, warnings)
	}

	/// Reduces each property across replicas with `method`.
	pub async fn aggregate_across_replicas(
		&self,
		identity: &str,
		properties: &[String],
		replicas: Option<&[String]>,
		method: AggregationMethod,
	) -> ReplicaAggregate {
		let (records, mut warnings) =
			self.collect_across_replicas(identity, properties, replicas).await;
		let mut results = Vec::with_capacity(properties.len());

		for property in properties {
			let values: Vec<ReplicaValue> = records
				.iter()
				.map(|record| {
					let value =
						record.candidate.as_ref().and_then(|candidate| candidate.get(property));

					ReplicaValue::new(record.replica.clone(), value.cloned())
				})
				.collect();
			let result = aggregate::reduce(property, method, &values);

			warnings.extend(result.warnings.iter().cloned());
			results.push(result);
		}

		tracing::debug!(
			%identity,
			%method,
			replicas = records.len(),
			"Replica aggregation finished."
		);

		ReplicaAggregate { identity: identity.to_string(), results, warnings }
	}

	async fn discover_replicas(&self, warnings: &mut Vec<String>) -> Vec<String> {
		match self.collaborators.directory.list_replicas().await {
			Ok(replicas) if !replicas.is_empty() => replicas,
			Ok(_) => {
				warnings
					.push("No replicas were listed; querying the default server only.".to_string());

				vec![DEFAULT_REPLICA.to_string()]
			},
			Err(err) => {
				tracing::warn!(error = %err, "Listing replicas failed.");

				warnings.push(format!(
					"Listing replicas failed ({err}); querying the default server only."
				));

				vec![DEFAULT_REPLICA.to_string()]
			},
		}
	}
}

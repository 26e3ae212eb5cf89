mod support;

use idscout_domain::{aggregate::AggregationMethod, candidate::AttrValue};
use idscout_testkit::{AccountFixture, test_config};

use support::{FakeDirectory, Harness, strings};

const KEY: &str = "CN=John Doe,OU=Staff,DC=corp,DC=example";

fn directory() -> FakeDirectory {
	FakeDirectory::new(vec![AccountFixture::new("jdoe", "John Doe").build()])
		.with_replicas(&["dc1", "dc2", "dc3", "dc4"])
		.with_replica_value("dc1", KEY, "logonCount", AttrValue::Integer(10))
		.with_replica_value("dc2", KEY, "logonCount", AttrValue::Integer(20))
		.with_replica_value("dc3", KEY, "logonCount", AttrValue::Integer(20))
		.with_replica_value("dc4", KEY, "logonCount", AttrValue::Integer(5))
}

#[tokio::test]
async fn maximum_reports_every_tied_replica() {
	let harness = Harness::new(test_config(), directory());
	let aggregate = harness
		.service
		.aggregate_across_replicas(KEY, &strings(&["logonCount"]), None, AggregationMethod::Maximum)
		.await;
	let result = aggregate.result("logonCount").expect("Missing logonCount result.");

	assert_eq!(result.value, Some(AttrValue::Integer(20)));
	assert_eq!(result.source_replicas, strings(&["dc2", "dc3"]));
	assert_eq!(harness.directory.account_read_count(), 4);
	assert!(aggregate.warnings.is_empty());
}

#[tokio::test]
async fn mean_and_median_reduce_all_replicas() {
	let harness = Harness::new(test_config(), directory());
	let properties = strings(&["logonCount"]);
	let mean = harness
		.service
		.aggregate_across_replicas(KEY, &properties, None, AggregationMethod::Mean)
		.await;
	let median = harness
		.service
		.aggregate_across_replicas(KEY, &properties, None, AggregationMethod::Median)
		.await;

	assert_eq!(
		mean.result("logonCount").and_then(|result| result.value.clone()),
		Some(AttrValue::Float(13.75))
	);
	assert_eq!(
		median.result("logonCount").and_then(|result| result.value.clone()),
		Some(AttrValue::Integer(20))
	);
}

#[tokio::test]
async fn failing_replica_is_reported_without_aborting() {
	let harness = Harness::new(test_config(), directory().with_failing_replica("dc3"));
	let replicas = strings(&["dc1", "dc2", "dc3"]);
	let (records, warnings) = harness
		.service
		.collect_across_replicas(KEY, &strings(&["logonCount"]), Some(&replicas))
		.await;

	assert_eq!(records.len(), 3);
	assert!(records[0].candidate.is_some());
	assert!(records[2].candidate.is_none());
	assert!(records[2].error.as_deref().is_some_and(|error| error.contains("unreachable")));
	assert!(warnings.iter().any(|warning| warning.contains("dc3")));

	let aggregate = harness
		.service
		.aggregate_across_replicas(
			KEY,
			&strings(&["logonCount"]),
			Some(&replicas),
			AggregationMethod::Minimum,
		)
		.await;
	let result = aggregate.result("logonCount").expect("Missing logonCount result.");

	assert_eq!(result.value, Some(AttrValue::Integer(10)));
	assert_eq!(result.source_replicas, strings(&["dc1"]));
}

#[tokio::test]
async fn listing_failure_falls_back_to_the_default_server() {
	let harness = Harness::new(test_config(), directory().with_failing_listing());
	let (records, warnings) =
		harness.service.collect_across_replicas(KEY, &strings(&["logonCount"]), None).await;

	assert_eq!(records.len(), 1);
	assert_eq!(records[0].replica, "default");
	assert!(records[0].candidate.is_some());
	assert!(warnings.iter().any(|warning| warning.contains("default server")));
}

#[tokio::test]
async fn flat_record_names_fields_by_method() {
	let harness = Harness::new(test_config(), directory());
	let aggregate = harness
		.service
		.aggregate_across_replicas(KEY, &strings(&["logonCount"]), None, AggregationMethod::Maximum)
		.await;
	let record = aggregate.to_record();

	assert_eq!(record["Identity"], KEY);
	assert_eq!(record["logonCount_Maximum"], 20);
	assert_eq!(record["logonCount_Maximum_DC"], serde_json::json!(["dc2", "dc3"]));
}

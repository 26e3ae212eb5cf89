pub mod input;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use idscout_domain::{aggregate::AggregationMethod, query::StrategyHint};
use idscout_service::{Collaborators, IdScoutService};

use crate::output::{BatchRecord, JsonLines};

#[derive(Debug, Parser)]
#[command(
	version = idscout_cli::VERSION,
	rename_all = "kebab",
	styles = idscout_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Append JSON lines here instead of writing to stdout. Overrides `output.path`.
	#[arg(long, short = 'o', value_name = "FILE")]
	pub output: Option<PathBuf>,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Resolve free text to directory accounts.
	Resolve(ResolveArgs),
	/// Read account properties from every replica and reduce them.
	Aggregate(AggregateArgs),
	/// Test claimed credentials without locking anyone out, then watch for lockouts.
	Verify(VerifyArgs),
}

#[derive(Debug, clap::Args)]
pub struct ResolveArgs {
	#[arg(value_name = "TEXT", required = true, num_args = 1..)]
	pub text: Vec<String>,
	#[arg(long, value_name = "HINT", default_value = "auto")]
	pub hint: StrategyHint,
	#[arg(long)]
	pub thorough: bool,
	/// Also search word fragments. Matches are speculative.
	#[arg(long)]
	pub substrings: bool,
	#[arg(long = "property", short = 'p', value_name = "NAME")]
	pub properties: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct AggregateArgs {
	#[arg(value_name = "IDENTITY")]
	pub identity: String,
	#[arg(long = "property", short = 'p', value_name = "NAME", required = true)]
	pub properties: Vec<String>,
	#[arg(long, short = 'm', value_name = "METHOD", default_value = "maximum")]
	pub method: AggregationMethod,
	/// Replica hosts to query. Defaults to the configured or discovered replicas.
	#[arg(long = "replica", value_name = "HOST")]
	pub replicas: Vec<String>,
	/// Print one record per replica instead of the reduced record.
	#[arg(long)]
	pub all: bool,
}

#[derive(Debug, clap::Args)]
pub struct VerifyArgs {
	/// Credential file, or `-` for stdin.
	#[arg(value_name = "FILE")]
	pub input: PathBuf,
	/// Overrides `verifier.delimiter`.
	#[arg(long, short = 'd', value_name = "TEXT")]
	pub delimiter: Option<String>,
	/// Skip the post-test lockout watch.
	#[arg(long)]
	pub no_monitor: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = idscout_config::load(&args.config)?;

	init_tracing(&config)?;

	let destination = args.output.clone().or_else(|| config.output.path.clone());
	let mut sink = JsonLines::open(destination.as_deref())?;
	let collaborators = Collaborators::ldap(&config)?;
	let service = IdScoutService::new(config, collaborators);

	match args.command {
		Command::Resolve(cmd) => resolve(&service, cmd, &mut sink).await,
		Command::Aggregate(cmd) => aggregate(&service, cmd, &mut sink).await,
		Command::Verify(cmd) => verify(&service, cmd, &mut sink).await,
	}
}

async fn resolve(
	service: &IdScoutService,
	cmd: ResolveArgs,
	sink: &mut JsonLines,
) -> color_eyre::Result<()> {
	for text in &cmd.text {
		let mut query = service.query(text.as_str()).with_hint(cmd.hint);

		if cmd.thorough {
			query = query.with_thorough(true);
		}
		if cmd.substrings {
			query = query.with_substrings(true);
		}

		let resolution = service.resolve(query, &cmd.properties).await?;

		for warning in &resolution.warnings {
			tracing::warn!(%warning, "Resolution warning.");
		}

		sink.write(&json!({
			"query": text,
			"speculative": resolution.is_speculative(),
			"candidates": resolution.candidates,
			"trace": resolution.trace,
			"warnings": resolution.warnings,
		}))?;
	}

	Ok(())
}

async fn aggregate(
	service: &IdScoutService,
	cmd: AggregateArgs,
	sink: &mut JsonLines,
) -> color_eyre::Result<()> {
	let replicas = (!cmd.replicas.is_empty()).then_some(cmd.replicas.as_slice());

	if cmd.all {
		let (records, warnings) =
			service.collect_across_replicas(&cmd.identity, &cmd.properties, replicas).await;

		for warning in &warnings {
			tracing::warn!(%warning, "Aggregation warning.");
		}
		for record in &records {
			sink.write(&record.to_record(&cmd.identity))?;
		}

		return Ok(());
	}

	let aggregate = service
		.aggregate_across_replicas(&cmd.identity, &cmd.properties, replicas, cmd.method)
		.await;

	for warning in &aggregate.warnings {
		tracing::warn!(%warning, "Aggregation warning.");
	}

	sink.write(&aggregate.to_record())
}

async fn verify(
	service: &IdScoutService,
	cmd: VerifyArgs,
	sink: &mut JsonLines,
) -> color_eyre::Result<()> {
	let delimiter = cmd.delimiter.unwrap_or_else(|| service.cfg.verifier.delimiter.clone());
	let raw = input::read_source(&cmd.input)?;
	let lines = input::parse_credentials(&raw, &delimiter);

	if lines.is_empty() {
		tracing::warn!(input = %cmd.input.display(), "No credentials to verify.");

		return Ok(());
	}

	let report = service.verify_batch(&lines).await?;

	for outcome in &report.outcomes {
		sink.write(&BatchRecord::Verification { batch_id: report.batch_id, outcome })?;
	}

	if cmd.no_monitor {
		return Ok(());
	}

	let cancel = CancellationToken::new();
	let on_ctrl_c = cancel.clone();
	let signal = tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			on_ctrl_c.cancel();
		}
	});

	if report.tested().next().is_some() {
		tracing::info!("Watching tested accounts for lockouts. Press Ctrl-C to stop early.");
	}

	let monitor = service.monitor_lockouts(&report.outcomes, cancel).await;

	signal.abort();

	for warning in &monitor.warnings {
		tracing::warn!(%warning, "Monitor warning.");
	}

	for alert in &monitor.alerts {
		sink.write(&BatchRecord::LockoutAlert { batch_id: report.batch_id, alert })?;
	}

	sink.write(&BatchRecord::monitor(report.batch_id, &monitor))
}

fn init_tracing(config: &idscout_config::Config) -> color_eyre::Result<()> {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&config.service.log_level))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init()
		.map_err(|err| color_eyre::eyre::eyre!(err))?;

	Ok(())
}

#![allow(dead_code)]

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use color_eyre::eyre;

use idscout_config::Config;
use idscout_domain::{
	candidate::{AttrValue, Candidate},
	policy::{DomainPasswordPolicy, ValidationStatus},
};
use idscout_service::{
	AuthProbe, BoxFuture, Collaborators, DirectoryClient, IdScoutService, PasswordPolicyValidator,
	SchemaProbe,
};

/// In-memory directory. Searches are case-insensitive wildcard matches over the filter
/// attributes; replica reads layer per-replica overrides on top of the shared account.
#[derive(Default)]
pub struct FakeDirectory {
	accounts: Mutex<Vec<Candidate>>,
	replicas: Vec<String>,
	replica_values: HashMap<(String, String), Vec<(String, AttrValue)>>,
	failing_replicas: HashSet<String>,
	fail_listing: bool,
	fail_search: bool,
	fail_policy: bool,
	policy: DomainPasswordPolicy,
	searches: AtomicUsize,
	account_reads: AtomicUsize,
	searched: Mutex<Vec<String>>,
}
impl FakeDirectory {
	pub fn new(accounts: Vec<Candidate>) -> Self {
		Self { accounts: Mutex::new(accounts), ..Self::default() }
	}

	pub fn with_replicas(mut self, replicas: &[&str]) -> Self {
		self.replicas = replicas.iter().map(|replica| replica.to_string()).collect();

		self
	}

	pub fn with_replica_value(
		mut self,
		replica: &str,
		key: &str,
		name: &str,
		value: AttrValue,
	) -> Self {
		self.replica_values
			.entry((replica.to_string(), key.to_string()))
			.or_default()
			.push((name.to_string(), value));

		self
	}

	pub fn with_failing_replica(mut self, replica: &str) -> Self {
		self.failing_replicas.insert(replica.to_string());

		self
	}

	pub fn with_failing_listing(mut self) -> Self {
		self.fail_listing = true;

		self
	}

	pub fn with_failing_search(mut self) -> Self {
		self.fail_search = true;

		self
	}

	pub fn with_failing_policy(mut self) -> Self {
		self.fail_policy = true;

		self
	}

	pub fn with_policy(mut self, policy: DomainPasswordPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Changes an attribute on the shared account, as a later replication would.
	pub fn set_attribute(&self, key: &str, name: &str, value: AttrValue) {
		let mut accounts = self.accounts.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(account) = accounts.iter_mut().find(|account| account.key == key) {
			account.attributes.insert(name.to_string(), value);
		}
	}

	pub fn search_count(&self) -> usize {
		self.searches.load(Ordering::SeqCst)
	}

	pub fn account_read_count(&self) -> usize {
		self.account_reads.load(Ordering::SeqCst)
	}

	pub fn searched_texts(&self) -> Vec<String> {
		self.searched.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn find(&self, identity: &str) -> Option<Candidate> {
		let accounts = self.accounts.lock().unwrap_or_else(|err| err.into_inner());

		accounts
			.iter()
			.find(|account| {
				account.key.eq_ignore_ascii_case(identity)
					|| account
						.text("sAMAccountName")
						.is_some_and(|name| name.eq_ignore_ascii_case(identity))
			})
			.cloned()
	}
}
impl DirectoryClient for FakeDirectory {
	fn search<'a>(
		&'a self,
		filter_attributes: &'a [String],
		text: &'a str,
		properties: &'a [String],
		_replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Candidate>>> {
		self.searches.fetch_add(1, Ordering::SeqCst);
		self.searched.lock().unwrap_or_else(|err| err.into_inner()).push(text.to_string());

		let result = if self.fail_search {
			Err(eyre::eyre!("Directory search timed out."))
		} else {
			let accounts = self.accounts.lock().unwrap_or_else(|err| err.into_inner());

			Ok(accounts
				.iter()
				.filter(|account| {
					filter_attributes.iter().any(|attribute| {
						account.get(attribute).is_some_and(|value| value.contains_text(text))
					})
				})
				.map(|account| project(account.clone(), properties))
				.collect())
		};

		Box::pin(async move { result })
	}

	fn get_account<'a>(
		&'a self,
		identity: &'a str,
		properties: &'a [String],
		replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Option<Candidate>>> {
		self.account_reads.fetch_add(1, Ordering::SeqCst);

		let replica = replica.unwrap_or("default").to_string();
		let result = if self.failing_replicas.contains(&replica) {
			Err(eyre::eyre!("Replica {replica} is unreachable."))
		} else {
			Ok(self.find(identity).map(|mut account| {
				let overrides = self.replica_values.get(&(replica.clone(), account.key.clone()));

				if let Some(values) = overrides {
					for (name, value) in values {
						account.attributes.insert(name.clone(), value.clone());
					}
				}

				project(account, properties)
			}))
		};

		Box::pin(async move { result })
	}

	fn list_replicas(&self) -> BoxFuture<'_, color_eyre::Result<Vec<String>>> {
		let result = if self.fail_listing {
			Err(eyre::eyre!("Domain controller container is unreadable."))
		} else {
			Ok(self.replicas.clone())
		};

		Box::pin(async move { result })
	}

	fn domain_password_policy<'a>(
		&'a self,
		_identity: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<DomainPasswordPolicy>> {
		let result = if self.fail_policy {
			Err(eyre::eyre!("Domain root is unreadable."))
		} else {
			Ok(self.policy)
		};

		Box::pin(async move { result })
	}
}

pub struct FakeSchema {
	allowed: Vec<String>,
	calls: AtomicUsize,
}
impl FakeSchema {
	pub fn new(allowed: Vec<String>) -> Self {
		Self { allowed, calls: AtomicUsize::new(0) }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl SchemaProbe for FakeSchema {
	fn allowed_attributes<'a>(
		&'a self,
		_object_class: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let allowed = self.allowed.clone();

		Box::pin(async move { Ok(allowed) })
	}
}

pub struct FakeValidator {
	status: Option<ValidationStatus>,
	calls: AtomicUsize,
}
impl FakeValidator {
	pub fn accepting() -> Self {
		Self::returning(ValidationStatus::Success)
	}

	pub fn returning(status: ValidationStatus) -> Self {
		Self { status: Some(status), calls: AtomicUsize::new(0) }
	}

	/// Fails every call, like a validator whose transport is down.
	pub fn failing() -> Self {
		Self { status: None, calls: AtomicUsize::new(0) }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl PasswordPolicyValidator for FakeValidator {
	fn validate<'a>(
		&'a self,
		_account_name: &'a str,
		_password: &'a str,
		_policy: &'a DomainPasswordPolicy,
		_replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<ValidationStatus>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let result = self.status.ok_or_else(|| eyre::eyre!("Policy validator is unavailable."));

		Box::pin(async move { result })
	}
}

/// Accepts exactly the configured (account, password) pairs.
#[derive(Default)]
pub struct FakeAuthProbe {
	passwords: HashMap<String, String>,
	fail: bool,
	calls: AtomicUsize,
}
impl FakeAuthProbe {
	pub fn new(passwords: &[(&str, &str)]) -> Self {
		Self {
			passwords: passwords
				.iter()
				.map(|(account, password)| (account.to_ascii_lowercase(), password.to_string()))
				.collect(),
			..Self::default()
		}
	}

	pub fn failing() -> Self {
		Self { fail: true, ..Self::default() }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl AuthProbe for FakeAuthProbe {
	fn try_authenticate<'a>(
		&'a self,
		account_name: &'a str,
		password: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<bool>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let result = if self.fail {
			Err(eyre::eyre!("Connection reset during bind."))
		} else {
			Ok(self
				.passwords
				.get(&account_name.to_ascii_lowercase())
				.is_some_and(|expected| expected == password))
		};

		Box::pin(async move { result })
	}
}

/// Fakes kept behind `Arc` so tests can read their counters after handing them to the service.
pub struct Harness {
	pub service: IdScoutService,
	pub directory: Arc<FakeDirectory>,
	pub schema: Arc<FakeSchema>,
	pub validator: Arc<FakeValidator>,
	pub auth: Arc<FakeAuthProbe>,
}
impl Harness {
	pub fn new(cfg: Config, directory: FakeDirectory) -> Self {
		Self::with_fakes(cfg, directory, FakeValidator::accepting(), FakeAuthProbe::default())
	}

	pub fn with_fakes(
		cfg: Config,
		directory: FakeDirectory,
		validator: FakeValidator,
		auth: FakeAuthProbe,
	) -> Self {
		let schema = Arc::new(FakeSchema::new(cfg.schema.allowed_attributes.clone()));

		Self::assemble(cfg, Arc::new(directory), schema, Arc::new(validator), Arc::new(auth))
	}

	pub fn with_schema(cfg: Config, directory: FakeDirectory, schema: FakeSchema) -> Self {
		Self::assemble(
			cfg,
			Arc::new(directory),
			Arc::new(schema),
			Arc::new(FakeValidator::accepting()),
			Arc::new(FakeAuthProbe::default()),
		)
	}

	fn assemble(
		cfg: Config,
		directory: Arc<FakeDirectory>,
		schema: Arc<FakeSchema>,
		validator: Arc<FakeValidator>,
		auth: Arc<FakeAuthProbe>,
	) -> Self {
		let collaborators = Collaborators::new(
			directory.clone(),
			schema.clone(),
			validator.clone(),
			auth.clone(),
		);

		let service = IdScoutService::new(cfg, collaborators);

		Self { service, directory, schema, validator, auth }
	}
}

pub fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

fn project(mut account: Candidate, properties: &[String]) -> Candidate {
	if !properties.is_empty() {
		account
			.attributes
			.retain(|name, _| properties.iter().any(|wanted| wanted.eq_ignore_ascii_case(name)));
	}

	account
}

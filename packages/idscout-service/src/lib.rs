pub mod aggregate;
pub mod monitor;
pub mod resolve;
pub mod verify;

mod error;

pub use aggregate::{ReplicaAggregate, ReplicaRecord};
pub use error::{Error, Result};
pub use monitor::{LockoutAlert, MonitorReport, MonitorStatus};
pub use resolve::{Resolution, StrategyRun};
pub use verify::{BatchReport, CredentialLine, VerificationOutcome};

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::sync::OnceCell;

use idscout_config::Config;
use idscout_domain::{
	attributes::SearchAttributes,
	candidate::Candidate,
	policy::{DomainPasswordPolicy, ValidationStatus},
};
use idscout_providers::{LdapAuthProbe, LdapDirectory, PolicyRulesValidator, StaticSchema};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait DirectoryClient
where
	Self: Send + Sync,
{
	/// Wildcard OR search of `text` over `filter_attributes`. An empty `properties` list asks for
	/// every attribute.
	fn search<'a>(
		&'a self,
		filter_attributes: &'a [String],
		text: &'a str,
		properties: &'a [String],
		replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Candidate>>>;

	fn get_account<'a>(
		&'a self,
		identity: &'a str,
		properties: &'a [String],
		replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Option<Candidate>>>;

	fn list_replicas(&self) -> BoxFuture<'_, color_eyre::Result<Vec<String>>>;

	fn domain_password_policy<'a>(
		&'a self,
		identity: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<DomainPasswordPolicy>>;
}

pub trait SchemaProbe
where
	Self: Send + Sync,
{
	fn allowed_attributes<'a>(
		&'a self,
		object_class: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>>;
}

pub trait PasswordPolicyValidator
where
	Self: Send + Sync,
{
	fn validate<'a>(
		&'a self,
		account_name: &'a str,
		password: &'a str,
		policy: &'a DomainPasswordPolicy,
		replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<ValidationStatus>>;
}

pub trait AuthProbe
where
	Self: Send + Sync,
{
	/// `Ok(false)` is a clean rejection; transport and protocol failures are errors.
	fn try_authenticate<'a>(
		&'a self,
		account_name: &'a str,
		password: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<bool>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub directory: Arc<dyn DirectoryClient>,
	pub schema: Arc<dyn SchemaProbe>,
	pub validator: Arc<dyn PasswordPolicyValidator>,
	pub auth: Arc<dyn AuthProbe>,
}
impl Collaborators {
	pub fn new(
		directory: Arc<dyn DirectoryClient>,
		schema: Arc<dyn SchemaProbe>,
		validator: Arc<dyn PasswordPolicyValidator>,
		auth: Arc<dyn AuthProbe>,
	) -> Self {
		Self { directory, schema, validator, auth }
	}

	/// LDAP-backed collaborators built from configuration.
	pub fn ldap(cfg: &Config) -> Result<Self> {
		let directory = LdapDirectory::new(&cfg.directory)?;
		let auth = LdapAuthProbe::new(&cfg.directory)?;

		Ok(Self {
			directory: Arc::new(directory),
			schema: Arc::new(StaticSchema::new(cfg.schema.allowed_attributes.clone())),
			validator: Arc::new(PolicyRulesValidator),
			auth: Arc::new(auth),
		})
	}
}

pub struct IdScoutService {
	pub cfg: Config,
	pub collaborators: Collaborators,
	search_attributes: OnceCell<SearchAttributes>,
}
impl IdScoutService {
	pub fn new(cfg: Config, collaborators: Collaborators) -> Self {
		Self { cfg, collaborators, search_attributes: OnceCell::new() }
	}

	/// Search sets pruned against the schema allow-list. The probe runs once, on the first
	/// outermost call.
	pub async fn search_attributes(&self) -> Result<&SearchAttributes> {
		self.search_attributes
			.get_or_try_init(|| async {
				let allowed = self
					.collaborators
					.schema
					.allowed_attributes(&self.cfg.directory.object_class)
					.await
					.map_err(|err| Error::Schema { message: err.to_string() })?;
				let configured = SearchAttributes::from_config(&self.cfg.attributes);
				let (pruned, removed) = configured.pruned(&allowed);

				if !removed.is_empty() {
					tracing::warn!(
						removed = %removed.join(", "),
						"Search attributes missing from the schema were dropped."
					);
				}

				Ok::<_, Error>(pruned)
			})
			.await
	}
}

impl DirectoryClient for LdapDirectory {
	fn search<'a>(
		&'a self,
		filter_attributes: &'a [String],
		text: &'a str,
		properties: &'a [String],
		replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Candidate>>> {
		Box::pin(async move {
			Ok(self.search_entries(filter_attributes, text, properties, replica).await?)
		})
	}

	fn get_account<'a>(
		&'a self,
		identity: &'a str,
		properties: &'a [String],
		replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Option<Candidate>>> {
		Box::pin(async move { Ok(self.fetch_account(identity, properties, replica).await?) })
	}

	fn list_replicas(&self) -> BoxFuture<'_, color_eyre::Result<Vec<String>>> {
		Box::pin(async move { Ok(self.discover_replicas().await?) })
	}

	fn domain_password_policy<'a>(
		&'a self,
		identity: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<DomainPasswordPolicy>> {
		Box::pin(async move { Ok(self.password_policy(identity).await?) })
	}
}

impl SchemaProbe for StaticSchema {
	fn allowed_attributes<'a>(
		&'a self,
		object_class: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>> {
		let allowed = StaticSchema::allowed_attributes(self, object_class);

		Box::pin(async move { Ok(allowed) })
	}
}

impl PasswordPolicyValidator for PolicyRulesValidator {
	fn validate<'a>(
		&'a self,
		account_name: &'a str,
		password: &'a str,
		policy: &'a DomainPasswordPolicy,
		_replica: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<ValidationStatus>> {
		let status = PolicyRulesValidator::validate(self, account_name, password, policy);

		Box::pin(async move { Ok(status) })
	}
}

impl AuthProbe for LdapAuthProbe {
	fn try_authenticate<'a>(
		&'a self,
		account_name: &'a str,
		password: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<bool>> {
		Box::pin(async move {
			Ok(LdapAuthProbe::try_authenticate(self, account_name, password).await?)
		})
	}
}

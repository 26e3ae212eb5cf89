use std::{collections::HashMap, time::Duration};

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};

use crate::{Error, Result};
use idscout_config::Directory;
use idscout_domain::{
	account,
	candidate::{AttrValue, Candidate},
	filetime,
	policy::DomainPasswordPolicy,
};

const NO_SUCH_OBJECT: u32 = 32;

const UF_ACCOUNTDISABLE: i64 = 0x2;
const UF_LOCKOUT: i64 = 0x10;
const UF_PASSWORD_EXPIRED: i64 = 0x80_0000;
const DOMAIN_PASSWORD_COMPLEX: i64 = 0x1;

const USER_ACCOUNT_CONTROL: &str = "userAccountControl";
const USER_ACCOUNT_CONTROL_COMPUTED: &str = "msDS-User-Account-Control-Computed";
const ACCOUNT_EXPIRES: &str = "accountExpires";
const BAD_PASSWORD_TIME: &str = "badPasswordTime";

const FILETIME_ATTRIBUTES: [&str; 6] = [
	ACCOUNT_EXPIRES,
	BAD_PASSWORD_TIME,
	"lastLogon",
	"lastLogonTimestamp",
	"lockoutTime",
	"pwdLastSet",
];
const INTEGER_ATTRIBUTES: [&str; 4] =
	[USER_ACCOUNT_CONTROL, USER_ACCOUNT_CONTROL_COMPUTED, "badPwdCount", "logonCount"];

/// Read-only Active Directory access. Every call opens its own connection to the requested
/// replica, or to the configured URL when no replica is named.
pub struct LdapDirectory {
	cfg: Directory,
}
impl LdapDirectory {
	pub fn new(cfg: &Directory) -> Result<Self> {
		if !cfg.url.starts_with("ldap://") && !cfg.url.starts_with("ldaps://") {
			return Err(Error::InvalidConfig {
				message: format!("Unsupported directory URL: {}.", cfg.url),
			});
		}

		Ok(Self { cfg: cfg.clone() })
	}

	/// Wildcard OR search over `filter_attributes`, restricted to the configured object class.
	pub async fn search_entries(
		&self,
		filter_attributes: &[String],
		text: &str,
		properties: &[String],
		replica: Option<&str>,
	) -> Result<Vec<Candidate>> {
		let filter = wildcard_filter(&self.cfg.object_class, filter_attributes, text);
		let mut ldap = self.bind(replica).await?;
		let (entries, _) = ldap
			.search(&self.cfg.base_dn, Scope::Subtree, &filter, raw_attributes(properties))
			.await?
			.success()?;
		let candidates = entries
			.into_iter()
			.map(|entry| decode_entry(SearchEntry::construct(entry), properties))
			.collect::<Vec<_>>();

		tracing::debug!(
			replica = replica.unwrap_or("default"),
			hits = candidates.len(),
			"LDAP search finished."
		);

		close(ldap).await;

		Ok(candidates)
	}

	/// Looks up one account by distinguished name or account name.
	pub async fn fetch_account(
		&self,
		identity: &str,
		properties: &[String],
		replica: Option<&str>,
	) -> Result<Option<Candidate>> {
		let mut ldap = self.bind(replica).await?;
		let attrs = raw_attributes(properties);
		let result = if is_distinguished_name(identity) {
			ldap.search(identity, Scope::Base, "(objectClass=*)", attrs).await?
		} else {
			let filter = format!(
				"(&(objectClass={})(sAMAccountName={}))",
				self.cfg.object_class,
				escape_filter_value(identity)
			);

			ldap.search(&self.cfg.base_dn, Scope::Subtree, &filter, attrs).await?
		};
		let entries = match result.success() {
			Ok((entries, _)) => entries,
			Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => Vec::new(),
			Err(err) => return Err(err.into()),
		};

		close(ldap).await;

		Ok(entries
			.into_iter()
			.next()
			.map(|entry| decode_entry(SearchEntry::construct(entry), properties)))
	}

	/// Configured replicas, or the host names registered under the Domain Controllers container.
	pub async fn discover_replicas(&self) -> Result<Vec<String>> {
		if !self.cfg.replicas.is_empty() {
			return Ok(self.cfg.replicas.clone());
		}

		let base = format!("OU=Domain Controllers,{}", self.cfg.base_dn);
		let mut ldap = self.bind(None).await?;
		let (entries, _) = ldap
			.search(&base, Scope::Subtree, "(objectClass=computer)", vec!["dNSHostName"])
			.await?
			.success()?;
		let mut hosts: Vec<String> = entries
			.into_iter()
			.filter_map(|entry| {
				SearchEntry::construct(entry)
					.attrs
					.get("dNSHostName")
					.and_then(|values| values.first().cloned())
			})
			.collect();

		hosts.sort();
		hosts.dedup();

		close(ldap).await;

		tracing::info!(replicas = hosts.len(), "Discovered directory replicas.");

		Ok(hosts)
	}

	/// Domain policy from the naming context root. When `identity` has a resultant fine-grained
	/// password settings object, its values take precedence.
	pub async fn password_policy(&self, identity: Option<&str>) -> Result<DomainPasswordPolicy> {
		let mut ldap = self.bind(None).await?;
		let (entries, _) = ldap
			.search(
				&self.cfg.base_dn,
				Scope::Base,
				"(objectClass=*)",
				vec!["minPwdLength", "pwdProperties", "lockOutObservationWindow"],
			)
			.await?
			.success()?;
		let Some(root) = entries.into_iter().next().map(SearchEntry::construct) else {
			close(ldap).await;

			return Err(Error::InvalidResponse {
				message: format!("Naming context {} returned no entry.", self.cfg.base_dn),
			});
		};
		let mut policy = domain_policy_from(&root.attrs)?;

		if let Some(identity) = identity {
			let filter = format!(
				"(&(objectClass={})(sAMAccountName={}))",
				self.cfg.object_class,
				escape_filter_value(identity)
			);
			let (entries, _) = ldap
				.search(&self.cfg.base_dn, Scope::Subtree, &filter, vec!["msDS-ResultantPSO"])
				.await?
				.success()?;
			let pso = entries.into_iter().next().and_then(|entry| {
				SearchEntry::construct(entry)
					.attrs
					.get("msDS-ResultantPSO")
					.and_then(|values| values.first().cloned())
			});

			if let Some(pso) = pso {
				let (entries, _) = ldap
					.search(
						&pso,
						Scope::Base,
						"(objectClass=*)",
						vec![
							"msDS-MinimumPasswordLength",
							"msDS-PasswordComplexityEnabled",
							"msDS-LockoutObservationWindow",
						],
					)
					.await?
					.success()?;

				if let Some(entry) = entries.into_iter().next().map(SearchEntry::construct) {
					apply_fine_grained(&mut policy, &entry.attrs);
				}
			}
		}

		close(ldap).await;

		Ok(policy)
	}

	async fn bind(&self, replica: Option<&str>) -> Result<Ldap> {
		let url = match replica {
			Some(host) => replica_url(&self.cfg, host),
			None => self.cfg.url.clone(),
		};
		let mut ldap = connect(&self.cfg, &url).await?;

		ldap.simple_bind(&self.cfg.bind_dn, self.cfg.bind_password.as_deref().unwrap_or(""))
			.await?
			.success()?;

		Ok(ldap)
	}
}

/// Opens a connection and spawns its driver. The caller binds.
pub(crate) async fn connect(cfg: &Directory, url: &str) -> Result<Ldap> {
	let settings = LdapConnSettings::new()
		.set_conn_timeout(Duration::from_millis(cfg.connect_timeout_ms))
		.set_starttls(cfg.use_starttls);
	let (conn, ldap) = LdapConnAsync::with_settings(settings, url).await?;

	tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			tracing::warn!(error = %err, "LDAP connection driver failed.");
		}
	});

	Ok(ldap)
}

pub(crate) async fn close(mut ldap: Ldap) {
	if let Err(err) = ldap.unbind().await {
		tracing::debug!(error = %err, "LDAP unbind failed.");
	}
}

pub(crate) fn replica_url(cfg: &Directory, host: &str) -> String {
	if host.contains("://") {
		return host.to_string();
	}

	let scheme = if cfg.use_ssl { "ldaps" } else { "ldap" };

	format!("{scheme}://{host}:{}", cfg.replica_port)
}

/// RFC 4515 filter value escaping.
pub fn escape_filter_value(value: &str) -> String {
	value
		.replace('\\', "\\5c")
		.replace('*', "\\2a")
		.replace('(', "\\28")
		.replace(')', "\\29")
		.replace('\0', "\\00")
}

pub fn wildcard_filter(object_class: &str, attributes: &[String], text: &str) -> String {
	let value = escape_filter_value(text.trim());
	let clauses: String =
		attributes.iter().map(|attribute| format!("({attribute}=*{value}*)")).collect();

	format!("(&(objectClass={object_class})(|{clauses}))")
}

fn is_distinguished_name(identity: &str) -> bool {
	identity.contains('=') && identity.contains(',')
}

/// LDAP attributes to request for `properties`. Computed account properties are replaced by the
/// raw attributes they are derived from; an empty list asks for everything.
fn raw_attributes(properties: &[String]) -> Vec<String> {
	if properties.is_empty() {
		return vec!["*".to_string(), USER_ACCOUNT_CONTROL_COMPUTED.to_string()];
	}

	let mut out: Vec<String> = Vec::new();

	for property in properties {
		let source = match property.as_str() {
			account::ENABLED => USER_ACCOUNT_CONTROL,
			account::LOCKED_OUT | account::PASSWORD_EXPIRED => USER_ACCOUNT_CONTROL_COMPUTED,
			account::ACCOUNT_EXPIRATION => ACCOUNT_EXPIRES,
			account::LAST_BAD_PASSWORD => BAD_PASSWORD_TIME,
			other => other,
		};

		if !out.iter().any(|name| name.eq_ignore_ascii_case(source)) {
			out.push(source.to_string());
		}
	}

	out
}

/// Decodes raw entry values and derives the computed account properties.
pub fn decode_entry(entry: SearchEntry, properties: &[String]) -> Candidate {
	let mut candidate = Candidate::new(entry.dn);

	for (name, values) in entry.attrs {
		if let Some(value) = decode_values(&name, values) {
			candidate.attributes.insert(name, value);
		}
	}

	let uac = candidate.get(USER_ACCOUNT_CONTROL).and_then(AttrValue::as_i64);
	let computed = candidate.get(USER_ACCOUNT_CONTROL_COMPUTED).and_then(AttrValue::as_i64);
	let expires = candidate.get(ACCOUNT_EXPIRES).and_then(AttrValue::as_time);
	let bad_password = candidate.get(BAD_PASSWORD_TIME).and_then(AttrValue::as_time);
	let wants =
		|name: &str| properties.is_empty() || properties.iter().any(|wanted| wanted == name);

	if let Some(uac) = uac.filter(|_| wants(account::ENABLED)) {
		candidate
			.attributes
			.insert(account::ENABLED.to_string(), AttrValue::Bool(uac & UF_ACCOUNTDISABLE == 0));
	}
	if let Some(computed) = computed {
		if wants(account::LOCKED_OUT) {
			let locked = computed & UF_LOCKOUT != 0;

			candidate.attributes.insert(account::LOCKED_OUT.to_string(), AttrValue::Bool(locked));
		}
		if wants(account::PASSWORD_EXPIRED) {
			candidate.attributes.insert(
				account::PASSWORD_EXPIRED.to_string(),
				AttrValue::Bool(computed & UF_PASSWORD_EXPIRED != 0),
			);
		}
	}
	if let Some(expires) = expires.filter(|_| wants(account::ACCOUNT_EXPIRATION)) {
		candidate
			.attributes
			.insert(account::ACCOUNT_EXPIRATION.to_string(), AttrValue::Time(expires));
	}
	if let Some(at) = bad_password.filter(|_| wants(account::LAST_BAD_PASSWORD)) {
		candidate.attributes.insert(account::LAST_BAD_PASSWORD.to_string(), AttrValue::Time(at));
	}

	candidate
}

fn decode_values(name: &str, mut values: Vec<String>) -> Option<AttrValue> {
	if values.is_empty() {
		return None;
	}
	if FILETIME_ATTRIBUTES.iter().any(|attr| attr.eq_ignore_ascii_case(name)) {
		return filetime::parse(&values[0]).map(AttrValue::Time);
	}
	if INTEGER_ATTRIBUTES.iter().any(|attr| attr.eq_ignore_ascii_case(name))
		&& let Ok(number) = values[0].trim().parse::<i64>()
	{
		return Some(AttrValue::Integer(number));
	}
	if values.len() == 1 {
		return values.pop().map(AttrValue::Text);
	}

	Some(AttrValue::List(values))
}

fn domain_policy_from(attrs: &HashMap<String, Vec<String>>) -> Result<DomainPasswordPolicy> {
	let min_length = first_value(attrs, "minPwdLength")
		.and_then(|raw| raw.parse::<u32>().ok())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Domain root is missing minPwdLength.".to_string(),
		})?;
	let complexity_enabled = first_value(attrs, "pwdProperties")
		.and_then(|raw| raw.parse::<i64>().ok())
		.is_some_and(|flags| flags & DOMAIN_PASSWORD_COMPLEX != 0);
	let lockout_observation_window = first_value(attrs, "lockOutObservationWindow")
		.and_then(filetime::parse_interval)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Domain root is missing lockOutObservationWindow.".to_string(),
		})?;

	Ok(DomainPasswordPolicy { min_length, complexity_enabled, lockout_observation_window })
}

fn apply_fine_grained(policy: &mut DomainPasswordPolicy, attrs: &HashMap<String, Vec<String>>) {
	if let Some(min_length) =
		first_value(attrs, "msDS-MinimumPasswordLength").and_then(|raw| raw.parse::<u32>().ok())
	{
		policy.min_length = min_length;
	}
	if let Some(raw) = first_value(attrs, "msDS-PasswordComplexityEnabled") {
		policy.complexity_enabled = raw.eq_ignore_ascii_case("TRUE");
	}
	if let Some(window) =
		first_value(attrs, "msDS-LockoutObservationWindow").and_then(filetime::parse_interval)
	{
		policy.lockout_observation_window = window;
	}
}

fn first_value<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
	attrs
		.iter()
		.find(|(key, _)| key.eq_ignore_ascii_case(name))
		.and_then(|(_, values)| values.first())
		.map(String::as_str)
}

#[cfg(test)]
mod tests {
	use time::{Duration, macros::datetime};

	use super::*;

	fn entry(attrs: &[(&str, &[&str])]) -> SearchEntry {
		SearchEntry {
			dn: "CN=Ann Lee,OU=Staff,DC=corp,DC=example".to_string(),
			attrs: attrs
				.iter()
				.map(|(name, values)| {
					(name.to_string(), values.iter().map(|value| value.to_string()).collect())
				})
				.collect(),
			bin_attrs: HashMap::new(),
		}
	}

	fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn filter_escapes_special_characters() {
		let filter = wildcard_filter("user", &strings(&["mail", "cn"]), "a*(b)\\");

		assert_eq!(
			filter,
			"(&(objectClass=user)(|(mail=*a\\2a\\28b\\29\\5c*)(cn=*a\\2a\\28b\\29\\5c*)))"
		);
	}

	#[test]
	fn computed_properties_map_to_raw_sources() {
		let raw = raw_attributes(&account::verification_properties());

		assert_eq!(
			raw,
			strings(&[
				"sAMAccountName",
				"displayName",
				ACCOUNT_EXPIRES,
				USER_ACCOUNT_CONTROL,
				USER_ACCOUNT_CONTROL_COMPUTED,
				BAD_PASSWORD_TIME,
			])
		);
	}

	#[test]
	fn account_flags_are_decoded() {
		let candidate = decode_entry(
			entry(&[
				("sAMAccountName", &["alee"]),
				("userAccountControl", &["514"]),
				("msDS-User-Account-Control-Computed", &["16"]),
				("accountExpires", &["9223372036854775807"]),
				("badPasswordTime", &["133537698000000000"]),
				("proxyAddresses", &["SMTP:ann@corp.example", "smtp:alee@corp.example"]),
			]),
			&[],
		);

		assert_eq!(candidate.get(account::ENABLED), Some(&AttrValue::Bool(false)));
		assert_eq!(candidate.get(account::LOCKED_OUT), Some(&AttrValue::Bool(true)));
		assert_eq!(candidate.get(account::PASSWORD_EXPIRED), Some(&AttrValue::Bool(false)));
		assert_eq!(candidate.get(account::ACCOUNT_EXPIRATION), None);
		assert_eq!(
			candidate.get(account::LAST_BAD_PASSWORD),
			Some(&AttrValue::Time(datetime!(2024-03-01 12:30:00 UTC)))
		);
		assert!(matches!(
			candidate.get("proxyAddresses"),
			Some(AttrValue::List(values)) if values.len() == 2
		));
	}

	#[test]
	fn domain_policy_reads_root_attributes() {
		let attrs: HashMap<String, Vec<String>> = [
			("minPwdLength".to_string(), vec!["8".to_string()]),
			("pwdProperties".to_string(), vec!["1".to_string()]),
			("lockOutObservationWindow".to_string(), vec!["-18000000000".to_string()]),
		]
		.into_iter()
		.collect();
		let policy = domain_policy_from(&attrs).expect("policy should decode");

		assert_eq!(policy.min_length, 8);
		assert!(policy.complexity_enabled);
		assert_eq!(policy.lockout_observation_window, Duration::minutes(30));
	}

	#[test]
	fn replica_hosts_get_scheme_and_port() {
		let cfg = Directory {
			url: "ldaps://dc01.corp.example".to_string(),
			base_dn: "DC=corp,DC=example".to_string(),
			bind_dn: "CN=svc,DC=corp,DC=example".to_string(),
			bind_password: None,
			replicas: Vec::new(),
			object_class: "user".to_string(),
			connect_timeout_ms: 5_000,
			use_starttls: false,
			use_ssl: true,
			replica_port: 636,
		};

		assert_eq!(replica_url(&cfg, "dc02.corp.example"), "ldaps://dc02.corp.example:636");
		assert_eq!(replica_url(&cfg, "ldap://dc03:389"), "ldap://dc03:389");
	}
}

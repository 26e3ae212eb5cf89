use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub directory: Directory,
	pub schema: Schema,
	#[serde(default)]
	pub attributes: Attributes,
	#[serde(default)]
	pub resolver: Resolver,
	#[serde(default)]
	pub verifier: Verifier,
	#[serde(default)]
	pub monitor: Monitor,
	#[serde(default)]
	pub output: Output,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Directory {
	/// LDAP URL of the default replica, e.g. "ldaps://dc01.corp.example:636".
	pub url: String,
	pub base_dn: String,
	pub bind_dn: String,
	pub bind_password: Option<String>,
	/// Replica host names. Empty means discover them from the Domain Controllers container.
	#[serde(default)]
	pub replicas: Vec<String>,
	#[serde(default = "default_object_class")]
	pub object_class: String,
	#[serde(default = "default_connect_timeout_ms")]
	pub connect_timeout_ms: u64,
	#[serde(default)]
	pub use_starttls: bool,
	#[serde(default = "default_use_ssl")]
	pub use_ssl: bool,
	#[serde(default = "default_replica_port")]
	pub replica_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Schema {
	/// Attributes that exist in the target schema. Search sets are pruned against this list.
	pub allowed_attributes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Attributes {
	pub basic: Vec<String>,
	pub freetext: Vec<String>,
	pub email: Vec<String>,
	pub number: Vec<String>,
	pub name: Vec<String>,
}
impl Default for Attributes {
	fn default() -> Self {
		Self {
			basic: strings(&["sAMAccountName", "mail", "displayName"]),
			freetext: strings(&[
				"sAMAccountName",
				"userPrincipalName",
				"displayName",
				"name",
				"cn",
				"givenName",
				"sn",
				"mail",
				"proxyAddresses",
				"description",
				"title",
			]),
			email: strings(&["mail", "userPrincipalName", "proxyAddresses", "targetAddress"]),
			number: strings(&[
				"employeeID",
				"employeeNumber",
				"telephoneNumber",
				"mobile",
				"ipPhone",
				"homePhone",
				"otherTelephone",
			]),
			name: strings(&["displayName", "name", "cn", "givenName", "sn"]),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Resolver {
	pub max_depth: u32,
	pub min_token_length: u32,
	pub allow_substrings: bool,
	pub thorough: bool,
	pub name_suffixes: Vec<String>,
}
impl Default for Resolver {
	fn default() -> Self {
		Self {
			max_depth: 5,
			min_token_length: 3,
			allow_substrings: false,
			thorough: false,
			name_suffixes: strings(&["Jr.", "Jr", "Sr.", "Sr", "II", "III", "IV", "V"]),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Verifier {
	/// More candidates than this are treated as false positives and never tested.
	pub max_hits: u32,
	/// Splits `identifier<delimiter>password` input lines.
	pub delimiter: String,
}
impl Default for Verifier {
	fn default() -> Self {
		Self { max_hits: 5, delimiter: ":".to_string() }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Monitor {
	pub poll_interval_secs: u64,
}
impl Default for Monitor {
	fn default() -> Self {
		Self { poll_interval_secs: 60 }
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Output {
	pub path: Option<std::path::PathBuf>,
}

fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

fn default_object_class() -> String {
	"user".to_string()
}

fn default_connect_timeout_ms() -> u64 {
	5_000
}

fn default_use_ssl() -> bool {
	true
}

fn default_replica_port() -> u16 {
	636
}

use crate::{Error, Result, ldap};
use idscout_config::Directory;

const INVALID_CREDENTIALS: u32 = 49;

/// Tests a clear password with a simple bind as the account itself.
pub struct LdapAuthProbe {
	cfg: Directory,
	realm: String,
}
impl LdapAuthProbe {
	pub fn new(cfg: &Directory) -> Result<Self> {
		let realm = realm_from_base_dn(&cfg.base_dn).ok_or_else(|| Error::InvalidConfig {
			message: format!("Cannot derive a DNS domain from base DN {}.", cfg.base_dn),
		})?;

		Ok(Self { cfg: cfg.clone(), realm })
	}

	/// `Ok(false)` only for a clean credential rejection. Anything else is an error.
	pub async fn try_authenticate(&self, account_name: &str, password: &str) -> Result<bool> {
		if password.is_empty() {
			// An empty simple bind is an anonymous bind and always succeeds.
			return Err(Error::InvalidConfig {
				message: "Refusing to bind with an empty password.".to_string(),
			});
		}

		let principal = self.principal(account_name);
		let mut conn = ldap::connect(&self.cfg, &self.cfg.url).await?;
		let result = conn.simple_bind(&principal, password).await?;

		ldap::close(conn).await;

		match result.rc {
			0 => Ok(true),
			INVALID_CREDENTIALS => Ok(false),
			rc => Err(Error::InvalidResponse {
				message: format!("Bind for {account_name} returned code {rc}: {}.", result.text),
			}),
		}
	}

	fn principal(&self, account_name: &str) -> String {
		if account_name.contains('@') || account_name.contains('\\') {
			return account_name.to_string();
		}

		format!("{account_name}@{}", self.realm)
	}
}

/// "DC=corp,DC=example" becomes "corp.example".
fn realm_from_base_dn(base_dn: &str) -> Option<String> {
	let labels: Vec<&str> = base_dn
		.split(',')
		.filter_map(|rdn| {
			let (kind, value) = rdn.trim().split_once('=')?;

			kind.trim().eq_ignore_ascii_case("DC").then_some(value.trim())
		})
		.collect();

	if labels.is_empty() {
		return None;
	}

	Some(labels.join("."))
}

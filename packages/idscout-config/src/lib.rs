mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Attributes, Config, Directory, Monitor, Output, Resolver, Schema, Service, Verifier,
};

use std::{collections::HashSet, fs, path::Path};

const MAX_RECURSION_DEPTH: u32 = 16;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	for (label, value) in [
		("directory.url", &cfg.directory.url),
		("directory.base_dn", &cfg.directory.base_dn),
		("directory.bind_dn", &cfg.directory.bind_dn),
		("directory.object_class", &cfg.directory.object_class),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if !cfg.directory.url.starts_with("ldap://") && !cfg.directory.url.starts_with("ldaps://") {
		return Err(Error::Validation {
			message: "directory.url must start with ldap:// or ldaps://.".to_string(),
		});
	}
	if cfg.directory.connect_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "directory.connect_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.directory.replicas.iter().any(|replica| replica.trim().is_empty()) {
		return Err(Error::Validation {
			message: "directory.replicas must not contain empty host names.".to_string(),
		});
	}
	if cfg.schema.allowed_attributes.is_empty() {
		return Err(Error::Validation {
			message: "schema.allowed_attributes must be non-empty.".to_string(),
		});
	}
	if cfg.attributes.basic.is_empty() {
		return Err(Error::Validation {
			message: "attributes.basic must be non-empty.".to_string(),
		});
	}
	if cfg.attributes.basic.len() > 3 {
		return Err(Error::Validation {
			message: "attributes.basic must list at most three attributes.".to_string(),
		});
	}
	if cfg.resolver.max_depth == 0 {
		return Err(Error::Validation {
			message: "resolver.max_depth must be greater than zero.".to_string(),
		});
	}
	if cfg.resolver.max_depth > MAX_RECURSION_DEPTH {
		return Err(Error::Validation {
			message: format!("resolver.max_depth must be {MAX_RECURSION_DEPTH} or less."),
		});
	}
	if cfg.resolver.min_token_length == 0 {
		return Err(Error::Validation {
			message: "resolver.min_token_length must be greater than zero.".to_string(),
		});
	}
	if cfg.verifier.max_hits == 0 {
		return Err(Error::Validation {
			message: "verifier.max_hits must be greater than zero.".to_string(),
		});
	}
	if cfg.verifier.delimiter.is_empty() {
		return Err(Error::Validation {
			message: "verifier.delimiter must be non-empty.".to_string(),
		});
	}
	if cfg.monitor.poll_interval_secs == 0 {
		return Err(Error::Validation {
			message: "monitor.poll_interval_secs must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.directory.bind_password.as_deref().map(|value| value.trim().is_empty()).unwrap_or(false)
	{
		cfg.directory.bind_password = None;
	}
	if cfg
		.output
		.path
		.as_deref()
		.map(|path| path.as_os_str().to_string_lossy().trim().is_empty())
		.unwrap_or(false)
	{
		cfg.output.path = None;
	}

	cfg.directory.replicas = dedup_trimmed(&cfg.directory.replicas);
	cfg.schema.allowed_attributes = dedup_trimmed(&cfg.schema.allowed_attributes);

	for list in [
		&mut cfg.attributes.basic,
		&mut cfg.attributes.freetext,
		&mut cfg.attributes.email,
		&mut cfg.attributes.number,
		&mut cfg.attributes.name,
	] {
		*list = dedup_trimmed(list);
	}
}

/// Trims entries, drops blanks, and keeps the first occurrence of each case-insensitive name.
fn dedup_trimmed(values: &[String]) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::with_capacity(values.len());

	for value in values {
		let trimmed = value.trim();

		if trimmed.is_empty() {
			continue;
		}
		if seen.insert(trimmed.to_ascii_lowercase()) {
			out.push(trimmed.to_string());
		}
	}

	out
}

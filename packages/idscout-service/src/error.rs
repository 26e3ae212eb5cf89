pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures that stop work before it starts. Operational collaborator failures are reported as
/// notes and warnings instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Schema error: {message}")]
	Schema { message: String },
	#[error("Directory error: {message}")]
	Directory { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
}
impl From<idscout_providers::Error> for Error {
	fn from(err: idscout_providers::Error) -> Self {
		match err {
			idscout_providers::Error::InvalidConfig { message } => Self::Configuration { message },
			other => Self::Directory { message: other.to_string() },
		}
	}
}

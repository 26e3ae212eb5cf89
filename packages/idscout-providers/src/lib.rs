pub mod auth;
pub mod ldap;
pub mod policy;
pub mod schema;

mod error;

pub use auth::LdapAuthProbe;
pub use error::{Error, Result};
pub use ldap::LdapDirectory;
pub use policy::PolicyRulesValidator;
pub use schema::StaticSchema;

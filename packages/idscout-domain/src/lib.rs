pub mod account;
pub mod aggregate;
pub mod attributes;
pub mod candidate;
pub mod filetime;
pub mod permutation;
pub mod planner;
pub mod policy;
pub mod query;
pub mod time_serde;
pub mod tokenize;

//! Policy Resolver (C5): the group-based policy data model and the derived
//! views computed over it.

pub mod resolver;
pub mod types;

pub use resolver::{ExpandedRule, PolicyResolver, PolicyUpdate, ResolveError};

pub mod cache;
pub mod cache_key;
pub mod client;
pub mod context;
pub mod enforcer;
pub mod factory;
pub mod service;
pub mod users;
pub mod verification;

#[cfg(test)]
pub mod testing;

pub use enforcer::{Decision, DenyReason, Grant};
pub use factory::build_authz_service;
pub use service::{AuthorizeError, AuthzService, IncomingRequest};

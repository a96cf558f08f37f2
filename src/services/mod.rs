pub mod authz;
pub mod cache;

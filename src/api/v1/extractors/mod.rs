pub mod authz_ctx;

pub use authz_ctx::{AuthzCtx, AuthzCtxExtractor};

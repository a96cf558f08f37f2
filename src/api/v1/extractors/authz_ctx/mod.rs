/*!
 * Authorized request context extractor
 *
 * Public API:
 * - AuthzCtx
 * - AuthzCtxExtractor
 */

mod core;
mod types;

pub use core::AuthzCtxExtractor;
pub use types::AuthzCtx;

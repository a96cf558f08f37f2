/*
 * Responsibility
 * - Public surface of v1 (routes() re-export, extractors)
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;

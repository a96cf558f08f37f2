/*
 * Responsibility
 * - Public interface of the middleware layer
 */
pub mod auth;
pub mod bearer_auth;
pub mod http;

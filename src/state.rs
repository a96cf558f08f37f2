/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 * - Cheap to clone (Arc inside)
 */
use std::sync::Arc;

use crate::services::authz::AuthzService;

#[derive(Clone)]
pub struct AppState {
    pub authz: Arc<AuthzService>,
}

impl AppState {
    pub fn new(authz: Arc<AuthzService>) -> Self {
        Self { authz }
    }
}

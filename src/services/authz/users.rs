//! `UserDirectory` backed by the local PostgreSQL users table.
use async_trait::async_trait;
use sqlx::PgPool;

use crate::repos::{error::RepoError, user_repo};
use crate::services::authz::enforcer::UserDirectory;

#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn exists(&self, user_id: i64) -> Result<bool, RepoError> {
        user_repo::exists(&self.db, user_id).await
    }
}

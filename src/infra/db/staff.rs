use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, StaffTokensRepo},
    domain::entities::StaffTokenRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct StaffTokenRow {
    id: Uuid,
    name: String,
    prefix: String,
    hashed_secret: Vec<u8>,
    revoked_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

#[async_trait]
impl StaffTokensRepo for PostgresRepositories {
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<StaffTokenRecord>, RepoError> {
        let row = sqlx::query_as::<_, StaffTokenRow>(
            r#"
            SELECT id, name, prefix, hashed_secret, revoked_at, created_at
            FROM staff_tokens
            WHERE prefix = $1
            "#,
        )
        .bind(prefix)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| StaffTokenRecord {
            id: row.id,
            name: row.name,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
        }))
    }

    async fn create_token(&self, record: &StaffTokenRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO staff_tokens (id, name, prefix, hashed_secret, revoked_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.prefix)
        .bind(&record.hashed_secret)
        .bind(record.revoked_at)
        .bind(record.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

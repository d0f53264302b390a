use async_trait::async_trait;

use crate::{
    application::repos::{ContentTypesRepo, RepoError},
    domain::entities::ContentTypeRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ContentTypeRow {
    id: i64,
    full_name: String,
    model_name: String,
    short_name: String,
}

#[async_trait]
impl ContentTypesRepo for PostgresRepositories {
    async fn find_by_short_name(
        &self,
        code: &str,
    ) -> Result<Option<ContentTypeRecord>, RepoError> {
        let row = sqlx::query_as::<_, ContentTypeRow>(
            r#"
            SELECT id, full_name, model_name, short_name
            FROM content_types
            WHERE LOWER(short_name) = LOWER($1)
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| ContentTypeRecord {
            id: row.id,
            full_name: row.full_name,
            model_name: row.model_name,
            short_name: row.short_name,
        }))
    }
}

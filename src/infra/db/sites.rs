use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, SitesRepo},
    domain::entities::SiteRecord,
    domain::types::SiteId,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SiteRow {
    id: SiteId,
    domain: String,
    name: String,
}

#[async_trait]
impl SitesRepo for PostgresRepositories {
    async fn list_sites(&self) -> Result<Vec<SiteRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SiteRow>("SELECT id, domain, name FROM sites ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| SiteRecord {
                id: row.id,
                domain: row.domain,
                name: row.name,
            })
            .collect())
    }
}

use async_trait::async_trait;

use crate::{
    application::repos::{CategoriesRepo, CreateCategoryParams, RepoError},
    domain::categories::depth_of,
    domain::entities::CategoryRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    slug: String,
    path: String,
    depth: i32,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            path: row.path,
            depth: row.depth,
        }
    }
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn find_category(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, path, depth FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, path, depth FROM categories WHERE id = ANY($1) ORDER BY path",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn list_by_paths(&self, paths: &[String]) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug, path, depth FROM categories WHERE path = ANY($1) ORDER BY path",
        )
        .bind(paths)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn last_child_path(&self, parent: Option<&str>) -> Result<Option<String>, RepoError> {
        let parent_path = parent.unwrap_or("");
        let child_depth = depth_of(parent_path) + 1;

        sqlx::query_scalar::<_, String>(
            r#"
            SELECT path
            FROM categories
            WHERE depth = $1 AND path LIKE $2 || '%'
            ORDER BY path DESC
            LIMIT 1
            "#,
        )
        .bind(child_depth)
        .bind(parent_path)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (name, slug, path, depth)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, slug, path, depth
            "#,
        )
        .bind(&params.name)
        .bind(&params.slug)
        .bind(&params.path)
        .bind(params.depth)
        .fetch_one(self.pool())
        .await
        .map(CategoryRecord::from)
        .map_err(map_sqlx_error)
    }
}

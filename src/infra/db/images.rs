use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{ImagesRepo, RepoError},
    domain::entities::ImageRecord,
    domain::images::ValidatedImage,
    domain::types::CropDirection,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: i64,
    title: String,
    slug: String,
    file_path: String,
    crop_direction: CropDirection,
    created_at: OffsetDateTime,
}

impl From<ImageRow> for ImageRecord {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            file_path: row.file_path,
            crop_direction: row.crop_direction,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ImagesRepo for PostgresRepositories {
    async fn find_image(&self, id: i64) -> Result<Option<ImageRecord>, RepoError> {
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, title, slug, file_path, crop_direction, created_at
            FROM images
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ImageRecord::from))
    }

    async fn create_image(&self, image: &ValidatedImage) -> Result<ImageRecord, RepoError> {
        sqlx::query_as::<_, ImageRow>(
            r#"
            INSERT INTO images (title, slug, file_path, crop_direction)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, slug, file_path, crop_direction, created_at
            "#,
        )
        .bind(&image.title)
        .bind(&image.slug)
        .bind(&image.file_path)
        .bind(image.crop_direction)
        .fetch_one(self.pool())
        .await
        .map(ImageRecord::from)
        .map_err(map_sqlx_error)
    }

    async fn update_image(&self, id: i64, image: &ValidatedImage) -> Result<ImageRecord, RepoError> {
        sqlx::query_as::<_, ImageRow>(
            r#"
            UPDATE images
            SET title = $2, slug = $3, file_path = $4, crop_direction = $5
            WHERE id = $1
            RETURNING id, title, slug, file_path, crop_direction, created_at
            "#,
        )
        .bind(id)
        .bind(&image.title)
        .bind(&image.slug)
        .bind(&image.file_path)
        .bind(image.crop_direction)
        .fetch_one(self.pool())
        .await
        .map(ImageRecord::from)
        .map_err(map_sqlx_error)
    }

    async fn delete_image(&self, id: i64) -> Result<(), RepoError> {
        let deleted = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if deleted.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

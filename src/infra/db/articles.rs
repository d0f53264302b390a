use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;

use crate::{
    application::repos::{ArticleVisibility, ArticlesRepo, ArticlesWriteRepo, RepoError},
    domain::articles::ValidatedArticle,
    domain::entities::ArticleRecord,
    domain::types::{ArticleType, ContentStatus, SiteId},
};

use super::{PostgresRepositories, map_sqlx_error};

const ARTICLE_COLUMNS: &str = r#"
    a.id, a.title, a.slug, a.status, a.allow_comments, a.display_comments, a.featured,
    a.created_at, a.publish_at, a.updated_at, a.expires_at,
    a.byline, a.credit_line, a.summary, a.body, a.footer, a.dateline,
    a.article_type, a.external_url, a.primary_site_id,
    ARRAY(SELECT s.site_id FROM article_sites s WHERE s.article_id = a.id ORDER BY s.site_id)
        AS site_ids,
    ARRAY(SELECT c.category_id FROM article_categories c WHERE c.article_id = a.id ORDER BY c.category_id)
        AS category_ids
"#;

fn select_articles(filter: &str) -> String {
    format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE {filter}")
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    slug: String,
    status: ContentStatus,
    allow_comments: bool,
    display_comments: bool,
    featured: bool,
    created_at: OffsetDateTime,
    publish_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    expires_at: Option<OffsetDateTime>,
    byline: String,
    credit_line: String,
    summary: String,
    body: String,
    footer: String,
    dateline: String,
    article_type: ArticleType,
    external_url: String,
    primary_site_id: Option<SiteId>,
    site_ids: Vec<SiteId>,
    category_ids: Vec<i64>,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            status: row.status,
            allow_comments: row.allow_comments,
            display_comments: row.display_comments,
            featured: row.featured,
            created_at: row.created_at,
            publish_at: row.publish_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
            byline: row.byline,
            credit_line: row.credit_line,
            summary: row.summary,
            body: row.body,
            footer: row.footer,
            dateline: row.dateline,
            article_type: row.article_type,
            external_url: row.external_url,
            site_ids: row.site_ids,
            primary_site_id: row.primary_site_id,
            category_ids: row.category_ids,
        }
    }
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn find_article(
        &self,
        id: i64,
        visibility: ArticleVisibility,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        let on_site = "EXISTS (SELECT 1 FROM article_sites s WHERE s.article_id = a.id AND s.site_id = $2)";
        let row = match visibility {
            ArticleVisibility::Published { site, now } => {
                let sql = select_articles(&format!(
                    "a.id = $1 AND {on_site} AND a.status = $3 \
                     AND a.publish_at <= $4 AND (a.expires_at IS NULL OR a.expires_at >= $4)"
                ));
                sqlx::query_as::<_, ArticleRow>(&sql)
                    .bind(id)
                    .bind(site)
                    .bind(ContentStatus::Public)
                    .bind(now)
                    .fetch_optional(self.pool())
                    .await
            }
            ArticleVisibility::Staff { site } => {
                let sql = select_articles(&format!("a.id = $1 AND {on_site}"));
                sqlx::query_as::<_, ArticleRow>(&sql)
                    .bind(id)
                    .bind(site)
                    .fetch_optional(self.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(row.map(ArticleRecord::from))
    }

    async fn find_article_by_id(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError> {
        let sql = select_articles("a.id = $1");
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ArticleRecord::from))
    }
}

#[async_trait]
impl ArticlesWriteRepo for PostgresRepositories {
    async fn create_article(&self, article: &ValidatedArticle) -> Result<ArticleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO articles (
                title, slug, status, allow_comments, display_comments, featured,
                publish_at, updated_at, expires_at, byline, credit_line, summary,
                body, footer, dateline, article_type, external_url, primary_site_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id
            "#,
        )
        .bind(&article.title)
        .bind(&article.slug)
        .bind(article.status)
        .bind(article.allow_comments)
        .bind(article.display_comments)
        .bind(article.featured)
        .bind(article.publish_at)
        .bind(article.updated_at)
        .bind(article.expires_at)
        .bind(&article.byline)
        .bind(&article.credit_line)
        .bind(&article.summary)
        .bind(&article.body)
        .bind(&article.footer)
        .bind(&article.dateline)
        .bind(article.article_type)
        .bind(&article.external_url)
        .bind(article.primary_site_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        replace_relations(&mut tx, id, article).await?;
        let record = fetch_in_tx(&mut tx, id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(record)
    }

    async fn update_article(
        &self,
        id: i64,
        article: &ValidatedArticle,
    ) -> Result<ArticleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE articles
            SET title = $2, slug = $3, status = $4, allow_comments = $5,
                display_comments = $6, featured = $7, publish_at = $8, updated_at = $9,
                expires_at = $10, byline = $11, credit_line = $12, summary = $13,
                body = $14, footer = $15, dateline = $16, article_type = $17,
                external_url = $18, primary_site_id = $19
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&article.title)
        .bind(&article.slug)
        .bind(article.status)
        .bind(article.allow_comments)
        .bind(article.display_comments)
        .bind(article.featured)
        .bind(article.publish_at)
        .bind(article.updated_at)
        .bind(article.expires_at)
        .bind(&article.byline)
        .bind(&article.credit_line)
        .bind(&article.summary)
        .bind(&article.body)
        .bind(&article.footer)
        .bind(&article.dateline)
        .bind(article.article_type)
        .bind(&article.external_url)
        .bind(article.primary_site_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        replace_relations(&mut tx, id, article).await?;
        let record = fetch_in_tx(&mut tx, id).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(record)
    }

    async fn delete_article(&self, id: i64) -> Result<(), RepoError> {
        let deleted = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if deleted.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_article_status(
        &self,
        ids: &[i64],
        status: ContentStatus,
    ) -> Result<Vec<ArticleRecord>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let changed: Vec<i64> = sqlx::query_scalar(
            "UPDATE articles SET status = $1 WHERE id = ANY($2) AND status <> $1 RETURNING id",
        )
        .bind(status)
        .bind(ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let sql = format!("{} ORDER BY a.id", select_articles("a.id = ANY($1)"));
        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&changed)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(ArticleRecord::from).collect())
    }
}

async fn replace_relations(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    article: &ValidatedArticle,
) -> Result<(), RepoError> {
    sqlx::query("DELETE FROM article_sites WHERE article_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    sqlx::query(
        "INSERT INTO article_sites (article_id, site_id) SELECT $1, UNNEST($2::bigint[])",
    )
    .bind(id)
    .bind(&article.site_ids)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    sqlx::query("DELETE FROM article_categories WHERE article_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    sqlx::query(
        "INSERT INTO article_categories (article_id, category_id) SELECT $1, UNNEST($2::bigint[])",
    )
    .bind(id)
    .bind(&article.category_ids)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

async fn fetch_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
) -> Result<ArticleRecord, RepoError> {
    let sql = select_articles("a.id = $1");
    sqlx::query_as::<_, ArticleRow>(&sql)
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map(ArticleRecord::from)
        .map_err(map_sqlx_error)
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use broadsheet::application::content_types::ContentTypeResolver;
use broadsheet::application::detail::{ContentDetailService, DetailSettings};
use broadsheet::application::editorial::EditorialService;
use broadsheet::application::repos::{
    ArticleVisibility, ArticlesRepo, ArticlesWriteRepo, CategoriesRepo, ContentTypesRepo,
    CreateCategoryParams, ImagesRepo, RepoError, SitesRepo, StaffTokensRepo,
};
use broadsheet::application::staff::StaffService;
use broadsheet::cache::{
    CacheBackend, CacheInvalidator, CacheKeyFormatter, CacheStore, ContentCache,
    MemoryCacheBackend,
};
use broadsheet::domain::articles::ValidatedArticle;
use broadsheet::domain::entities::{
    ArticleRecord, CategoryRecord, ContentTypeRecord, ImageRecord, SiteRecord, StaffTokenRecord,
};
use broadsheet::domain::images::ValidatedImage;
use broadsheet::domain::types::{ArticleType, ContentStatus, SiteId};
use broadsheet::infra::http::{
    AdminState, DatabaseHealth, HttpState, RouterState, build_admin_router, build_router,
};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use time::macros::datetime;
use tower::ServiceExt;

pub const SITE: SiteId = 1;
pub const OTHER_SITE: SiteId = 2;
pub const BASE_URL: &str = "https://news.example.com";

pub fn article(id: i64, slug: &str) -> ArticleRecord {
    ArticleRecord {
        id,
        title: "My Title".to_string(),
        slug: slug.to_string(),
        status: ContentStatus::Public,
        allow_comments: true,
        display_comments: true,
        featured: false,
        created_at: datetime!(2024-01-05 08:00 UTC),
        publish_at: datetime!(2024-01-05 09:00 UTC),
        updated_at: datetime!(2024-01-05 09:00 UTC),
        expires_at: None,
        byline: "Jane Reporter".to_string(),
        credit_line: String::new(),
        summary: "A short summary.".to_string(),
        body: "<p>Body text.</p>".to_string(),
        footer: String::new(),
        dateline: "SPRINGFIELD".to_string(),
        article_type: ArticleType::Internal,
        external_url: String::new(),
        site_ids: vec![SITE],
        primary_site_id: Some(SITE),
        category_ids: Vec::new(),
    }
}

#[derive(Default)]
pub struct MemoryArticles {
    rows: Mutex<HashMap<i64, ArticleRecord>>,
    next_id: AtomicUsize,
    pub reads: AtomicUsize,
}

impl MemoryArticles {
    pub fn insert(&self, article: ArticleRecord) {
        self.rows
            .lock()
            .expect("articles lock")
            .insert(article.id, article);
    }

    pub fn get(&self, id: i64) -> Option<ArticleRecord> {
        self.rows.lock().expect("articles lock").get(&id).cloned()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_from(id: i64, article: &ValidatedArticle) -> ArticleRecord {
        ArticleRecord {
            id,
            title: article.title.clone(),
            slug: article.slug.clone(),
            status: article.status,
            allow_comments: article.allow_comments,
            display_comments: article.display_comments,
            featured: article.featured,
            created_at: OffsetDateTime::now_utc(),
            publish_at: article.publish_at,
            updated_at: article.updated_at,
            expires_at: article.expires_at,
            byline: article.byline.clone(),
            credit_line: article.credit_line.clone(),
            summary: article.summary.clone(),
            body: article.body.clone(),
            footer: article.footer.clone(),
            dateline: article.dateline.clone(),
            article_type: article.article_type,
            external_url: article.external_url.clone(),
            site_ids: article.site_ids.clone(),
            primary_site_id: article.primary_site_id,
            category_ids: article.category_ids.clone(),
        }
    }
}

#[async_trait]
impl ArticlesRepo for MemoryArticles {
    async fn find_article(
        &self,
        id: i64,
        visibility: ArticleVisibility,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(id).filter(|article| visibility.admits(article)))
    }

    async fn find_article_by_id(&self, id: i64) -> Result<Option<ArticleRecord>, RepoError> {
        Ok(self.get(id))
    }
}

#[async_trait]
impl ArticlesWriteRepo for MemoryArticles {
    async fn create_article(&self, article: &ValidatedArticle) -> Result<ArticleRecord, RepoError> {
        let id = 1000 + self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
        let record = Self::record_from(id, article);
        self.insert(record.clone());
        Ok(record)
    }

    async fn update_article(
        &self,
        id: i64,
        article: &ValidatedArticle,
    ) -> Result<ArticleRecord, RepoError> {
        let existing = self.get(id).ok_or(RepoError::NotFound)?;
        let mut record = Self::record_from(id, article);
        record.created_at = existing.created_at;
        self.insert(record.clone());
        Ok(record)
    }

    async fn delete_article(&self, id: i64) -> Result<(), RepoError> {
        self.rows
            .lock()
            .expect("articles lock")
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn update_article_status(
        &self,
        ids: &[i64],
        status: ContentStatus,
    ) -> Result<Vec<ArticleRecord>, RepoError> {
        let mut rows = self.rows.lock().expect("articles lock");
        let mut changed = Vec::new();
        for id in ids {
            if let Some(row) = rows.get_mut(id)
                && row.status != status
            {
                row.status = status;
                changed.push(row.clone());
            }
        }
        Ok(changed)
    }
}

#[derive(Default)]
pub struct MemoryCategories {
    rows: Mutex<Vec<CategoryRecord>>,
}

impl MemoryCategories {
    /// Insert or replace the category with `id`.
    pub fn insert(&self, id: i64, name: &str, path: &str) {
        let mut rows = self.rows.lock().expect("categories lock");
        rows.retain(|row| row.id != id);
        rows.push(CategoryRecord {
            id,
            name: name.to_string(),
            slug: path.to_ascii_lowercase(),
            path: path.to_string(),
            depth: (path.len() / 4) as i32,
        });
    }

    fn sorted(&self, keep: impl Fn(&CategoryRecord) -> bool) -> Vec<CategoryRecord> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .expect("categories lock")
            .iter()
            .filter(|row| keep(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        rows
    }
}

#[async_trait]
impl CategoriesRepo for MemoryCategories {
    async fn find_category(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.sorted(|row| row.id == id).into_iter().next())
    }

    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<CategoryRecord>, RepoError> {
        Ok(self.sorted(|row| ids.contains(&row.id)))
    }

    async fn list_by_paths(&self, paths: &[String]) -> Result<Vec<CategoryRecord>, RepoError> {
        Ok(self.sorted(|row| paths.contains(&row.path)))
    }

    async fn last_child_path(&self, parent: Option<&str>) -> Result<Option<String>, RepoError> {
        let parent = parent.unwrap_or("");
        let depth = (parent.len() / 4) as i32 + 1;
        Ok(self
            .sorted(|row| row.depth == depth && row.path.starts_with(parent))
            .pop()
            .map(|row| row.path))
    }

    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut rows = self.rows.lock().expect("categories lock");
        let record = CategoryRecord {
            id: rows.len() as i64 + 1,
            name: params.name,
            slug: params.slug,
            path: params.path,
            depth: params.depth,
        };
        rows.push(record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct MemoryImages {
    rows: Mutex<HashMap<i64, ImageRecord>>,
}

impl MemoryImages {
    fn record_from(id: i64, image: &ValidatedImage) -> ImageRecord {
        ImageRecord {
            id,
            title: image.title.clone(),
            slug: image.slug.clone(),
            file_path: image.file_path.clone(),
            crop_direction: image.crop_direction,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[async_trait]
impl ImagesRepo for MemoryImages {
    async fn find_image(&self, id: i64) -> Result<Option<ImageRecord>, RepoError> {
        Ok(self.rows.lock().expect("images lock").get(&id).cloned())
    }

    async fn create_image(&self, image: &ValidatedImage) -> Result<ImageRecord, RepoError> {
        let mut rows = self.rows.lock().expect("images lock");
        let record = Self::record_from(rows.len() as i64 + 1, image);
        rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_image(
        &self,
        id: i64,
        image: &ValidatedImage,
    ) -> Result<ImageRecord, RepoError> {
        let mut rows = self.rows.lock().expect("images lock");
        if !rows.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        let record = Self::record_from(id, image);
        rows.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_image(&self, id: i64) -> Result<(), RepoError> {
        self.rows
            .lock()
            .expect("images lock")
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

pub struct FixedContentTypes;

#[async_trait]
impl ContentTypesRepo for FixedContentTypes {
    async fn find_by_short_name(
        &self,
        code: &str,
    ) -> Result<Option<ContentTypeRecord>, RepoError> {
        // "at" is a retired code still pointing at articles.
        let known = code.eq_ignore_ascii_case("ar") || code.eq_ignore_ascii_case("at");
        Ok(known.then(|| ContentTypeRecord {
            id: 1,
            full_name: "Article".to_string(),
            model_name: "article".to_string(),
            short_name: "ar".to_string(),
        }))
    }
}

pub struct FixedSites;

#[async_trait]
impl SitesRepo for FixedSites {
    async fn list_sites(&self) -> Result<Vec<SiteRecord>, RepoError> {
        Ok(vec![
            SiteRecord {
                id: SITE,
                domain: "news.example.com".to_string(),
                name: "News".to_string(),
            },
            SiteRecord {
                id: OTHER_SITE,
                domain: "sport.example.com".to_string(),
                name: "Sport".to_string(),
            },
        ])
    }
}

#[derive(Default)]
pub struct MemoryTokens {
    rows: Mutex<Vec<StaffTokenRecord>>,
}

#[async_trait]
impl StaffTokensRepo for MemoryTokens {
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<StaffTokenRecord>, RepoError> {
        Ok(self
            .rows
            .lock()
            .expect("tokens lock")
            .iter()
            .find(|row| row.prefix == prefix)
            .cloned())
    }

    async fn create_token(&self, record: &StaffTokenRecord) -> Result<(), RepoError> {
        self.rows.lock().expect("tokens lock").push(record.clone());
        Ok(())
    }
}

pub struct HealthyDatabase;

#[async_trait]
impl DatabaseHealth for HealthyDatabase {
    async fn check(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

pub struct TestApp {
    pub public: Router,
    pub admin: Router,
    pub backend: Arc<MemoryCacheBackend>,
    pub keys: CacheKeyFormatter,
    pub articles: Arc<MemoryArticles>,
    pub categories: Arc<MemoryCategories>,
    pub detail: Arc<ContentDetailService>,
    pub staff_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_html_ttl(Some(Duration::from_secs(300))).await
    }

    pub async fn with_html_ttl(html_ttl: Option<Duration>) -> Self {
        let articles = Arc::new(MemoryArticles::default());
        let categories = Arc::new(MemoryCategories::default());
        let images = Arc::new(MemoryImages::default());
        let tokens = Arc::new(MemoryTokens::default());

        let backend = Arc::new(MemoryCacheBackend::new(
            NonZeroUsize::new(1_000).expect("capacity"),
        ));
        let dyn_backend: Arc<dyn CacheBackend> = backend.clone();
        let store = CacheStore::new(dyn_backend, Duration::from_secs(1_209_600));
        let keys = CacheKeyFormatter::new("test", "1");

        let detail = Arc::new(ContentDetailService::new(
            articles.clone(),
            categories.clone(),
            ContentTypeResolver::new(Arc::new(FixedContentTypes), store.clone(), keys.clone()),
            ContentCache::new(store.clone(), keys.clone()),
            DetailSettings {
                site_id: SITE,
                html_ttl,
            },
        ));
        let editorial = Arc::new(EditorialService::new(
            articles.clone(),
            articles.clone(),
            images,
            categories.clone(),
            CacheInvalidator::new(store, keys.clone(), Arc::new(FixedSites), SITE),
        ));

        let staff = StaffService::new(tokens);
        let staff_token = staff.issue("editor").await.expect("issue token").token;

        let state = RouterState {
            http: HttpState {
                detail: detail.clone(),
                staff,
                db: Arc::new(HealthyDatabase),
                base_url: Arc::from(BASE_URL),
            },
            admin: AdminState {
                editorial,
                db: Arc::new(HealthyDatabase),
            },
        };

        Self {
            public: build_router(state.clone()).with_state(state.clone()),
            admin: build_admin_router(state.clone()).with_state(state),
            backend,
            keys,
            articles,
            categories,
            detail,
            staff_token,
        }
    }

    pub fn article_key(&self, id: i64) -> String {
        self.keys.key("article", Some(id), Some(SITE))
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        send(&self.public, Request::get(uri).body(Body::empty()).expect("request")).await
    }

    pub async fn get_as_staff(&self, uri: &str) -> Response<Body> {
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.staff_token))
            .body(Body::empty())
            .expect("request");
        send(&self.public, request).await
    }

    pub async fn admin_json(
        &self,
        method: &str,
        uri: &str,
        body: serde_json::Value,
        staff: bool,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if staff {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.staff_token));
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request");
        send(&self.admin, request).await
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("router response")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

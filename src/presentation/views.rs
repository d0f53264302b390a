use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

use crate::application::detail::DetailPage;
use crate::application::error::{ErrorReport, HttpError};
use crate::domain::entities::CategoryRecord;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

/// Render to a string so the caller can both respond with and cache the page.
pub fn render_template<T: Template>(template: &T) -> Result<String, HttpError> {
    template.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(&template) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(detail: impl Into<String>) -> Response {
    let view = ErrorPageView::not_found();
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        detail,
    )
    .attach(&mut response);
    response
}

/// Generic failure page; the diagnostic chain travels in the attached report.
pub fn render_server_error_response(report: ErrorReport) -> Response {
    let view = ErrorPageView::server_error();
    let mut response =
        render_template_response(ErrorTemplate { view }, StatusCode::INTERNAL_SERVER_ERROR);
    report.attach(&mut response);
    response
}

#[derive(Clone)]
pub struct ErrorPageView {
    pub title: &'static str,
    pub message: &'static str,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found",
            message: "The page you were looking for does not exist or is no longer available.",
        }
    }

    pub fn server_error() -> Self {
        Self {
            title: "Something went wrong",
            message: "We could not load this page. Please try again shortly.",
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: ErrorPageView,
}

#[derive(Clone)]
pub struct CategoryLinkView {
    pub name: String,
    pub slug: String,
    pub depth: i32,
}

impl From<&CategoryRecord> for CategoryLinkView {
    fn from(category: &CategoryRecord) -> Self {
        Self {
            name: category.name.clone(),
            slug: category.slug.clone(),
            depth: category.depth,
        }
    }
}

#[derive(Clone)]
pub struct ArticleDetailView {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub footer: String,
    pub byline: String,
    pub credit_line: String,
    pub dateline: String,
    pub published_iso: String,
    pub published_display: String,
    pub updated_iso: String,
    pub canonical_url: String,
    pub featured: bool,
    pub categories: Vec<CategoryLinkView>,
}

impl ArticleDetailView {
    pub fn from_page(page: &DetailPage, base_url: &str) -> Self {
        let article = &page.article;
        Self {
            title: article.title.clone(),
            summary: article.summary.clone(),
            body: article.body.clone(),
            footer: article.footer.clone(),
            byline: article.display_byline().unwrap_or_default().to_string(),
            credit_line: article.credit_line.clone(),
            dateline: article.dateline.clone(),
            published_iso: iso_timestamp(article.publish_at),
            published_display: display_date(article.publish_at),
            updated_iso: iso_timestamp(article.updated_at),
            canonical_url: format!("{base_url}{}", page.canonical_path),
            featured: article.featured,
            categories: page.categories.iter().map(CategoryLinkView::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "content/article_detail.html")]
pub struct ArticleDetailTemplate {
    pub view: ArticleDetailView,
}

fn iso_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

fn display_date(at: OffsetDateTime) -> String {
    let format = format_description!("[month repr:long] [day padding:none], [year]");
    at.format(&format).unwrap_or_else(|_| at.date().to_string())
}

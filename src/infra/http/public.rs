use std::{sync::Arc, time::Instant};

use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, Uri, header::LOCATION},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use metrics::histogram;
use serde::Deserialize;
use tracing::debug;

use crate::{
    application::{
        detail::{ContentDetailService, DetailError, DetailOutcome, DetailPage, DetailRequest},
        error::ErrorReport,
        staff::StaffService,
    },
    domain::content_types::ContentModel,
    presentation::views::{
        ArticleDetailTemplate, ArticleDetailView, render_not_found_response,
        render_server_error_response, render_template,
    },
};

use super::{
    DatabaseHealth, RouterState, db_health_response,
    middleware::{StaffIdentity, log_responses, resolve_staff, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub detail: Arc<ContentDetailService>,
    pub staff: StaffService,
    pub db: Arc<dyn DatabaseHealth>,
    pub base_url: Arc<str>,
}

pub fn build_router(state: RouterState) -> Router<RouterState> {
    let staff = state.http.staff.clone();

    Router::new()
        .route("/{year}/{month}/{day}/{permalink}/", get(content_detail))
        .route("/{year}/{month}/{day}/{permalink}", get(append_slash))
        .route("/_health/db", get(public_health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(staff, resolve_staff))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailQuery {
    clear_cache: Option<String>,
}

async fn content_detail(
    State(state): State<HttpState>,
    Extension(identity): Extension<StaffIdentity>,
    Path((year, month, day, permalink)): Path<(String, String, String, String)>,
    Query(query): Query<DetailQuery>,
) -> Response {
    let start = Instant::now();
    let request = DetailRequest {
        year: &year,
        month: &month,
        day: &day,
        permalink: &permalink,
        staff: identity.is_staff(),
        clear_cache: query.clear_cache.is_some(),
    };

    let response = match state.detail.resolve(request).await {
        Ok(DetailOutcome::CachedPage(html)) => Html(html).into_response(),
        Ok(DetailOutcome::Redirect(target)) => moved_permanently(&target),
        Ok(DetailOutcome::Render(page)) => render_page(&state, *page).await,
        Err(err) => detail_error_response(err),
    };

    histogram!("broadsheet_detail_render_ms").record(start.elapsed().as_secs_f64() * 1000.0);
    response
}

async fn render_page(state: &HttpState, page: DetailPage) -> Response {
    debug!(
        target = "broadsheet::http::public",
        model = page.model.name(),
        id = page.article.id,
        template = %page.model.template_name(),
        "rendering detail page"
    );
    let view = ArticleDetailView::from_page(&page, &state.base_url);
    let rendered = match page.model {
        ContentModel::Article => render_template(&ArticleDetailTemplate { view }),
    };

    match rendered {
        Ok(html) => {
            if let Some(key) = page.page_cache_key.as_deref() {
                state.detail.store_page(key, &html).await;
            }
            Html(html).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn detail_error_response(err: DetailError) -> Response {
    if err.is_not_found() {
        return render_not_found_response(err.to_string());
    }
    render_server_error_response(ErrorReport::from_error(
        "infra::http::public::content_detail",
        StatusCode::INTERNAL_SERVER_ERROR,
        &err,
    ))
}

/// Detail URLs are canonical with a trailing slash.
async fn append_slash(uri: Uri) -> Response {
    let target = match uri.query() {
        Some(query) => format!("{}/?{query}", uri.path()),
        None => format!("{}/", uri.path()),
    };
    moved_permanently(&target)
}

/// 301 rather than the 308 `Redirect::permanent` emits.
fn moved_permanently(target: &str) -> Response {
    match HeaderValue::try_from(target) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response(),
        Err(err) => render_server_error_response(ErrorReport::from_error(
            "infra::http::public::moved_permanently",
            StatusCode::INTERNAL_SERVER_ERROR,
            &err,
        )),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.check().await)
}

async fn fallback(uri: Uri) -> Response {
    render_not_found_response(format!("no route for {}", uri.path()))
}

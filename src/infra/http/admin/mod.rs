//! Staff-only JSON API for editorial writes.

mod articles;
mod categories;
mod health;
mod images;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::application::editorial::EditorialService;

use super::{
    DatabaseHealth, RouterState,
    middleware::{log_responses, require_staff, resolve_staff, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub editorial: Arc<EditorialService>,
    pub db: Arc<dyn DatabaseHealth>,
}

pub fn build_admin_router(state: RouterState) -> Router<RouterState> {
    let staff = state.http.staff.clone();

    Router::new()
        .route("/articles", post(articles::create_article))
        .route(
            "/articles/{id}",
            put(articles::update_article).delete(articles::delete_article),
        )
        .route("/articles/status", post(articles::set_article_status))
        .route("/images", post(images::create_image))
        .route(
            "/images/{id}",
            put(images::update_image).delete(images::delete_image),
        )
        .route("/categories", post(categories::create_category))
        .route_layer(middleware::from_fn(require_staff))
        .route("/_health/db", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(staff, resolve_staff))
        .layer(middleware::from_fn(set_request_context))
}

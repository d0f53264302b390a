mod support;

use axum::http::StatusCode;
use serde_json::{Value, json};
use support::{OTHER_SITE, SITE, TestApp, article, body_text};

const PERMALINK: &str = "/2024/jan/5/my-title-ar-42/";

async fn json_body(response: axum::http::Response<axum::body::Body>) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

fn draft(title: &str) -> Value {
    json!({
        "title": title,
        "slug": "my-title",
        "body": "<p>Fresh copy.</p>",
        "publish_at": "2024-01-05T09:00:00Z",
        "site_ids": [SITE, OTHER_SITE],
        "primary_site_id": SITE,
    })
}

#[tokio::test]
async fn writes_require_a_staff_token() {
    let app = TestApp::new().await;

    let response = app.admin_json("POST", "/articles", draft("Hello"), false).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn health_is_open() {
    let app = TestApp::new().await;
    let request = axum::http::Request::get("/_health/db")
        .body(axum::body::Body::empty())
        .expect("request");
    let response = support::send(&app.admin, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn created_article_is_served_on_its_permalink() {
    let app = TestApp::new().await;

    let response = app
        .admin_json(
            "POST",
            "/articles",
            json!({
                "title": "Breaking “News”",
                "body": "<p>Copy.</p>",
                "publish_at": "2024-03-10T12:00:00Z",
                "site_ids": [SITE],
            }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["slug"], "breaking-news");
    assert_eq!(created["title"], "Breaking \"News\"");
    let id = created["id"].as_i64().expect("id");

    let response = app.get(&format!("/2024/mar/10/breaking-news-ar-{id}/")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn update_invalidates_cached_copies() {
    let app = TestApp::new().await;
    app.articles.insert(article(42, "my-title"));
    assert!(body_text(app.get(PERMALINK).await).await.contains("My Title"));

    let response = app
        .admin_json("PUT", "/articles/42", draft("Rewritten Title"), true)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let primary = app.article_key(42);
    assert!(!app.backend.contains(&primary));
    assert!(!app.backend.contains(&app.keys.html_key(&primary)));

    let html = body_text(app.get(PERMALINK).await).await;
    assert!(html.contains("Rewritten Title"));
}

#[tokio::test]
async fn renamed_slug_drops_the_old_slug_entry() {
    let app = TestApp::new().await;
    app.articles.insert(article(42, "old-title"));
    assert_eq!(
        app.get("/2024/jan/5/old-title-ar-42/").await.status(),
        StatusCode::OK
    );
    let old_slug_key = app.keys.slug_key("article", "old-title", Some(SITE));
    assert!(app.backend.contains(&old_slug_key));

    let response = app
        .admin_json("PUT", "/articles/42", draft("My Title"), true)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!app.backend.contains(&old_slug_key));

    let response = app.get("/2024/jan/5/old-title-ar-42/").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
}

#[tokio::test]
async fn making_an_article_draft_hides_it_immediately() {
    let app = TestApp::new().await;
    app.articles.insert(article(42, "my-title"));
    assert_eq!(app.get(PERMALINK).await.status(), StatusCode::OK);

    let response = app
        .admin_json(
            "POST",
            "/articles/status",
            json!({ "ids": [42, 99], "status": "draft" }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let changed = json_body(response).await;
    assert_eq!(changed.as_array().map(Vec::len), Some(1));

    assert_eq!(app.get(PERMALINK).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_status_change_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .admin_json(
            "POST",
            "/articles/status",
            json!({ "ids": [], "status": "public" }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_page_and_cache_entries() {
    let app = TestApp::new().await;
    app.articles.insert(article(42, "my-title"));
    assert_eq!(app.get(PERMALINK).await.status(), StatusCode::OK);

    let response = app
        .admin_json("DELETE", "/articles/42", Value::Null, true)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!app.backend.contains(&app.article_key(42)));
    assert_eq!(app.get(PERMALINK).await.status(), StatusCode::NOT_FOUND);

    let response = app
        .admin_json("DELETE", "/articles/42", Value::Null, true)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_draft_is_a_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .admin_json(
            "POST",
            "/articles",
            json!({ "title": "No body", "site_ids": [SITE] }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn slug_that_cannot_appear_in_a_permalink_is_rejected() {
    let app = TestApp::new().await;
    let mut body = draft("Harbour Opens");
    body["slug"] = json!("Harbour Opens!");

    let response = app.admin_json("POST", "/articles", body, true).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "invalid_input");

    let response = app
        .admin_json(
            "POST",
            "/images",
            json!({ "title": "Harbour", "slug": "harbour at dusk", "filename": "h.jpg" }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn updating_a_missing_article_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .admin_json("PUT", "/articles/7", draft("Ghost"), true)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn categories_are_appended_below_their_parent() {
    let app = TestApp::new().await;

    let response = app
        .admin_json("POST", "/categories", json!({ "name": "News" }), true)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let root = json_body(response).await;
    assert_eq!(root["path"], "0001");
    assert_eq!(root["depth"], 1);

    let response = app
        .admin_json(
            "POST",
            "/categories",
            json!({ "name": "Sport" }),
            true,
        )
        .await;
    assert_eq!(json_body(response).await["path"], "0002");

    let response = app
        .admin_json(
            "POST",
            "/categories",
            json!({ "name": "Local", "parent_id": root["id"] }),
            true,
        )
        .await;
    let child = json_body(response).await;
    assert_eq!(child["path"], "00010001");
    assert_eq!(child["depth"], 2);
}

#[tokio::test]
async fn category_under_missing_parent_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .admin_json(
            "POST",
            "/categories",
            json!({ "name": "Orphan", "parent_id": 77 }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_create_then_delete() {
    let app = TestApp::new().await;

    let response = app
        .admin_json(
            "POST",
            "/images",
            json!({ "title": "Harbour at dusk", "filename": "Harbour.JPG" }),
            true,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let image = json_body(response).await;
    assert_eq!(image["slug"], "harbour-at-dusk");
    assert!(
        image["file_path"]
            .as_str()
            .is_some_and(|path| path.starts_with("images/") && path.ends_with("/harbour.jpg"))
    );
    let id = image["id"].as_i64().expect("id");
    assert_eq!(image["mime_type"], "image/jpeg");
    assert_eq!(image["format"], "JPEG");

    let response = app
        .admin_json("DELETE", &format!("/images/{id}"), Value::Null, true)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .admin_json("DELETE", &format!("/images/{id}"), Value::Null, true)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// HTTP API tests driving the router with an in-memory store and disk media
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use study_panel::{
    config::PanelConfig, media::DiskMediaHost, models::Collection, server,
    store::MemoryContentStore, AppContext,
};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "letmein";

struct TestApp {
    ctx: AppContext,
    router: Router,
    _media: TempDir,
}

fn config() -> PanelConfig {
    PanelConfig::from_vars(|key| match key {
        "PANEL_ADMIN_PASSWORD" => Some(ADMIN_PASSWORD.to_string()),
        "PANEL_JWT_SECRET" => Some("an-adequately-long-test-secret-0123456789".to_string()),
        "PANEL_STORE" => Some("memory".to_string()),
        "PANEL_SYNC_RETRY_BASE_MS" => Some("5".to_string()),
        "PANEL_SYNC_RETRY_MAX_MS" => Some("10".to_string()),
        _ => None,
    })
    .unwrap()
}

async fn test_app() -> TestApp {
    let media = TempDir::new().unwrap();
    let ctx = AppContext::from_parts(
        config(),
        Arc::new(MemoryContentStore::new()),
        Arc::new(DiskMediaHost::new(media.path().to_path_buf(), "http://panel.test")),
        Some(media.path().to_path_buf()),
    );
    for collection in Collection::ALL {
        ctx.sync.wait_for_version(collection, 0).await.unwrap();
    }

    TestApp {
        router: server::build_router(ctx.clone()),
        ctx,
        _media: media,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/admin/login",
                None,
                json!({ "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Run a create call and wait until the record shows up in the snapshot
    async fn create(&self, collection: Collection, uri: &str, token: &str, body: Value) -> String {
        let before = self.ctx.sync.version(collection);
        let (status, created) = self.call(Method::POST, uri, Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        self.ctx.sync.wait_for_version(collection, before).await.unwrap();
        created["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let (status, body) = app.get("/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "live");
    assert_eq!(body["collections"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = test_app().await;
    let (status, body) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_admin_login_and_session() {
    let app = test_app().await;

    let (status, body) = app
        .call(Method::POST, "/api/admin/login", None, json!({ "password": "nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AuthenticationRequired");

    let token = app.admin_token().await;
    let request = Request::get("/api/admin/session")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let session: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(session["admin"], true);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = test_app().await;
    let link = json!({
        "type": "url",
        "name": "Guide",
        "url": "https://example.com/x",
        "password": "p1"
    });

    let (status, _) = app
        .call(Method::POST, "/api/admin/documents", None, link.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::POST, "/api/admin/documents", Some("garbage"), link)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_link_document_unlock_and_open() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let id = app
        .create(
            Collection::Documents,
            "/api/admin/documents",
            &token,
            json!({
                "type": "url",
                "name": "Guide",
                "url": "https://example.com/x",
                "password": "p1",
                "note": "https://notes.example"
            }),
        )
        .await;

    let (status, listing) = app.get("/api/documents").await;
    assert_eq!(status, StatusCode::OK);
    let first = &listing[0];
    assert_eq!(first["id"], id.as_str());
    assert_eq!(first["name"], "Guide");
    assert_eq!(first["noteIsUrl"], true);
    assert!(first.get("password").is_none());

    let unlock_uri = format!("/api/documents/{}/unlock", id);
    let (status, body) = app
        .call(Method::POST, &unlock_uri, None, json!({ "password": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Wrong password, please try again."));

    let (status, body) = app
        .call(Method::POST, &unlock_uri, None, json!({ "password": "p1" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://example.com/x");

    let open_url = body["openUrl"].as_str().unwrap();
    let request = Request::get(open_url).body(Body::empty()).unwrap();
    let (status, headers, _) = app.send(request).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(headers[header::LOCATION], "https://example.com/x");

    let (status, _) = app
        .get(&format!("/api/documents/{}/open?token=forged", id))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_password_change_revokes_view_token() {
    let app = test_app().await;
    let token = app.admin_token().await;
    let id = app
        .create(
            Collection::Documents,
            "/api/admin/documents",
            &token,
            json!({
                "type": "url",
                "name": "Guide",
                "url": "https://example.com/x",
                "password": "p1"
            }),
        )
        .await;

    let (_, body) = app
        .call(
            Method::POST,
            &format!("/api/documents/{}/unlock", id),
            None,
            json!({ "password": "p1" }),
        )
        .await;
    let open_url = body["openUrl"].as_str().unwrap().to_string();

    let before = app.ctx.sync.version(Collection::Documents);
    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/admin/documents/{}", id),
            Some(&token),
            json!({ "password": "p2" }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    app.ctx
        .sync
        .wait_for_version(Collection::Documents, before)
        .await
        .unwrap();

    let doc = app.ctx.sync.document(&id).unwrap();
    assert_eq!(doc.password, "p2");
    assert_eq!(doc.name, "Guide");

    let (status, _) = app.get(&open_url).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_inline_markup_served_as_html() {
    let app = test_app().await;
    let token = app.admin_token().await;
    let markup = "<h1>Week 1</h1>";

    let id = app
        .create(
            Collection::Documents,
            "/api/admin/documents",
            &token,
            json!({
                "type": "html",
                "file": {
                    "fileName": "week1.html",
                    "contentType": "text/html",
                    "dataBase64": general_purpose::STANDARD.encode(markup)
                },
                "password": "pw"
            }),
        )
        .await;

    let (_, body) = app
        .call(
            Method::POST,
            &format!("/api/documents/{}/unlock", id),
            None,
            json!({ "password": "pw" }),
        )
        .await;
    assert_eq!(body["name"], "week1.html");
    assert!(body.get("url").is_none());

    let request = Request::get(body["openUrl"].as_str().unwrap())
        .body(Body::empty())
        .unwrap();
    let (status, headers, html) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(html, markup.as_bytes());
}

#[tokio::test]
async fn test_pdf_is_served_from_media() {
    let app = test_app().await;
    let token = app.admin_token().await;
    let pdf = b"%PDF-1.4 lecture notes";

    let id = app
        .create(
            Collection::Documents,
            "/api/admin/documents",
            &token,
            json!({
                "type": "pdf",
                "file": {
                    "fileName": "notes.pdf",
                    "dataBase64": general_purpose::STANDARD.encode(pdf)
                },
                "password": "pw"
            }),
        )
        .await;

    let (_, body) = app
        .call(
            Method::POST,
            &format!("/api/documents/{}/unlock", id),
            None,
            json!({ "password": "pw" }),
        )
        .await;
    let url = body["url"].as_str().unwrap();
    let path = url.strip_prefix("http://panel.test").unwrap();
    assert!(path.starts_with("/media/pdfs/"));

    let request = Request::get(path).body(Body::empty()).unwrap();
    let (status, _, served) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, pdf);
}

#[tokio::test]
async fn test_non_pdf_rejected() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/admin/documents",
            Some(&token),
            json!({
                "type": "pdf",
                "file": {
                    "fileName": "notes.txt",
                    "contentType": "text/plain",
                    "dataBase64": general_purpose::STANDARD.encode("plain")
                },
                "password": "pw"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidRequest");
    assert!(app.ctx.sync.documents().is_empty());
}

#[tokio::test]
async fn test_exam_listing_groups() {
    let app = test_app().await;
    let token = app.admin_token().await;

    for (semester, subject) in [("S1", "M1"), ("S1", "M2"), ("", "M3")] {
        app.create(
            Collection::Exams,
            "/api/admin/exams",
            &token,
            json!({
                "semester": if semester.is_empty() { "Other" } else { semester },
                "subject": subject,
                "examName": format!("{} final", subject),
                "answers": "1A"
            }),
        )
        .await;
    }

    let (status, groups) = app.get("/api/exams").await;
    assert_eq!(status, StatusCode::OK);
    let semesters: Vec<_> = groups
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["semester"].as_str().unwrap())
        .collect();
    assert_eq!(semesters, vec!["Other", "S1"]);
    assert_eq!(groups[1]["subjects"].as_array().unwrap().len(), 2);
    assert_eq!(groups[1]["subjects"][0]["subject"], "M1");
}

#[tokio::test]
async fn test_blog_search_and_tags() {
    let app = test_app().await;
    let token = app.admin_token().await;

    for (title, tags) in [("Study tips", "exam, tips"), ("Holiday", "life")] {
        app.create(
            Collection::Blogs,
            "/api/admin/blogs",
            &token,
            json!({ "title": title, "content": "**hello**", "tagsInput": tags }),
        )
        .await;
    }

    let (status, listing) = app.get("/api/blogs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["posts"].as_array().unwrap().len(), 2);
    let mut tags: Vec<_> = listing["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    tags.sort();
    assert_eq!(tags, vec!["exam", "life", "tips"]);

    let (_, listing) = app.get("/api/blogs?search=study").await;
    assert_eq!(listing["posts"].as_array().unwrap().len(), 1);
    assert_eq!(listing["posts"][0]["title"], "Study tips");

    let (_, listing) = app.get("/api/blogs?tag=life").await;
    assert_eq!(listing["posts"].as_array().unwrap().len(), 1);
    let id = listing["posts"][0]["id"].as_str().unwrap().to_string();

    let (status, post) = app.get(&format!("/api/blogs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["title"], "Holiday");

    let before = app.ctx.sync.version(Collection::Blogs);
    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/admin/blogs/{}", id),
            Some(&token),
            Value::Null,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    app.ctx
        .sync
        .wait_for_version(Collection::Blogs, before)
        .await
        .unwrap();

    let (status, _) = app.get(&format!("/api/blogs/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blog_image_upload_returns_markdown() {
    let app = test_app().await;
    let token = app.admin_token().await;
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    let (status, body) = app
        .call(
            Method::POST,
            "/api/admin/blogs/images",
            Some(&token),
            json!({
                "file": {
                    "fileName": "chart.png",
                    "dataBase64": general_purpose::STANDARD.encode(png)
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("http://panel.test/media/blogImages/"));
    assert_eq!(body["markdown"], format!("\n![]({})\n", url));
}

#[tokio::test]
async fn test_unlock_attempts_are_rate_limited() {
    let app = test_app().await;
    let token = app.admin_token().await;
    let id = app
        .create(
            Collection::Documents,
            "/api/admin/documents",
            &token,
            json!({
                "type": "url",
                "name": "Guide",
                "url": "https://example.com/x",
                "password": "p1"
            }),
        )
        .await;

    let uri = format!("/api/documents/{}/unlock", id);
    let mut statuses = Vec::new();
    for _ in 0..11 {
        let (status, _) = app
            .call(Method::POST, &uri, None, json!({ "password": "guess" }))
            .await;
        statuses.push(status);
    }
    assert!(statuses[..10].iter().all(|s| *s == StatusCode::FORBIDDEN));
    assert_eq!(statuses[10], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unknown_document_unlock_is_not_tracked() {
    let app = test_app().await;

    for i in 0..5 {
        let (status, _) = app
            .call(
                Method::POST,
                &format!("/api/documents/missing-{}/unlock", i),
                None,
                json!({ "password": "guess" }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    assert_eq!(app.ctx.limiter.tracked_documents(), 0);
}

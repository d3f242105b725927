use super::*;

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use crate::gemini::GeminiConfig;
use crate::gemini::mock::{MockGemini, image_reply};
use crate::photo::tests::sample_image;

const BOUNDARY: &str = "hohostudio-test-boundary";

/// A browser stand-in: keeps the session cookie and the page's CSRF token.
struct Browser {
    app: Router,
    cookie: Option<String>,
    csrf: String,
}

impl Browser {
    fn new(config: GeminiConfig) -> Self {
        catalog::init().expect("catalog");
        let catalog = catalog::catalog().expect("catalog");
        let state = AppState::new(catalog, GeminiClient::new(config), 4 * 1024 * 1024);
        Self {
            app: create_router(state),
            cookie: None,
            csrf: String::new(),
        }
    }

    async fn send(&mut self, request: axum::http::request::Builder, body: Body) -> axum::response::Response {
        let request = match &self.cookie {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        };
        let response = self
            .app
            .clone()
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("response");
        if let Some(cookie) = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
        {
            self.cookie = Some(cookie.to_string());
        }
        response
    }

    /// Loads the page and remembers its CSRF token.
    async fn page(&mut self) -> String {
        let response = self
            .send(Request::builder().method("GET").uri("/"), Body::empty())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        self.csrf = extract_csrf(&body);
        body
    }

    async fn post(&mut self, uri: &str, fields: &[(&str, &str)]) -> axum::response::Response {
        let mut encoded = format!("csrf_token={}", self.csrf);
        for (name, value) in fields {
            encoded.push_str(&format!("&{}={}", name, form_encode(value)));
        }
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(encoded),
        )
        .await
    }

    async fn upload(&mut self, file_name: &str, bytes: &[u8]) -> axum::response::Response {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"csrf_token\"\r\n\r\n{}\r\n",
                self.csrf
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        self.send(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                ),
            Body::from(body),
        )
        .await
    }

    async fn get(&mut self, uri: &str) -> axum::response::Response {
        self.send(Request::builder().method("GET").uri(uri), Body::empty())
            .await
    }
}

fn form_encode(value: &str) -> String {
    let mut out = String::new();
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(byte as char),
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn extract_csrf(body: &str) -> String {
    let marker = "name=\"csrf_token\" value=\"";
    let start = body.find(marker).expect("csrf field") + marker.len();
    body[start..]
        .split('"')
        .next()
        .expect("csrf value")
        .to_string()
}

async fn read_body(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

fn assert_redirected(response: &axum::response::Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).expect("location"),
        "/"
    );
}

#[tokio::test]
async fn first_visit_shows_the_upload_step() {
    let (_mock, config) = MockGemini::start(StatusCode::OK, image_reply("image/png", "aGVsbG8=")).await;
    let mut browser = Browser::new(config);

    let body = browser.page().await;
    assert!(body.contains("Paso 1 de 4"));
    assert!(body.contains("Tu Foto Familiar"));
    assert!(!browser.csrf.is_empty());
    assert!(browser.cookie.is_some());

    let styles = browser.get("/static/styles.css").await;
    assert_eq!(styles.status(), StatusCode::OK);
}

#[tokio::test]
async fn posts_need_the_csrf_token() {
    let (_mock, config) = MockGemini::start(StatusCode::OK, image_reply("image/png", "aGVsbG8=")).await;
    let mut browser = Browser::new(config);
    browser.page().await;
    browser.csrf = "forged".to_string();

    let response = browser.post("/style", &[("style", "SNOWY")]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn next_without_a_photo_stays_put() {
    let (_mock, config) = MockGemini::start(StatusCode::OK, image_reply("image/png", "aGVsbG8=")).await;
    let mut browser = Browser::new(config);
    browser.page().await;

    let response = browser.post("/next", &[]).await;
    assert_redirected(&response);
    let body = browser.page().await;
    assert!(body.contains("Paso 1 de 4"));
}

#[tokio::test]
async fn rejected_uploads_flash_once() {
    let (_mock, config) = MockGemini::start(StatusCode::OK, image_reply("image/png", "aGVsbG8=")).await;
    let mut browser = Browser::new(config);
    browser.page().await;

    let response = browser.upload("notes.txt", b"just some text").await;
    assert_redirected(&response);
    let body = browser.page().await;
    assert!(body.contains("Solo JPG, PNG o WebP."));
    assert!(body.contains("Paso 1 de 4"));

    let again = browser.page().await;
    assert!(!again.contains("Solo JPG, PNG o WebP."));
}

#[tokio::test]
async fn full_flow_generates_and_downloads() {
    let (mock, config) = MockGemini::start(StatusCode::OK, image_reply("image/png", "aGVsbG8=")).await;
    let mut browser = Browser::new(config);
    browser.page().await;

    let png = sample_image(image::ImageFormat::Png);
    assert_redirected(&browser.upload("familia.png", &png).await);
    let body = browser.page().await;
    let start = body.find("/preview/").expect("preview url");
    let preview_url = body[start..].split('"').next().expect("url").to_string();
    let preview = browser.get(&preview_url).await;
    assert_eq!(preview.status(), StatusCode::OK);
    assert_eq!(preview.headers().get(CONTENT_TYPE).expect("type"), "image/png");
    assert_eq!(read_body(preview).await.len(), png.len());

    assert_redirected(&browser.post("/next", &[]).await);
    assert_redirected(&browser.post("/style", &[("style", "CLASSIC")]).await);
    assert_redirected(&browser.post("/next", &[]).await);
    assert_redirected(
        &browser
            .post("/decorations", &[("decoration", "gifts"), ("position", "foreground")])
            .await,
    );
    assert_redirected(&browser.post("/pose", &[("pose", "toasting")]).await);
    assert_redirected(&browser.post("/next", &[]).await);
    let body = browser.page().await;
    assert!(body.contains("Paso 4 de 4"));

    let response = browser
        .post(
            "/next",
            &[("content", "Familia Pérez 2024"), ("text_style", "neon")],
        )
        .await;
    assert_redirected(&response);

    let body = browser.page().await;
    assert!(body.contains("/result/image"));
    assert!(body.contains("src=\"data:image/png;base64,aGVsbG8=\""));
    assert!(!body.contains("Paso 4 de 4"));

    {
        let seen = mock.seen.lock().await;
        assert_eq!(seen.len(), 1);
        let prompt = seen[0].1["contents"][0]["parts"][0]["text"]
            .as_str()
            .expect("prompt")
            .to_string();
        assert!(prompt.contains("Montaña Regalos positioned in the foreground."));
        assert!(prompt.contains("making a toast"));
        assert!(prompt.contains("\"Familia Pérez 2024\""));
    }

    let result = browser.get("/result/image").await;
    assert_eq!(result.status(), StatusCode::OK);
    assert_eq!(read_body(result).await, "hello");

    let download = browser.get("/download").await;
    assert_eq!(download.status(), StatusCode::OK);
    let disposition = download
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .expect("disposition")
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"hoho-studio-"));
    assert!(disposition.ends_with(".png\""));

    assert_redirected(&browser.post("/reset", &[]).await);
    let body = browser.page().await;
    assert!(body.contains("Paso 1 de 4"));
    assert_eq!(browser.get(&preview_url).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(browser.get("/download").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_generation_shows_the_error_on_the_text_step() {
    let (_mock, config) = MockGemini::start(StatusCode::OK, json!({"candidates": []})).await;
    let mut browser = Browser::new(config);
    browser.page().await;

    let png = sample_image(image::ImageFormat::Png);
    assert_redirected(&browser.upload("familia.png", &png).await);
    browser.page().await;
    for _ in 0..3 {
        assert_redirected(&browser.post("/next", &[]).await);
    }
    assert_redirected(&browser.post("/next", &[("content", ""), ("text_style", "gold_elegant")]).await);

    let body = browser.page().await;
    assert!(body.contains("No content generated."));
    assert!(body.contains("Paso 4 de 4"));
    assert_eq!(browser.get("/result/image").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn captions_are_cut_to_thirty_characters() {
    let (_mock, config) = MockGemini::start(StatusCode::OK, image_reply("image/png", "aGVsbG8=")).await;
    let mut browser = Browser::new(config);
    browser.page().await;

    let long = "Feliz Navidad a toda la familia Pérez";
    assert_redirected(&browser.post("/text", &[("content", long), ("text_style", "neon")]).await);

    let png = sample_image(image::ImageFormat::Png);
    browser.upload("familia.png", &png).await;
    browser.page().await;
    for _ in 0..3 {
        browser.post("/next", &[]).await;
    }
    let body = browser.page().await;
    let expected: String = long.chars().take(30).collect();
    assert!(body.contains(&format!("value=\"{expected}\"")));
    assert!(!body.contains(long));
}

#[tokio::test]
async fn unknown_position_is_a_bad_request() {
    let (_mock, config) = MockGemini::start(StatusCode::OK, image_reply("image/png", "aGVsbG8=")).await;
    let mut browser = Browser::new(config);
    browser.page().await;

    let response = browser
        .post("/decorations", &[("decoration", "tree"), ("position", "ceiling")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

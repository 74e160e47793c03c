//! End-to-end dispatcher tests against a canned raw-TCP upstream.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

use internex::config::Config;
use internex::rewrite::urls::encode_proxy_path;
use internex::state::AppState;
use internex::web::create_router;

/// Spawn a one-response-per-connection upstream. The handler receives the
/// raw request head and returns the full response bytes to write back.
async fn spawn_upstream<F>(respond: F) -> SocketAddr
where
    F: Fn(&str) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let respond = respond.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut tmp = [0u8; 1024];
                loop {
                    match socket.read(&mut tmp).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&tmp[..n]),
                    }
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let head = String::from_utf8_lossy(&buf).to_string();
                let _ = socket.write_all(&respond(&head)).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn test_router(assets_dir: PathBuf) -> axum::Router {
    let config = Config {
        host: "localhost".to_string(),
        port: 8080,
        assets_dir,
        log_level: "info".to_string(),
    };
    create_router(AppState::new(&config).unwrap())
}

fn proxy_request(target: &str) -> Request<Body> {
    Request::builder()
        .uri(encode_proxy_path(target))
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn missing_or_invalid_url_is_bad_request() {
    let router = test_router(PathBuf::from("assets"));

    let missing = router
        .clone()
        .oneshot(Request::builder().uri("/proxy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let bad_scheme = router
        .oneshot(
            Request::builder()
                .uri("/proxy?url=ftp%3A%2F%2Fexample.com%2Ff")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad_scheme.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redirects_pass_through_with_rewritten_location() {
    let addr = spawn_upstream(|_head| {
        b"HTTP/1.1 302 Found\r\n\
          Location: /next\r\n\
          X-Frame-Options: DENY\r\n\
          Content-Security-Policy: default-src 'self'\r\n\
          Content-Length: 0\r\n\
          \r\n"
            .to_vec()
    })
    .await;

    let target = format!("http://{addr}/page");
    let response = test_router(PathBuf::from("assets"))
        .oneshot(proxy_request(&target))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let expected = encode_proxy_path(&format!("http://{addr}/next"));
    assert_eq!(
        response.headers().get("location").unwrap().to_str().unwrap(),
        expected
    );
    assert!(!response.headers().contains_key("x-frame-options"));
    assert!(!response.headers().contains_key("content-security-policy"));
}

#[tokio::test]
async fn html_is_rewritten_and_runtime_injected() {
    let html = "<!doctype html><html><head><title>t</title></head>\
                <body><a href=\"/a\">x</a></body></html>";
    let response_text = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         \r\n{}",
        html.len(),
        html
    );
    let addr = spawn_upstream(move |_head| response_text.clone().into_bytes()).await;

    let target = format!("http://{addr}/page");
    let response = test_router(PathBuf::from("assets"))
        .oneshot(proxy_request(&target))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("content-length"));

    let expected_base = format!("\"http://{addr}/page\"");
    let body = body_string(response).await;
    assert!(body.contains(&format!(
        "<head><script>window.__internex_base = {expected_base};</script>"
    )));
    assert!(body.contains(r#"<script src="/internex.runtime.js"></script>"#));
    let expected_href = encode_proxy_path(&format!("http://{addr}/a"));
    assert!(body.contains(&format!("href=\"{expected_href}\"")));
}

#[tokio::test]
async fn cookies_are_rewritten_stored_and_replayed() {
    let addr = spawn_upstream(|head| {
        if head.starts_with("GET /set ") {
            b"HTTP/1.1 200 OK\r\n\
              Content-Type: text/plain\r\n\
              Set-Cookie: sid=abc; Domain=example.com; Secure; SameSite=Strict\r\n\
              Content-Length: 2\r\n\
              \r\nok"
                .to_vec()
        } else {
            // Echo the request head so the test can see the Cookie header.
            format!(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: text/plain\r\n\
                 Content-Length: {}\r\n\
                 \r\n{}",
                head.len(),
                head
            )
            .into_bytes()
        }
    })
    .await;

    let router = test_router(PathBuf::from("assets"));

    let set = router
        .clone()
        .oneshot(proxy_request(&format!("http://{addr}/set")))
        .await
        .unwrap();
    assert_eq!(
        set.headers().get("set-cookie").unwrap().to_str().unwrap(),
        "sid=abc; SameSite=None"
    );

    let echo = router
        .oneshot(proxy_request(&format!("http://{addr}/echo")))
        .await
        .unwrap();
    let body = body_string(echo).await;
    assert!(body.contains("cookie: sid=abc"), "echoed head: {body}");
}

#[tokio::test]
async fn binary_bodies_stream_through_untouched() {
    let payload: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0xff];
    let mut response_bytes = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: image/png\r\n\
         Content-Length: {}\r\n\
         \r\n",
        payload.len()
    )
    .into_bytes();
    response_bytes.extend_from_slice(payload);
    let addr = spawn_upstream(move |_head| response_bytes.clone()).await;

    let target = format!("http://{addr}/img.png");
    let response = test_router(PathBuf::from("assets"))
        .oneshot(proxy_request(&target))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    // Not rewritten, so the upstream Content-Length survives.
    assert_eq!(
        response.headers().get("content-length").unwrap().to_str().unwrap(),
        payload.len().to_string()
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), payload);
}

#[tokio::test]
async fn head_requests_return_headers_only() {
    let addr = spawn_upstream(|_head| {
        b"HTTP/1.1 200 OK\r\n\
          Content-Type: text/html\r\n\
          Content-Length: 64\r\n\
          \r\n"
            .to_vec()
    })
    .await;

    let target = format!("http://{addr}/page");
    let request = Request::builder()
        .method("HEAD")
        .uri(encode_proxy_path(&target))
        .body(Body::empty())
        .unwrap();
    let response = test_router(PathBuf::from("assets"))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/html");
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn rewrite_endpoints_transform_bodies() {
    let router = test_router(PathBuf::from("assets"));

    let css = r#"div { background: url(/bg.png); } @import "https://x.y/z.css";"#;
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rewrite/css?base=https%3A%2F%2Fexample.com%2Fpage")
                .body(Body::from(css))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/css; charset=utf-8"
    );
    assert_eq!(
        body_string(response).await,
        r#"div { background: url("/proxy?url=https%3A%2F%2Fexample.com%2Fbg.png"); } @import "/proxy?url=https%3A%2F%2Fx.y%2Fz.css";"#
    );

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rewrite/html?base=https%3A%2F%2Fexample.com%2Fpage")
                .body(Body::from("<html><head></head><body></body></html>"))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_string(response).await;
    assert!(body.contains("window.__internex_base = \"https://example.com/page\""));

    let js = "fetch('/api');";
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rewrite/js")
                .body(Body::from(js))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_string(response).await, js);
}

#[tokio::test]
async fn static_assets_and_traversal_guard() {
    let assets = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets");
    let router = test_router(assets);

    let shell = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(shell.status(), StatusCode::OK);
    assert_eq!(
        shell.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );

    let runtime = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/internex.runtime.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(runtime.status(), StatusCode::OK);
    assert_eq!(
        runtime.headers().get("content-type").unwrap(),
        "application/javascript; charset=utf-8"
    );
    let body = body_string(runtime).await;
    assert!(body.contains("window.__internex"));
    assert!(body.contains("__ix_"));

    let missing = router
        .clone()
        .oneshot(Request::builder().uri("/nope.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let traversal = router
        .oneshot(
            Request::builder()
                .uri("/../Cargo.toml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(traversal.status(), StatusCode::FORBIDDEN);
}

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

use snapfetch::config::Config;
use snapfetch::{Engine, EngineError, HuntError, LoadedFrom, Priority, RequestBuilder};

#[derive(Default)]
struct Hits {
    ok: AtomicUsize,
    flaky: AtomicUsize,
    missing: AtomicUsize,
    slow: AtomicUsize,
    large: AtomicUsize,
}

struct MockServer {
    png: Vec<u8>,
    hits: Hits,
}

type Shared = Arc<MockServer>;

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])));
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

async fn ok(State(server): State<Shared>) -> impl IntoResponse {
    server.hits.ok.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], server.png.clone())
}

/// Fails the first request, then serves the image.
async fn flaky(State(server): State<Shared>) -> impl IntoResponse {
    if server.hits.flaky.fetch_add(1, Ordering::SeqCst) == 0 {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ([(header::CONTENT_TYPE, "image/png")], server.png.clone()).into_response()
}

async fn missing(State(server): State<Shared>) -> impl IntoResponse {
    server.hits.missing.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn html() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<html></html>")
}

async fn slow(State(server): State<Shared>) -> impl IntoResponse {
    server.hits.slow.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    ([(header::CONTENT_TYPE, "image/png")], server.png.clone())
}

/// Serves a body far larger than the test engine's decode budget.
async fn large(State(server): State<Shared>) -> impl IntoResponse {
    server.hits.large.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "application/octet-stream")], vec![0u8; 256 * 1024])
}

async fn spawn_server() -> (SocketAddr, Shared) {
    let state = Arc::new(MockServer {
        png: png(16, 8),
        hits: Hits::default(),
    });
    let app = Router::new()
        .route("/ok.png", get(ok))
        .route("/flaky.png", get(flaky))
        .route("/missing.png", get(missing))
        .route("/page.html", get(html))
        .route("/slow.png", get(slow))
        .route("/large.bin", get(large))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (address, state)
}

fn engine() -> Engine {
    let mut config = Config::default();
    config.dispatcher.retry_backoff_ms = 5;
    config.network.request_timeout_secs = 5;
    Engine::builder().config(config).build().unwrap()
}

fn request(address: SocketAddr, path: &str) -> RequestBuilder {
    RequestBuilder::parse_uri(&format!("http://{address}{path}")).unwrap()
}

#[tokio::test]
async fn test_download_and_resize() {
    let (address, server) = spawn_server().await;
    let engine = engine();

    let delivery = engine
        .load(
            request(address, "/ok.png")
                .resize(8, 8)
                .unwrap()
                .resize_by_max_side()
                .unwrap()
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(delivery.loaded_from, LoadedFrom::Network);
    assert_eq!((delivery.image.width(), delivery.image.height()), (8, 4));
    assert_eq!(server.hits.ok.load(Ordering::SeqCst), 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let (address, server) = spawn_server().await;
    let engine = engine();

    let delivery = engine
        .load(request(address, "/flaky.png").build().unwrap())
        .await
        .unwrap();

    assert_eq!(delivery.image.width(), 16);
    assert_eq!(server.hits.flaky.load(Ordering::SeqCst), 2);
    assert_eq!(engine.stats().retries, 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_persistent_error_exhausts_retries() {
    let (address, server) = spawn_server().await;
    let engine = engine();

    let err = engine
        .load(request(address, "/missing.png").build().unwrap())
        .await
        .unwrap_err();

    let EngineError::Hunt(HuntError::RetriesExhausted { attempts, last }) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(attempts, 3);
    assert!(last.contains("404"), "{last}");
    assert_eq!(server.hits.missing.load(Ordering::SeqCst), 3);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_non_image_content_type_is_rejected() {
    let (address, _server) = spawn_server().await;
    let engine = engine();

    let err = engine
        .load(request(address, "/page.html").build().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Hunt(HuntError::RetriesExhausted { .. })
    ));
    engine.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_downloads_share_one_request() {
    let (address, server) = spawn_server().await;
    let engine = engine();

    let mut tickets = Vec::new();
    for _ in 0..4 {
        let ticket = engine
            .submit(request(address, "/slow.png").build().unwrap(), Priority::Normal)
            .await
            .unwrap();
        tickets.push(ticket);
    }
    for ticket in tickets {
        assert_eq!(ticket.wait().await.unwrap().image.height(), 8);
    }

    assert_eq!(server.hits.slow.load(Ordering::SeqCst), 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_oversized_body_is_resource_exhaustion() {
    let (address, server) = spawn_server().await;
    let mut config = Config::default();
    config.decode.max_alloc = snapfetch::config::ByteSize(64 * 1024);
    let engine = Engine::builder().config(config).build().unwrap();

    let err = engine
        .load(request(address, "/large.bin").build().unwrap())
        .await
        .unwrap_err();

    let EngineError::Hunt(HuntError::ResourceExhausted(message)) = err else {
        panic!("unexpected error: {err}");
    };
    assert!(message.contains("exceeds limit"), "{message}");
    // Not retried
    assert_eq!(server.hits.large.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().retries, 0);
    engine.shutdown().await;
}

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use speedprobe::speedtest::{HttpTransport, Transport, TransportError};
use speedprobe::{Settings, SpeedTestEngine, SpeedUpdate};

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/down", get(|| async { vec![7u8; 4 * 1024 * 1024] }))
        .route("/up", post(|body: axum::body::Bytes| async move { body.len().to_string() }))
        .route("/ping", get(|| async { "pong" }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn settings(base: &str) -> Settings {
    Settings {
        download_url: format!("{}/down", base),
        upload_url: format!("{}/up", base),
        ping_urls: vec![format!("{}/ping", base), format!("{}/missing", base)],
        jitter_url: Some(format!("{}/ping", base)),
        upload_size_bytes: 1024 * 1024,
        ..Settings::default()
    }
}

#[tokio::test]
async fn measures_against_local_server() {
    let base = spawn_server().await;
    let settings = settings(&base);
    let engine = SpeedTestEngine::new(HttpTransport::new(&settings).unwrap(), settings);

    let ping = engine.measure_ping().await;
    assert!(ping.is_measured());
    assert!(ping.value() > 0.0);

    assert!(engine.measure_jitter().await.is_measured());

    let download: Vec<SpeedUpdate> = engine.measure_download_speed().collect().await;
    assert!(matches!(download.last(), Some(SpeedUpdate::Complete(_))), "{:?}", download.last());
    assert!(download.last().unwrap().mbps() > 0.0);

    let upload: Vec<SpeedUpdate> = engine.measure_upload_speed().collect().await;
    assert_eq!(upload.len(), 1);
    assert!(matches!(upload[0], SpeedUpdate::Complete(_)), "{:?}", upload[0]);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let base = spawn_server().await;
    let transport = HttpTransport::new(&Settings::default()).unwrap();
    let missing = format!("{}/missing", base);

    assert!(matches!(
        transport.get_stream(&missing).await,
        Err(TransportError::Status(404))
    ));
    assert!(matches!(
        transport.head(&missing).await,
        Err(TransportError::Status(404))
    ));
    assert!(transport.head(&format!("{}/ping", base)).await.is_ok());
}

#[tokio::test]
async fn unreachable_host_yields_zero() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let settings = settings(&format!("http://{}", addr));
    let engine = SpeedTestEngine::new(HttpTransport::new(&settings).unwrap(), settings);

    assert_eq!(engine.measure_ping().await.value(), 0.0);
    let download: Vec<SpeedUpdate> = engine.measure_download_speed().collect().await;
    assert_eq!(download.len(), 1);
    assert!(matches!(download[0], SpeedUpdate::Failed(_)));
}

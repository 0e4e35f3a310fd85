//! Router level tests against in-memory stores.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use http_body_util::BodyExt;
use report_service::services::XLSX_MIME;
use report_service::startup::{router, Application};
use std::sync::Arc;
use tower::ServiceExt;

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn report_download_is_published_and_mailed() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockMailTransport::working());
    let app = router(test_state(example_source(), transport.clone(), dir.path(), true));

    let response = get(app, "/api/informes/generar-informe?fecha=2025-05-20").await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], XLSX_MIME);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Informe_Transacciones_20250520.xlsx\""
    );
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.contains_key("x-request-id"));

    let bytes = body_bytes(response).await;
    assert_eq!(&bytes[..2], b"PK");

    let published = std::fs::read(dir.path().join("Informe_Transacciones_20250520.xlsx")).unwrap();
    assert_eq!(published, bytes);

    let sent = transport.wait_for_sent(1).await;
    assert_eq!(
        sent,
        vec![(
            "auditoria@example.com".to_string(),
            "Informe de Transacciones - 20/05/2025".to_string()
        )]
    );
}

#[tokio::test]
async fn iso_datetime_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(
        example_source(),
        Arc::new(MockMailTransport::working()),
        dir.path(),
        false,
    ));

    let response = get(app, "/api/informes/generar-informe?fecha=2025-05-20T15:30:00").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_mail_does_not_fail_the_request() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockMailTransport::new(usize::MAX));
    let app = router(test_state(example_source(), transport.clone(), dir.path(), false));

    let response = get(app, "/api/informes/generar-informe?fecha=2025-05-20").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(transport.wait_for_sent(1).await.is_empty());
}

#[tokio::test]
async fn malformed_date_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(
        example_source(),
        Arc::new(MockMailTransport::working()),
        dir.path(),
        false,
    ));

    let response = get(app, "/api/informes/generar-informe?fecha=20-05-2025").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("20-05-2025"));
    assert!(body.get("stack_trace").is_none());
}

#[tokio::test]
async fn database_failure_surfaces_trace_in_development() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = example_source();
    source.unavailable = true;
    let transport = Arc::new(MockMailTransport::working());
    let app = router(test_state(source, transport.clone(), dir.path(), true));

    let response = get(app, "/api/informes/generar-informe?fecha=2025-05-20").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Database error");
    assert!(body["stack_trace"]
        .as_str()
        .unwrap()
        .contains("data access failed"));

    // Nothing published, nothing mailed.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(transport.connect_attempts(), 0);
}

#[tokio::test]
async fn summary_returns_json() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(
        example_source(),
        Arc::new(MockMailTransport::working()),
        dir.path(),
        false,
    ));

    let response = get(app, "/api/informes/generar-informe-simple?fecha=2025-05-20").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["fecha"], "2025-05-20");
    assert_eq!(body["total_transacciones"], 5);
    let ids: Vec<i64> = body["transacciones"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn registrations_report_download() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockMailTransport::working());
    let app = router(test_state(example_source(), transport.clone(), dir.path(), false));

    let response = get(app, "/api/informes/registros?fecha=2025-05-20").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Informe_INDER_20250520.xlsx\""
    );
    assert!(dir.path().join("Informe_INDER_20250520.xlsx").exists());
    let sent = transport.wait_for_sent(1).await;
    assert_eq!(sent[0].1, "Informe INDER - 20/05/2025");
}

#[tokio::test]
async fn health_reflects_store_availability() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(
        example_source(),
        Arc::new(MockMailTransport::working()),
        dir.path(),
        false,
    ));
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut down = example_source();
    down.unavailable = true;
    let app = router(test_state(
        down,
        Arc::new(MockMailTransport::working()),
        dir.path(),
        false,
    ));
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn application_serves_over_tcp() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        example_source(),
        Arc::new(MockMailTransport::working()),
        dir.path(),
        false,
    );
    let app = Application::build_with_state(test_config(dir.path()), state)
        .await
        .expect("Failed to build application");
    let port = app.port();
    assert_ne!(port, 0);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .expect("Failed to connect");
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream
        .write_all(b"GET /ready HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
}

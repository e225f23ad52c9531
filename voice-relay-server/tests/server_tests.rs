use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use tower::ServiceExt;
use voice_relay_server::{ServerConfig, TokenResponse, create_app};

fn app() -> Router {
    create_app(ServerConfig::new().with_credentials("devkey", "secret"))
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn jwt_claims(token: &str) -> serde_json::Value {
    let payload = token.split('.').nth(1).unwrap();
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_token_from_query() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/token?identity=alice&room=lobby&name=Alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: TokenResponse = serde_json::from_value(json_body(response).await).unwrap();
    assert_eq!(body.identity, "alice");
    assert_eq!(body.room, "lobby");
    assert_eq!(body.name, "Alice");

    let claims = jwt_claims(&body.token);
    assert_eq!(claims["sub"], "alice");
    assert_eq!(claims["iss"], "devkey");
    assert_eq!(claims["video"]["room"], "lobby");
    assert_eq!(claims["video"]["roomJoin"], true);
}

#[tokio::test]
async fn test_post_token_defaults_name() {
    let response =
        app().oneshot(post_json("/api/token", r#"{"identity":"bob","room":"lobby"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["name"], "bob");
    assert_eq!(jwt_claims(body["token"].as_str().unwrap())["name"], "bob");
}

#[tokio::test]
async fn test_missing_parameters_is_bad_request() {
    let response = app()
        .oneshot(Request::builder().uri("/api/token?identity=alice").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"error": "Missing required parameters: identity and room"})
    );

    let response = app().oneshot(post_json("/api/token", r#"{"room":"lobby"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let response = app().oneshot(post_json("/api/token", "{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_missing_credentials_is_server_error() {
    let response = create_app(ServerConfig::new())
        .oneshot(
            Request::builder().uri("/api/token?identity=alice&room=lobby").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("LIVEKIT_API_KEY"));
}

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/token?identity=alice&room=lobby")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
}

#[tokio::test]
async fn test_cors_preflight() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/token")
                .header(header::ORIGIN, "http://example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let methods = response.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap();
    assert!(methods.to_str().unwrap().contains("POST"));
}

#[tokio::test]
async fn test_unknown_path_without_static_dir() {
    let response = app()
        .oneshot(Request::builder().uri("/mic_publisher.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_files_served_as_fallback() {
    let dir = std::env::temp_dir().join(format!("voice-relay-static-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), "<h1>relay</h1>").unwrap();

    let app = create_app(ServerConfig::new().with_static_dir(&dir));
    let response =
        app.oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>relay</h1>");

    std::fs::remove_dir_all(&dir).ok();
}

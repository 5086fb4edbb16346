use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use futures::stream::{BoxStream, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{Library, ServerConfig};
use library_storage::MemoryDataStore;

use super::routes::{create_router, create_router_with_options, RouterOptions};
use crate::middleware::REQUEST_ID_HEADER;
use crate::observability::MetricsState;

fn test_library() -> Library<MemoryDataStore> {
    Library::new(MemoryDataStore::new_shared(), &ServerConfig::default())
}

fn test_app() -> Router {
    create_router(test_library())
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

/// Registers `mluukkai` and returns a session token.
async fn sign_in(app: &Router) -> String {
    let (status, _) = call(
        app,
        send_json(
            "POST",
            "/users",
            json!({ "username": "mluukkai", "favorite_genre": "refactoring" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        app,
        send_json(
            "POST",
            "/login",
            json!({ "username": "mluukkai", "password": "secret" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["value"].as_str().unwrap().to_string()
}

async fn add_book(app: &Router, token: &str, title: &str, author: &str, genres: &[&str]) -> Value {
    let (status, body) = call(
        app,
        send_json(
            "POST",
            "/books",
            json!({ "title": title, "published": 2008, "author": author, "genres": genres }),
            Some(token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = test_app();

    let (status, body) = call(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&app, get("/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["storage"], "ok");
}

#[tokio::test]
async fn test_add_book_and_query_it_back() {
    let app = test_app();
    let token = sign_in(&app).await;

    let book = add_book(&app, &token, "Clean Code", "Robert Martin", &["refactoring"]).await;
    assert_eq!(book["title"], "Clean Code");
    assert_eq!(book["author"]["name"], "Robert Martin");
    assert_eq!(book["author"]["book_count"], 1);

    add_book(&app, &token, "Agile software development", "Robert Martin", &["agile"]).await;
    add_book(&app, &token, "Refactoring, edition 2", "Martin Fowler", &["refactoring"]).await;

    let (status, body) = call(&app, get("/books/count", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (_, body) = call(&app, get("/authors/count", None)).await;
    assert_eq!(body["count"], 2);

    let (_, body) = call(&app, get("/books?author=Robert%20Martin", None)).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Clean Code", "Agile software development"]);

    let (_, body) = call(&app, get("/books?author=Robert%20Martin&genre=agile", None)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = call(&app, get("/books?author=Nobody", None)).await;
    assert_eq!(body, json!([]));

    let (_, body) = call(&app, get("/genres", None)).await;
    assert_eq!(body, json!(["refactoring", "agile"]));

    let (_, body) = call(&app, get("/genres/refactoring/books", None)).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = call(&app, get("/authors", None)).await;
    assert_eq!(body[0]["name"], "Robert Martin");
    assert_eq!(body[0]["book_count"], 2);
    assert_eq!(body[1]["book_count"], 1);
}

#[tokio::test]
async fn test_identity_endpoints() {
    let app = test_app();

    let (status, body) = call(&app, get("/me", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, body) = call(&app, get("/books/favorites", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let token = sign_in(&app).await;
    add_book(&app, &token, "Clean Code", "Robert Martin", &["refactoring"]).await;
    add_book(&app, &token, "The Demon", "Joshua Kerievsky", &["horror"]).await;

    let (_, body) = call(&app, get("/me", Some(&token))).await;
    assert_eq!(body["username"], "mluukkai");

    let (status, body) = call(&app, get("/books/favorites", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Clean Code");

    // After logout the token is anonymous again.
    let response = app
        .clone()
        .oneshot(send_json("POST", "/logout", json!({}), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, body) = call(&app, get("/me", Some(&token))).await;
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_writes_without_token_are_forbidden() {
    let app = test_app();

    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/books",
            json!({ "title": "Clean Code", "published": 2008, "author": "Robert Martin" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = call(
        &app,
        send_json("POST", "/authors", json!({ "name": "Robert Martin" }), Some("bogus")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = call(&app, get("/books/count", None)).await;
    assert_eq!(body["count"], 0);
    let (_, body) = call(&app, get("/authors/count", None)).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = test_app();
    sign_in(&app).await;

    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/login",
            json!({ "username": "mluukkai", "password": "hunter2" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn test_author_errors() {
    let app = test_app();
    let token = sign_in(&app).await;

    let (status, body) = call(
        &app,
        send_json("POST", "/authors", json!({ "name": "Sandi Metz", "born": 1952 }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["born"], 1952);
    assert_eq!(body["book_count"], 0);

    let (status, body) = call(
        &app,
        send_json("POST", "/authors", json!({ "name": "Sandi Metz" }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, body) = call(
        &app,
        send_json("POST", "/authors", json!({ "name": "Bo" }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = call(
        &app,
        send_json("PUT", "/authors/Sandi%20Metz", json!({ "set_born_to": 1953 }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["born"], 1953);

    let (status, body) = call(
        &app,
        send_json("PUT", "/authors/Nobody%20Here", json!({ "set_born_to": 1900 }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = test_app();
    let token = sign_in(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/books")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = call(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let options = RouterOptions {
        body_limit: 64,
        ..RouterOptions::default()
    };
    let app = create_router_with_options(test_library(), options);

    let title = "x".repeat(256);
    let response = app
        .oneshot(send_json(
            "POST",
            "/authors",
            json!({ "name": title }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/books")
                .header(REQUEST_ID_HEADER, "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "req-42");
}

#[tokio::test]
async fn test_metrics_endpoint_served_when_enabled() {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let options = RouterOptions {
        metrics: Some(MetricsState::new(handle)),
        ..RouterOptions::default()
    };
    let app = create_router_with_options(test_library(), options);

    let response = app.clone().oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let response = test_app().oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Reads SSE frames until one carries `needle`.
async fn next_frame_containing(
    frames: &mut BoxStream<'static, Result<axum::body::Bytes, axum::Error>>,
    needle: &str,
) -> String {
    let read = async {
        let mut seen = String::new();
        while let Some(chunk) = frames.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains(needle) {
                return seen;
            }
        }
        panic!("stream ended before {needle:?}; got {seen:?}");
    };
    tokio::time::timeout(Duration::from_secs(2), read)
        .await
        .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_subscriptions_stream_added_records() {
    let app = test_app();
    let token = sign_in(&app).await;

    let books = app
        .clone()
        .oneshot(get("/subscriptions/books", None))
        .await
        .unwrap();
    assert_eq!(books.status(), StatusCode::OK);
    assert!(books.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let authors = app
        .clone()
        .oneshot(get("/subscriptions/authors", None))
        .await
        .unwrap();

    let mut book_frames = books.into_body().into_data_stream().boxed();
    let mut author_frames = authors.into_body().into_data_stream().boxed();

    add_book(&app, &token, "Clean Code", "Robert Martin", &["refactoring"]).await;

    let frame = next_frame_containing(&mut author_frames, "Robert Martin").await;
    assert!(frame.contains("event: data"));

    let frame = next_frame_containing(&mut book_frames, "Clean Code").await;
    assert!(frame.contains("event: data"));
    assert!(frame.contains("\"book_count\":1"));
}

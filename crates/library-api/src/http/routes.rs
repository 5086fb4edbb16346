//! HTTP route definitions and handlers.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};
use tracing::{error, warn};

use library_server::handlers::mutations::{
    self, AddAuthorInput, AddBookInput, CreateUserInput, EditAuthorInput, LoginInput,
};
use library_server::handlers::queries::{self, AllBooksArgs};
use library_server::handlers::subscriptions;
use library_server::handlers::{AuthorView, BookView, UserView};
use library_server::{Library, LibraryResult, ServerConfig, Token};
use library_storage::DataStore;

use super::error::{ApiError, JsonBadRequest};
use super::extract::{bearer_token, Ctx};
use super::state::AppState;
use crate::middleware::{cors_layer, MetricsLayer, RequestIdLayer, RequestLoggingLayer};
use crate::observability::{metrics_handler, MetricsState};

/// Default request body size limit (64 KiB).
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Default time allowed for a handler to produce its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval of SSE keep-alive comments on idle subscriptions.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

type SharedState<S> = Arc<AppState<S>>;

/// Transport settings for [`create_router_with_options`].
#[derive(Clone)]
pub struct RouterOptions {
    pub body_limit: usize,
    pub request_timeout: Duration,
    /// Serves `/metrics` when set.
    pub metrics: Option<MetricsState>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            metrics: None,
        }
    }
}

impl RouterOptions {
    pub fn from_config(config: &ServerConfig, metrics: Option<MetricsState>) -> Self {
        Self {
            body_limit: config.server.body_limit_bytes,
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
            metrics,
        }
    }
}

/// Queries and mutations. Bounded by the body limit and the request timeout.
fn api_routes<S: DataStore>() -> Router<SharedState<S>> {
    Router::new()
        .route("/books", get(all_books::<S>).post(add_book::<S>))
        .route("/books/count", get(book_count::<S>))
        .route("/books/favorites", get(favorite_books::<S>))
        .route("/genres", get(all_genres::<S>))
        .route("/genres/:genre/books", get(books_by_genre::<S>))
        .route("/authors", get(all_authors::<S>).post(add_author::<S>))
        .route("/authors/count", get(author_count::<S>))
        .route("/authors/:name", put(edit_author::<S>))
        .route("/users", post(create_user::<S>))
        .route("/login", post(login::<S>))
        .route("/logout", post(logout::<S>))
        .route("/me", get(me::<S>))
}

/// Long-lived event streams; the request timeout does not apply.
fn subscription_routes<S: DataStore>() -> Router<SharedState<S>> {
    Router::new()
        .route("/subscriptions/authors", get(author_added::<S>))
        .route("/subscriptions/books", get(book_added::<S>))
}

/// Creates the router with default transport settings and no `/metrics`.
pub fn create_router<S: DataStore>(library: Library<S>) -> Router {
    create_router_with_options(library, RouterOptions::default())
}

/// Creates the router with every endpoint and the middleware stack.
pub fn create_router_with_options<S: DataStore>(
    library: Library<S>,
    options: RouterOptions,
) -> Router {
    let state = Arc::new(AppState::new(library));

    let mut router = api_routes::<S>()
        .layer(TimeoutLayer::new(options.request_timeout))
        .layer(RequestBodyLimitLayer::new(options.body_limit))
        .merge(subscription_routes::<S>())
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<S>))
        .with_state(state);

    if let Some(metrics_state) = options.metrics {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics_state),
        );
    }

    // Last layer is outermost.
    router
        .layer(cors_layer())
        .layer(RequestLoggingLayer::new())
        .layer(MetricsLayer::default())
        .layer(RequestIdLayer::new())
}

// ============================================================
// Health
// ============================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// 200 when the store reports healthy, 503 otherwise. Failure details are
/// logged, not returned.
async fn readiness_check<S: DataStore>(State(state): State<SharedState<S>>) -> impl IntoResponse {
    let storage = match state.library.store().health_check().await {
        Ok(status) if status.healthy => Ok(()),
        Ok(status) => Err(status.message.unwrap_or_default()),
        Err(e) => Err(e.to_string()),
    };

    match storage {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "checks": { "storage": "ok" }
            })),
        ),
        Err(reason) => {
            error!(reason = %reason, "readiness check failed: storage unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "checks": { "storage": "unavailable" }
                })),
            )
        }
    }
}

// ============================================================
// Queries
// ============================================================

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

async fn book_count<S: DataStore>(Ctx(ctx): Ctx<S>) -> Result<Json<CountResponse>, ApiError> {
    let count = queries::book_count(&ctx).await?;
    Ok(Json(CountResponse { count }))
}

async fn author_count<S: DataStore>(Ctx(ctx): Ctx<S>) -> Result<Json<CountResponse>, ApiError> {
    let count = queries::author_count(&ctx).await?;
    Ok(Json(CountResponse { count }))
}

async fn all_books<S: DataStore>(
    Ctx(ctx): Ctx<S>,
    Query(args): Query<AllBooksArgs>,
) -> Result<Json<Vec<BookView>>, ApiError> {
    Ok(Json(queries::all_books(&ctx, args).await?))
}

async fn all_authors<S: DataStore>(Ctx(ctx): Ctx<S>) -> Result<Json<Vec<AuthorView>>, ApiError> {
    Ok(Json(queries::all_authors(&ctx).await?))
}

async fn all_genres<S: DataStore>(Ctx(ctx): Ctx<S>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(queries::all_genres(&ctx).await?))
}

async fn books_by_genre<S: DataStore>(
    Ctx(ctx): Ctx<S>,
    Path(genre): Path<String>,
) -> Result<Json<Vec<BookView>>, ApiError> {
    Ok(Json(queries::books_by_genre(&ctx, &genre).await?))
}

async fn favorite_books<S: DataStore>(Ctx(ctx): Ctx<S>) -> Result<Json<Vec<BookView>>, ApiError> {
    Ok(Json(queries::favorite_books(&ctx).await?))
}

/// `null` for anonymous callers.
async fn me<S: DataStore>(Ctx(ctx): Ctx<S>) -> Result<Json<Option<UserView>>, ApiError> {
    Ok(Json(queries::me(&ctx).await?))
}

// ============================================================
// Mutations
// ============================================================

async fn add_book<S: DataStore>(
    State(state): State<SharedState<S>>,
    Ctx(ctx): Ctx<S>,
    JsonBadRequest(input): JsonBadRequest<AddBookInput>,
) -> Result<(StatusCode, Json<BookView>), ApiError> {
    let book = mutations::add_book(&ctx, state.library.bus(), input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn add_author<S: DataStore>(
    State(state): State<SharedState<S>>,
    Ctx(ctx): Ctx<S>,
    JsonBadRequest(input): JsonBadRequest<AddAuthorInput>,
) -> Result<(StatusCode, Json<AuthorView>), ApiError> {
    let author = mutations::add_author(&ctx, state.library.bus(), input).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[derive(Debug, Deserialize)]
pub struct EditAuthorRequest {
    pub set_born_to: i32,
}

async fn edit_author<S: DataStore>(
    Ctx(ctx): Ctx<S>,
    Path(name): Path<String>,
    JsonBadRequest(request): JsonBadRequest<EditAuthorRequest>,
) -> Result<Json<AuthorView>, ApiError> {
    let input = EditAuthorInput {
        name,
        set_born_to: request.set_born_to,
    };
    Ok(Json(mutations::edit_author(&ctx, input).await?))
}

async fn create_user<S: DataStore>(
    Ctx(ctx): Ctx<S>,
    JsonBadRequest(input): JsonBadRequest<CreateUserInput>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let user = mutations::create_user(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login<S: DataStore>(
    State(state): State<SharedState<S>>,
    JsonBadRequest(input): JsonBadRequest<LoginInput>,
) -> Result<Json<Token>, ApiError> {
    Ok(Json(mutations::login(state.library.sessions(), input).await?))
}

/// Ends the caller's session. Unknown tokens are ignored.
async fn logout<S: DataStore>(
    State(state): State<SharedState<S>>,
    headers: axum::http::HeaderMap,
) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        state.library.sessions().logout(token);
    }
    StatusCode::NO_CONTENT
}

// ============================================================
// Subscriptions
// ============================================================

async fn author_added<S: DataStore>(
    State(state): State<SharedState<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(subscriptions::author_added(&state.library))
}

async fn book_added<S: DataStore>(
    State(state): State<SharedState<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(subscriptions::book_added(&state.library))
}

/// Frames resolved views as SSE `data` events. A view that fails to resolve
/// becomes an `error` event and the stream continues.
fn event_stream<T>(
    views: BoxStream<'static, LibraryResult<T>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    let events = views.map(|view| {
        let payload = view
            .map_err(|e| ApiError::from(e).message)
            .and_then(|view| serde_json::to_string(&view).map_err(|e| e.to_string()));

        let event = match payload {
            Ok(data) => Event::default().event("data").data(data),
            Err(message) => {
                warn!(error = %message, "subscription event could not be resolved");
                Event::default().event("error").data(message)
            }
        };
        Ok::<_, Infallible>(event)
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

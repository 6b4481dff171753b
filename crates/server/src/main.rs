use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::Context;
use auth::{Credentials, JwtSessionProvider};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use cms::{CmsClient, HttpCms, HttpCmsConfig, SqliteCms};
use futures::{stream, StreamExt};
use serde::Deserialize;
use shared::{
    domain::{AuthorId, StartupId},
    error::{ApiError, ErrorCode},
    protocol::{ActionState, CreatePitchRequest},
};
use site_api::{
    create_pitch, detail_page, list_page, profile_page, ApiContext, DeferredWork, HttpImageProbe,
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod after_response;
mod app_state;
mod config;
mod render;

use app_state::AppState;
use config::{load_settings, prepare_database_url, ContentBackend, Settings};

const MAX_PITCH_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let state = build_state(&settings).await?;
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, backend = ?settings.content_backend, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
    let (cms, store) = match settings.content_backend {
        ContentBackend::Http => {
            let http = HttpCms::new(HttpCmsConfig {
                project_id: settings.cms_project_id.clone(),
                dataset: settings.cms_dataset.clone(),
                api_version: settings.cms_api_version.clone(),
                token: settings.cms_token.clone(),
                use_cdn: settings.cms_use_cdn,
                base_url: settings.cms_base_url.clone(),
            })?;
            (CmsClient::from_backend(http), None)
        }
        ContentBackend::Sqlite => {
            let database_url = prepare_database_url(&settings.database_url)?;
            info!(%database_url, "using local content store");
            let store = SqliteCms::connect(&database_url).await?;
            (CmsClient::from_backend(store.clone()), Some(store))
        }
    };
    let sessions = JwtSessionProvider::new(&settings.session_secret)?;

    let mut api = ApiContext::new(cms, Arc::new(sessions));
    api.editor_picks_slug = settings.editor_picks_slug.clone();
    if settings.verify_image_links {
        api.image_probe = Some(Arc::new(HttpImageProbe::default()));
    }
    Ok(AppState { api, store })
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(http_list_startups))
        .route(
            "/startup/:id",
            get(http_startup_detail)
                .layer(middleware::from_fn(after_response::run_after_response)),
        )
        .route("/user/:id", get(http_user_profile))
        .route(
            "/startup/create",
            post(http_create_pitch).layer(RequestBodyLimitLayer::new(MAX_PITCH_BODY_BYTES)),
        )
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    if let Some(store) = &state.store {
        if let Err(err) = store.health_check().await {
            error!(error = %err, "content store unavailable");
            return (StatusCode::SERVICE_UNAVAILABLE, "content store unavailable").into_response();
        }
    }
    "ok".into_response()
}

async fn http_list_startups(
    State(state): State<Arc<AppState>>,
    Query(search): Query<SearchQuery>,
) -> Response {
    match list_page(&state.api, search.query.as_deref()).await {
        Ok(page) => Html(render::list_page(&page)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Streams the page shell first and the view counter second. Anything the
/// counter schedules runs once the whole body has gone out.
async fn http_startup_detail(
    State(state): State<Arc<AppState>>,
    Extension(deferred): Extension<DeferredWork>,
    Path(id): Path<String>,
) -> Response {
    let page = match detail_page(&state.api, &StartupId::new(id)).await {
        Ok(page) => page,
        Err(err) => return error_response(err),
    };

    let shell = render::detail_shell(&page);
    let counter = page.views;
    let api = state.api.clone();
    let views = async move {
        let fragment = match counter.resolve(&api, &deferred).await {
            Ok(count) => render::views_fragment(&count),
            Err(err) => {
                warn!(id = %counter.id, error = %err, "view counter unavailable");
                render::views_unavailable()
            }
        };
        Ok::<_, Infallible>(fragment)
    };

    let body = stream::iter([Ok::<_, Infallible>(shell)]).chain(stream::once(views));
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

async fn http_user_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match profile_page(&state.api, &AuthorId::new(id)).await {
        Ok(page) => Html(render::profile_page(&page)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn http_create_pitch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreatePitchRequest>,
) -> Json<ActionState> {
    let credentials = Credentials::from_headers(
        header_str(&headers, header::AUTHORIZATION),
        header_str(&headers, header::COOKIE),
    );
    Json(create_pitch(&state.api, &credentials, &request.form, &request.pitch).await)
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn error_response(err: ApiError) -> Response {
    let (status, title) = match err.code {
        ErrorCode::NotFound => (StatusCode::NOT_FOUND, "Not found"),
        ErrorCode::Unauthorized => (StatusCode::UNAUTHORIZED, "Not signed in"),
        ErrorCode::Validation => (StatusCode::BAD_REQUEST, "Invalid request"),
        ErrorCode::Upstream => (StatusCode::BAD_GATEWAY, "Content unavailable"),
        ErrorCode::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong"),
    };
    if status.is_server_error() {
        error!(code = ?err.code, message = %err.message, "request failed");
    }
    (status, Html(render::error_page(title, &err.message))).into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

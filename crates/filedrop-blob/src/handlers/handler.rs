//! HTTP handlers for the file pages and operational probes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tower_cookies::{CookieManagerLayer, Cookies};
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::flash::{set_flash, take_flash};
use super::types::*;
use super::views;
use crate::services::PageOutcome;

/// OpenAPI documentation for the JSON endpoints
#[derive(OpenApi)]
#[openapi(
    paths(health_check, app_info),
    components(schemas(HealthResponse, ServicesStatus, ServiceState, InfoResponse)),
    tags((name = "Operations", description = "Health and deployment metadata"))
)]
pub struct FileDropApiDoc;

/// Configure file and probe routes
pub fn configure_routes() -> Router<Arc<FileDropAppState>> {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_file))
        .route("/files", get(list_files))
        .route("/files/{filename}", get(view_file))
        .route("/health", get(health_check))
        .route("/info", get(app_info))
}

/// Complete application router: routes, flash cookies and API docs
pub fn app(state: Arc<FileDropAppState>) -> Router {
    configure_routes()
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", FileDropApiDoc::openapi()))
        .layer(CookieManagerLayer::new())
}

/// Turn a page outcome into a response, moving flash messages into the cookie
fn render(outcome: PageOutcome, cookies: &Cookies) -> Response {
    match outcome {
        PageOutcome::Redirect { to, flash } => {
            debug!("Redirecting to {} with {} message", to, flash.level.as_str());
            set_flash(cookies, &flash);
            Redirect::to(to).into_response()
        }
        PageOutcome::Files(names) => {
            let flash = take_flash(cookies);
            Html(views::files_page(&names, flash.as_ref())).into_response()
        }
        PageOutcome::File { name, content } => {
            let flash = take_flash(cookies);
            Html(views::file_page(&name, &content, flash.as_ref())).into_response()
        }
    }
}

async fn index(cookies: Cookies) -> Html<String> {
    let flash = take_flash(&cookies);
    Html(views::index_page(flash.as_ref()))
}

async fn upload_file(
    State(state): State<Arc<FileDropAppState>>,
    cookies: Cookies,
    form: UploadForm,
) -> Response {
    let outcome = state
        .file_service
        .upload(form.filename.as_deref(), form.file_content.as_deref())
        .await;
    render(outcome, &cookies)
}

async fn list_files(State(state): State<Arc<FileDropAppState>>, cookies: Cookies) -> Response {
    let outcome = state.file_service.list_files().await;
    render(outcome, &cookies)
}

async fn view_file(
    State(state): State<Arc<FileDropAppState>>,
    cookies: Cookies,
    Path(filename): Path<String>,
) -> Response {
    let outcome = state.file_service.view_file(&filename).await;
    render(outcome, &cookies)
}

/// Storage and application health
#[utoipa::path(
    tag = "Operations",
    get,
    path = "/health",
    responses(
        (status = 200, description = "Storage is reachable", body = HealthResponse),
        (status = 503, description = "Storage is unreachable", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<Arc<FileDropAppState>>) -> impl IntoResponse {
    let status = state.file_service.health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(HealthResponse::from(status)))
}

/// Deployment metadata for monitoring and debugging
#[utoipa::path(
    tag = "Operations",
    get,
    path = "/info",
    responses(
        (status = 200, description = "Application metadata", body = InfoResponse)
    )
)]
async fn app_info(State(state): State<Arc<FileDropAppState>>) -> Json<InfoResponse> {
    Json(InfoResponse::from(state.config.as_ref()))
}

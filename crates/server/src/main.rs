use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post, put},
    Json, Router,
};
use sections::{
    config::SectionsConfig, controller::ControllerRegistry, links::Hooks,
    permissions::StaticPermissions, render::SectionEnv, templates::TemplateSet,
};
use serde::Deserialize;
use server_api::{
    create_page, create_section, delete_section, handle_section, list_areas, list_pages,
    list_section_types, list_sections, provide_permissions, render_area, render_standalone,
    save_page, update_section, ApiContext,
};
use shared::{
    domain::{PageId, PageSummary, SectionId, Viewport},
    error::{ApiError, ErrorCode},
    protocol::{
        AreaSummary, CreatePageRequest, CreateSectionRequest, PermissionDescriptor,
        SavePageRequest, SectionSummary, SectionTypeSummary, UpdateSectionRequest,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

mod config;
mod linker;

use config::{load_settings, prepare_database_url, Settings};
use linker::PublicLinker;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[derive(Debug, Deserialize)]
struct RenderQuery {
    #[serde(default)]
    viewport: Viewport,
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct SectionTypesQuery {
    page_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActorQuery {
    actor: String,
}

#[derive(Debug, Deserialize)]
struct StandaloneQuery {
    #[serde(default)]
    data: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

const MAX_BODY_BYTES: usize = 256 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = build_context(storage, &settings)?;

    let state = AppState { api };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_context(storage: Storage, settings: &Settings) -> anyhow::Result<ApiContext> {
    let config = match std::fs::read_to_string(&settings.sections_config) {
        Ok(raw) => SectionsConfig::from_toml_str(&raw)?,
        Err(error) => {
            warn!(
                path = %settings.sections_config.display(),
                %error,
                "sections configuration not readable; only the root section type is registered"
            );
            SectionsConfig::default()
        }
    };
    let registry = config.build_registry()?;

    let templates = if settings.templates_dir.is_dir() {
        TemplateSet::from_dir(&settings.templates_dir)?
    } else {
        warn!(
            path = %settings.templates_dir.display(),
            "template directory missing; sections will not render"
        );
        TemplateSet::new()
    };

    let controllers = ControllerRegistry::with_default();
    controllers
        .validate()
        .context("controller registry is missing the default controller")?;

    let linker = PublicLinker::new(settings.server_public_url.as_deref())?;
    info!(
        section_types = registry.types().count(),
        templates = templates.len(),
        "section registry ready"
    );

    Ok(ApiContext {
        storage,
        env: SectionEnv {
            registry: Arc::new(registry),
            controllers: Arc::new(controllers),
            templates: Arc::new(templates),
            linker: Arc::new(linker),
            hooks: Arc::new(Hooks::new()),
        },
        config: Arc::new(config),
        permissions: Arc::new(StaticPermissions::new(settings.grants.clone())),
    })
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/pages", get(http_list_pages).post(http_create_page))
        .route("/pages/:page_id/save", post(http_save_page))
        .route("/pages/:page_id/areas", get(http_list_areas))
        .route("/pages/:page_id/areas/:slug", get(http_render_area))
        .route(
            "/pages/:page_id/areas/:slug/sections",
            get(http_list_sections).post(http_create_section),
        )
        .route(
            "/pages/:page_id/sections/:section_id",
            put(http_update_section).delete(http_delete_section),
        )
        .route("/pages/:page_id/section/:section_id", get(http_section_index))
        .route(
            "/pages/:page_id/section/:section_id/*action",
            get(http_section_action),
        )
        .route("/pages/:page_id/standalone/:type_id", get(http_standalone))
        .route("/section_types", get(http_section_types))
        .route("/permissions", get(http_permissions))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn api_error(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_list_pages(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<PageSummary>>> {
    let pages = list_pages(&state.api).await.map_err(api_error)?;
    Ok(Json(pages))
}

async fn http_create_page(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePageRequest>,
) -> ApiResult<(StatusCode, Json<PageSummary>)> {
    let page = create_page(
        &state.api,
        &req.page_type,
        &req.url_segment,
        &req.title,
        &req.fields,
    )
    .await
    .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn http_save_page(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<i64>,
    Json(req): Json<SavePageRequest>,
) -> ApiResult<Json<Vec<AreaSummary>>> {
    let areas = save_page(&state.api, PageId(page_id), req)
        .await
        .map_err(api_error)?;
    Ok(Json(areas))
}

async fn http_list_areas(
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<i64>,
) -> ApiResult<Json<Vec<AreaSummary>>> {
    let areas = list_areas(&state.api, PageId(page_id))
        .await
        .map_err(api_error)?;
    Ok(Json(areas))
}

async fn http_render_area(
    State(state): State<Arc<AppState>>,
    Path((page_id, slug)): Path<(i64, String)>,
    Query(q): Query<RenderQuery>,
) -> ApiResult<Html<String>> {
    let rendered = render_area(&state.api, PageId(page_id), &slug, q.viewport, q.offset)
        .await
        .map_err(api_error)?;
    Ok(Html(rendered.html))
}

async fn http_list_sections(
    State(state): State<Arc<AppState>>,
    Path((page_id, slug)): Path<(i64, String)>,
) -> ApiResult<Json<Vec<SectionSummary>>> {
    let sections = list_sections(&state.api, PageId(page_id), &slug)
        .await
        .map_err(api_error)?;
    Ok(Json(sections))
}

async fn http_create_section(
    State(state): State<Arc<AppState>>,
    Path((page_id, slug)): Path<(i64, String)>,
    Json(req): Json<CreateSectionRequest>,
) -> ApiResult<(StatusCode, Json<SectionSummary>)> {
    let section = create_section(&state.api, PageId(page_id), &slug, req)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(section)))
}

async fn http_update_section(
    State(state): State<Arc<AppState>>,
    Path((page_id, section_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateSectionRequest>,
) -> ApiResult<Json<SectionSummary>> {
    let section = update_section(&state.api, PageId(page_id), SectionId(section_id), req)
        .await
        .map_err(api_error)?;
    Ok(Json(section))
}

async fn http_delete_section(
    State(state): State<Arc<AppState>>,
    Path((page_id, section_id)): Path<(i64, i64)>,
    Query(q): Query<ActorQuery>,
) -> ApiResult<StatusCode> {
    delete_section(&state.api, PageId(page_id), SectionId(section_id), &q.actor)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_section_index(
    State(state): State<Arc<AppState>>,
    Path((page_id, section_id)): Path<(i64, i64)>,
) -> ApiResult<Html<String>> {
    let html = handle_section(&state.api, PageId(page_id), &format!("section/{section_id}"))
        .await
        .map_err(api_error)?;
    Ok(Html(html))
}

async fn http_section_action(
    State(state): State<Arc<AppState>>,
    Path((page_id, section_id, action)): Path<(i64, i64, String)>,
) -> ApiResult<Html<String>> {
    let sub_path = format!("section/{section_id}/{action}");
    let html = handle_section(&state.api, PageId(page_id), &sub_path)
        .await
        .map_err(api_error)?;
    Ok(Html(html))
}

async fn http_standalone(
    State(state): State<Arc<AppState>>,
    Path((page_id, type_id)): Path<(i64, String)>,
    Query(q): Query<StandaloneQuery>,
) -> ApiResult<Html<String>> {
    let html = render_standalone(&state.api, PageId(page_id), &type_id, &q.data)
        .await
        .map_err(api_error)?;
    Ok(Html(html))
}

async fn http_section_types(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SectionTypesQuery>,
) -> Json<Vec<SectionTypeSummary>> {
    Json(list_section_types(&state.api, q.page_type.as_deref()))
}

async fn http_permissions(State(state): State<Arc<AppState>>) -> Json<Vec<PermissionDescriptor>> {
    Json(provide_permissions(&state.api))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

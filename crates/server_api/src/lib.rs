use std::{collections::BTreeMap, sync::Arc};

use sections::{
    area::{Area, AreaRecord},
    composition::SectionedPage,
    config::SectionsConfig,
    error::SectionError,
    page::PageRef,
    permissions::{self, PermissionChecker, SectionAction},
    render::SectionEnv,
    section::SectionRecord,
    store::{SectionStore, SectionWrite},
};
use shared::{
    domain::{PageId, PageSummary, SectionId, Viewport},
    error::{ApiError, ErrorCode},
    protocol::{
        AreaSummary, CreateSectionRequest, PermissionDescriptor, RenderedArea, SavePageRequest,
        SectionSummary, SectionTypeSummary, UpdateSectionRequest,
    },
};
use storage::Storage;
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub env: SectionEnv,
    pub config: Arc<SectionsConfig>,
    pub permissions: Arc<dyn PermissionChecker>,
}

pub async fn create_page(
    ctx: &ApiContext,
    page_type: &str,
    url_segment: &str,
    title: &str,
    fields: &BTreeMap<String, String>,
) -> Result<PageSummary, ApiError> {
    let segment = url_segment.trim_matches('/');
    if segment.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "url segment is required"));
    }
    let page = ctx
        .storage
        .create_page(page_type, segment, title, fields)
        .await
        .map_err(internal)?;
    build_areas(ctx, &page, &BTreeMap::new()).await?;
    info!(page_id = %page.id, page_type, url_segment = segment, "created page");
    Ok(page_summary(&page))
}

pub async fn list_pages(ctx: &ApiContext) -> Result<Vec<PageSummary>, ApiError> {
    ctx.storage.list_pages().await.map_err(internal)
}

/// Page save: makes sure every configured area exists, applying any
/// explicit mobile-sort switches.
pub async fn save_page(
    ctx: &ApiContext,
    page_id: PageId,
    request: SavePageRequest,
) -> Result<Vec<AreaSummary>, ApiError> {
    let page = find_page(ctx, page_id).await?;
    build_areas(ctx, &page, &request.allow_mobile_sort).await
}

async fn build_areas(
    ctx: &ApiContext,
    page: &PageRef,
    allow_mobile_sort: &BTreeMap<String, bool>,
) -> Result<Vec<AreaSummary>, ApiError> {
    let mut summaries = Vec::new();
    for slot in ctx.config.areas_for(&page.page_type) {
        let area = ctx
            .storage
            .upsert_area(
                page.id,
                &slot,
                allow_mobile_sort.get(&slot.slug).copied(),
                &*ctx.env.registry,
            )
            .await
            .map_err(internal)?;
        summaries.push(area_summary(ctx, area).await?);
    }
    Ok(summaries)
}

pub async fn list_areas(ctx: &ApiContext, page_id: PageId) -> Result<Vec<AreaSummary>, ApiError> {
    find_page(ctx, page_id).await?;
    let areas = ctx.storage.list_areas(page_id).await.map_err(internal)?;
    let mut summaries = Vec::with_capacity(areas.len());
    for area in areas {
        summaries.push(area_summary(ctx, area).await?);
    }
    Ok(summaries)
}

/// Sections of one area in desktop order.
pub async fn list_sections(
    ctx: &ApiContext,
    page_id: PageId,
    slug: &str,
) -> Result<Vec<SectionSummary>, ApiError> {
    let page = find_page(ctx, page_id).await?;
    let area = find_area(ctx, &page, slug).await?;
    let records = ctx.storage.load_sections(area.id).await.map_err(internal)?;
    let loaded = Area::new(area, records);
    Ok(sections::ordering::order_desktop(&loaded)
        .into_iter()
        .map(|placement| section_summary(ctx, &page, &loaded.record, placement.section.record()))
        .collect())
}

pub async fn create_section(
    ctx: &ApiContext,
    page_id: PageId,
    slug: &str,
    request: CreateSectionRequest,
) -> Result<SectionSummary, ApiError> {
    let page = find_page(ctx, page_id).await?;
    let area = find_area(ctx, &page, slug).await?;
    authorize(ctx, &request.type_id, SectionAction::Create, &request.actor)?;

    let registry = &*ctx.env.registry;
    registry.get(&request.type_id).map_err(section_error)?;
    let policy = ctx.config.page_policy(&page.page_type);
    if !registry
        .allowed_sections(&policy)
        .iter()
        .any(|allowed| *allowed == request.type_id)
    {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!(
                "section type '{}' cannot be created on '{}' pages",
                request.type_id, page.page_type
            ),
        ));
    }

    let mut record = SectionRecord::new(SectionId(0), request.type_id, area.id);
    record.apply(request.fields);
    record.validate(registry).map_err(section_error)?;

    let section_id = ctx
        .storage
        .write_section(SectionWrite::Insert(record), registry)
        .await
        .map_err(internal)?;
    info!(%section_id, page_id = %page.id, area = slug, actor = %request.actor, "created section");
    let stored = find_section(ctx, section_id).await?;
    Ok(section_summary(ctx, &page, &area, &stored))
}

pub async fn update_section(
    ctx: &ApiContext,
    page_id: PageId,
    section_id: SectionId,
    request: UpdateSectionRequest,
) -> Result<SectionSummary, ApiError> {
    let page = find_page(ctx, page_id).await?;
    let (area, mut record) = find_page_section(ctx, &page, section_id).await?;
    authorize(ctx, &record.type_id, SectionAction::Edit, &request.actor)?;

    let registry = &*ctx.env.registry;
    record.apply(request.fields);
    record.validate(registry).map_err(section_error)?;
    ctx.storage
        .write_section(SectionWrite::Update(record), registry)
        .await
        .map_err(internal)?;
    info!(%section_id, page_id = %page.id, actor = %request.actor, "updated section");

    let stored = find_section(ctx, section_id).await?;
    Ok(section_summary(ctx, &page, &area, &stored))
}

pub async fn delete_section(
    ctx: &ApiContext,
    page_id: PageId,
    section_id: SectionId,
    actor: &str,
) -> Result<(), ApiError> {
    let page = find_page(ctx, page_id).await?;
    let (_, record) = find_page_section(ctx, &page, section_id).await?;
    authorize(ctx, &record.type_id, SectionAction::Delete, actor)?;
    ctx.storage
        .write_section(SectionWrite::Delete(section_id), &*ctx.env.registry)
        .await
        .map_err(internal)?;
    info!(%section_id, page_id = %page.id, actor, "deleted section");
    Ok(())
}

/// Loads a page with every configured area that has been built.
pub async fn load_page(ctx: &ApiContext, page_id: PageId) -> Result<SectionedPage, ApiError> {
    let page = find_page(ctx, page_id).await?;
    let slots = ctx.config.areas_for(&page.page_type);
    let mut areas = Vec::with_capacity(slots.len());
    for slot in &slots {
        let Some(area) = ctx
            .storage
            .find_area(page.id, &slot.slug)
            .await
            .map_err(internal)?
        else {
            continue;
        };
        let records = ctx.storage.load_sections(area.id).await.map_err(internal)?;
        areas.push(Area::new(area, records));
    }
    Ok(SectionedPage::new(page, slots, areas))
}

pub async fn render_area(
    ctx: &ApiContext,
    page_id: PageId,
    slug: &str,
    viewport: Viewport,
    offset: usize,
) -> Result<RenderedArea, ApiError> {
    let mut page = load_page(ctx, page_id).await?;
    let html = page.render_area(slug, viewport, offset, &ctx.env);
    Ok(RenderedArea {
        page_id,
        slug: slug.to_string(),
        viewport,
        html,
    })
}

/// Routing handoff for `section/{id}/{action}`. A miss is `NotFound`.
pub async fn handle_section(
    ctx: &ApiContext,
    page_id: PageId,
    sub_path: &str,
) -> Result<String, ApiError> {
    let mut page = load_page(ctx, page_id).await?;
    page.handle_section(sub_path, &ctx.env)
        .map_err(section_error)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "no section handles this route"))
}

/// Renders an unsaved section of `type_id` against a page, with
/// `key=value` customisations.
pub async fn render_standalone(
    ctx: &ApiContext,
    page_id: PageId,
    type_id: &str,
    data: &str,
) -> Result<String, ApiError> {
    let page = find_page(ctx, page_id).await?;
    let scope = ctx.env.scope(&page);
    sections::render::render_standalone(type_id, data, &scope).map_err(section_error)
}

/// Creatable section types, narrowed to a page type when one is given.
pub fn list_section_types(ctx: &ApiContext, page_type: Option<&str>) -> Vec<SectionTypeSummary> {
    let registry = &*ctx.env.registry;
    let policy = match page_type {
        Some(page_type) => ctx.config.page_policy(page_type),
        None => ctx.config.global_policy(),
    };
    registry
        .allowed_sections(&policy)
        .iter()
        .filter_map(|id| registry.get(id).ok())
        .map(|section_type| SectionTypeSummary {
            type_id: section_type.id.clone(),
            label: section_type.label().to_string(),
            parent: section_type.parent.clone(),
            layouts: section_type.layouts.clone(),
            colors: section_type.colors.clone(),
        })
        .collect()
}

pub fn provide_permissions(ctx: &ApiContext) -> Vec<PermissionDescriptor> {
    permissions::provide_permissions(&ctx.env.registry)
}

async fn find_page(ctx: &ApiContext, page_id: PageId) -> Result<PageRef, ApiError> {
    ctx.storage
        .find_page(page_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "page not found"))
}

async fn find_area(ctx: &ApiContext, page: &PageRef, slug: &str) -> Result<AreaRecord, ApiError> {
    if !ctx.config.declares_area(&page.page_type, slug) {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("area '{slug}' is not configured for '{}' pages", page.page_type),
        ));
    }
    ctx.storage
        .find_area(page.id, slug)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "area has not been built yet"))
}

async fn find_section(ctx: &ApiContext, section_id: SectionId) -> Result<SectionRecord, ApiError> {
    ctx.storage
        .find_section(section_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "section not found"))
}

/// A section together with its area, provided both belong to `page`.
async fn find_page_section(
    ctx: &ApiContext,
    page: &PageRef,
    section_id: SectionId,
) -> Result<(AreaRecord, SectionRecord), ApiError> {
    let record = find_section(ctx, section_id).await?;
    let area = ctx
        .storage
        .list_areas(page.id)
        .await
        .map_err(internal)?
        .into_iter()
        .find(|area| area.id == record.area_id)
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "section not found on this page"))?;
    Ok((area, record))
}

fn authorize(
    ctx: &ApiContext,
    type_id: &str,
    action: SectionAction,
    actor: &str,
) -> Result<(), ApiError> {
    if permissions::can(ctx.permissions.as_ref(), type_id, action, actor) {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::Forbidden,
            format!("'{actor}' may not {} '{type_id}' sections", action.to_string().to_lowercase()),
        ))
    }
}

async fn area_summary(ctx: &ApiContext, area: AreaRecord) -> Result<AreaSummary, ApiError> {
    let section_count = ctx
        .storage
        .load_sections(area.id)
        .await
        .map_err(internal)?
        .len();
    Ok(AreaSummary {
        area_id: area.id,
        page_id: area.page_id,
        slug: area.slug,
        title: area.title,
        allow_mobile_sort: area.allow_mobile_sort,
        search_index: area.search_index,
        section_count,
    })
}

fn section_summary(
    ctx: &ApiContext,
    page: &PageRef,
    area: &AreaRecord,
    record: &SectionRecord,
) -> SectionSummary {
    let scope = ctx.env.scope(page);
    let type_label = ctx
        .env
        .registry
        .get(&record.type_id)
        .map(|section_type| section_type.label().to_string())
        .unwrap_or_else(|_| record.type_id.clone());
    SectionSummary {
        section_id: record.id,
        area_id: record.area_id,
        type_id: record.type_id.clone(),
        type_label,
        title: record.title.clone(),
        sort: record.sort,
        mobile_sort: record.mobile_sort,
        show_for_desktop: record.show_for_desktop,
        show_for_mobile: record.show_for_mobile,
        title_hide: record.title_hide,
        title_semantic: record.title_semantic.clone(),
        layout: record.layout.clone(),
        color: record.color.clone(),
        anchor: record.anchor(),
        link: record.link(&scope, None),
        edit_link: record.edit_link(area, &scope),
        updated_at: record.updated_at,
    }
}

fn page_summary(page: &PageRef) -> PageSummary {
    PageSummary {
        page_id: page.id,
        page_type: page.page_type.clone(),
        url_segment: page.url_segment.clone(),
        title: page.title.clone(),
    }
}

fn section_error(err: SectionError) -> ApiError {
    let code = match &err {
        SectionError::UnknownType(_) | SectionError::InvalidOption { .. } => ErrorCode::Validation,
        SectionError::NoTemplateFound { .. }
        | SectionError::ControllerResolution { .. }
        | SectionError::Template { .. } => ErrorCode::Internal,
    };
    ApiError::new(code, err.to_string())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

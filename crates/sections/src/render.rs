use std::sync::Arc;

use serde_json::{json, Value};
use shared::domain::{AreaId, SectionId, Viewport};
use tracing::warn;

use crate::{
    area::{Area, AreaRecord},
    cascade,
    controller::{BoundController, ControllerRegistry},
    error::SectionError,
    links::{self, Hooks},
    ordering,
    page::{PageLinker, PageRef},
    registry::TypeRegistry,
    section::SectionRecord,
    templates::{RenderContext, TemplateEngine},
};

pub const AREA_CONTAINER_CLASS: &str = "sections";

/// Process-wide collaborators, built once at startup and shared by every
/// request.
#[derive(Clone)]
pub struct SectionEnv {
    pub registry: Arc<TypeRegistry>,
    pub controllers: Arc<ControllerRegistry>,
    pub templates: Arc<dyn TemplateEngine>,
    pub linker: Arc<dyn PageLinker>,
    pub hooks: Arc<Hooks>,
}

impl SectionEnv {
    pub fn scope<'a>(&'a self, page: &'a PageRef) -> RenderScope<'a> {
        RenderScope { env: self, page }
    }
}

/// Everything a render or routing call needs for one page.
#[derive(Clone, Copy)]
pub struct RenderScope<'a> {
    env: &'a SectionEnv,
    page: &'a PageRef,
}

impl<'a> RenderScope<'a> {
    pub fn page(&self) -> &'a PageRef {
        self.page
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        &self.env.registry
    }

    pub fn controllers(&self) -> &'a ControllerRegistry {
        &self.env.controllers
    }

    pub fn templates(&self) -> &'a dyn TemplateEngine {
        self.env.templates.as_ref()
    }

    pub fn linker(&self) -> &'a dyn PageLinker {
        self.env.linker.as_ref()
    }

    pub fn hooks(&self) -> &'a Hooks {
        &self.env.hooks
    }
}

/// Renders an area's sections for one viewport. An absent area renders
/// nothing. Positions count visible sections only, starting after `offset`.
/// A section that fails to render is logged and left out.
pub fn render_area(
    area: Option<&mut Area>,
    viewport: Viewport,
    offset: usize,
    scope: &RenderScope<'_>,
) -> String {
    let Some(area) = area else {
        return String::new();
    };

    let visible: Vec<usize> =
        ordering::ordered_indices(&area.sections, viewport, area.record.allow_mobile_sort)
            .into_iter()
            .filter(|&i| ordering::is_visible(area.sections[i].record(), viewport))
            .collect();
    let total = visible.len() + offset;

    let mut fragments = Vec::with_capacity(visible.len());
    for (i, index) in visible.into_iter().enumerate() {
        let section = &mut area.sections[index];
        let section_id = section.id();
        let rendered = section
            .controller(scope.registry(), scope.controllers())
            .map(|bound| bound.place(i + 1 + offset, total))
            .and_then(|()| section.render(Some(&area.record), scope));
        match rendered {
            Ok(html) => fragments.push(html),
            Err(error) => {
                warn!(
                    %section_id,
                    area = %area.record.slug,
                    %error,
                    "skipping section that failed to render"
                );
            }
        }
    }

    format!(
        "<div class=\"{AREA_CONTAINER_CLASS}\">{}</div>",
        fragments.concat()
    )
}

/// Standard template context for a bound section.
pub fn section_context(
    bound: &BoundController,
    section: &SectionRecord,
    area: Option<&AreaRecord>,
    scope: &RenderScope<'_>,
) -> Result<RenderContext, SectionError> {
    let section_type = scope.registry().get(&section.type_id)?;
    let templates = scope.templates();
    let escaped_title = templates.escape(&section.title);
    let anchor = section.anchor();
    let class = links::css_class(section_type);
    let allow_mobile_sort = area.is_some_and(|a| a.allow_mobile_sort);

    let mut context = RenderContext::new();
    for (key, value) in &section.extra {
        let value = match value {
            Value::String(text) => Value::String(templates.escape(text)),
            other => other.clone(),
        };
        context.insert(key.clone(), value);
    }

    let title = bound.title_element(section, section_type, &escaped_title);
    let section_link = section.link(scope, None);

    let standard = [
        ("ID", json!(section.id.0)),
        ("Type", json!(section.type_id)),
        ("Title", json!(title.unwrap_or_default())),
        ("TitleText", json!(escaped_title)),
        ("Anchor", json!(anchor)),
        ("AnchorAttr", json!(format!("id=\"{anchor}\""))),
        ("TargetAttr", json!(format!("id=\"{anchor}\""))),
        ("Class", json!(class)),
        ("ClassAttr", json!(format!("class=\"{class}\""))),
        (
            "Layout",
            json!(section.layout.as_deref().map(|l| templates.escape(l))),
        ),
        (
            "Color",
            json!(section.color.as_deref().map(|c| templates.escape(c))),
        ),
        ("Style", json!(section.style)),
        ("Pos", json!(bound.position())),
        ("TotalItems", json!(bound.total())),
        ("First", json!(bound.is_first())),
        ("Last", json!(bound.is_last())),
        ("Middle", json!(bound.is_middle())),
        (
            "SortOrder",
            json!(ordering::sort_order_json(section, allow_mobile_sort)
                .map(|order| templates.escape(&order))),
        ),
        (
            "DisplayClasses",
            json!(ordering::display_classes(section, allow_mobile_sort)),
        ),
        ("Link", json!(section_link)),
        ("ControllerLink", json!(bound.link(section, scope, None))),
        ("PageTitle", json!(templates.escape(&scope.page().title))),
        ("PageType", json!(scope.page().page_type)),
    ];
    for (key, value) in standard {
        context.insert(key.to_string(), value);
    }

    bound.handler().extend_context(section, &mut context);
    Ok(context)
}

/// Resolves the template cascade and renders it against the section
/// context, with `overrides` layered on top.
pub fn render_bound(
    bound: &BoundController,
    section: &SectionRecord,
    area: Option<&AreaRecord>,
    scope: &RenderScope<'_>,
    overrides: Option<RenderContext>,
) -> Result<String, SectionError> {
    let mut context = section_context(bound, section, area, scope)?;
    if let Some(overrides) = overrides {
        context.extend(overrides);
    }
    let candidates = cascade::candidates(
        scope.registry(),
        &section.type_id,
        &scope.page().page_type,
        section.layout.as_deref(),
    )?;
    let template = cascade::resolve(candidates, scope.templates())?;
    scope
        .templates()
        .render(&template, &context)
        .map_err(|source| SectionError::Template {
            name: template,
            source,
        })
}

/// Renders an unsaved section of `type_id` with customised data, for use
/// directly from page templates. `data` is `key=value` pairs separated by
/// commas; `Title=Field` takes the page field of that name as an `h2`.
pub fn render_standalone(
    type_id: &str,
    data: &str,
    scope: &RenderScope<'_>,
) -> Result<String, SectionError> {
    let record = SectionRecord::new(SectionId(0), type_id, AreaId(0));
    let templates = scope.templates();

    let mut overrides = RenderContext::new();
    for bit in data.split(',') {
        let Some((key, value)) = bit.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            continue;
        }
        let rendered = match key {
            "Title" => {
                let text = scope.page().field(value).unwrap_or_default();
                format!("<h2>{}</h2>", templates.escape(text))
            }
            _ => templates.escape(value),
        };
        overrides.insert(key.to_string(), Value::String(rendered));
    }

    let bound = scope.controllers().bind(scope.registry(), &record)?;
    render_bound(&bound, &record, None, scope, Some(overrides))
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;

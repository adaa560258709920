use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::{
    domain::{AreaId, SectionId, TitleSemantic},
    protocol::SectionFields,
};
use uuid::Uuid;

use crate::{
    area::AreaRecord,
    controller::{BoundController, ControllerRegistry},
    error::SectionError,
    links,
    page::join_links,
    registry::{SectionType, TypeRegistry},
    render::RenderScope,
};

pub const PREVIEW_PARAM: &str = "SectionPreview";

/// Persisted state of one section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionRecord {
    pub id: SectionId,
    pub type_id: String,
    pub area_id: AreaId,
    pub title: String,
    pub sort: i64,
    pub mobile_sort: i64,
    pub show_for_desktop: bool,
    pub show_for_mobile: bool,
    pub title_hide: bool,
    pub title_semantic: TitleSemantic,
    pub layout: Option<String>,
    pub color: Option<String>,
    pub style: Option<String>,
    pub extra: serde_json::Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl SectionRecord {
    pub fn new(id: SectionId, type_id: impl Into<String>, area_id: AreaId) -> Self {
        Self {
            id,
            type_id: type_id.into(),
            area_id,
            title: String::new(),
            sort: 0,
            mobile_sort: 0,
            show_for_desktop: true,
            show_for_mobile: true,
            title_hide: false,
            title_semantic: TitleSemantic::Auto,
            layout: None,
            color: None,
            style: None,
            extra: serde_json::Map::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_sort(mut self, sort: i64, mobile_sort: i64) -> Self {
        self.sort = sort;
        self.mobile_sort = mobile_sort;
        self
    }

    /// Applies editor-supplied fields. An empty layout or colour means
    /// "default" and clears the choice.
    pub fn apply(&mut self, fields: SectionFields) {
        if let Some(title) = fields.title {
            self.title = title;
        }
        if let Some(sort) = fields.sort {
            self.sort = sort;
        }
        if let Some(mobile_sort) = fields.mobile_sort {
            self.mobile_sort = mobile_sort;
        }
        if let Some(show) = fields.show_for_desktop {
            self.show_for_desktop = show;
        }
        if let Some(show) = fields.show_for_mobile {
            self.show_for_mobile = show;
        }
        if let Some(hide) = fields.title_hide {
            self.title_hide = hide;
        }
        if let Some(semantic) = fields.title_semantic {
            self.title_semantic = semantic;
        }
        if let Some(layout) = fields.layout {
            self.layout = Some(layout).filter(|l| !l.trim().is_empty());
        }
        if let Some(color) = fields.color {
            self.color = Some(color).filter(|c| !c.trim().is_empty());
        }
        if let Some(style) = fields.style {
            self.style = Some(style);
        }
        if let Some(extra) = fields.extra {
            self.extra = extra;
        }
    }

    /// Checks the type is registered and layout/colour are among the
    /// declared options.
    pub fn validate(&self, registry: &TypeRegistry) -> Result<(), SectionError> {
        let section_type = registry.get(&self.type_id)?;
        if let Some(layout) = self.layout.as_deref() {
            if !section_type.allows_layout(layout) {
                return Err(SectionError::InvalidOption {
                    section_type: self.type_id.clone(),
                    field: "layout",
                    value: layout.to_string(),
                });
            }
        }
        if let Some(color) = self.color.as_deref() {
            if !section_type.allows_color(color) {
                return Err(SectionError::InvalidOption {
                    section_type: self.type_id.clone(),
                    field: "color",
                    value: color.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn anchor(&self) -> String {
        links::anchor(&self.title)
    }

    /// Text of a named field. `Title` is the typed title; anything else is
    /// looked up in the opaque extra fields.
    pub fn field_text(&self, name: &str) -> Option<String> {
        match name {
            "Title" => Some(self.title.clone()),
            _ => match self.extra.get(name)? {
                Value::Null => None,
                Value::String(text) => Some(text.clone()),
                other => Some(other.to_string()),
            },
        }
    }

    pub fn searchable_values(&self, section_type: &SectionType) -> Vec<String> {
        section_type
            .searchable_fields
            .iter()
            .filter_map(|field| self.field_text(field))
            .filter(|value| !value.trim().is_empty())
            .collect()
    }

    /// Owning page link with this section's anchor.
    pub fn link(&self, scope: &RenderScope<'_>, action: Option<&str>) -> String {
        let mut link = format!(
            "{}#{}",
            scope.linker().page_link(scope.page(), action),
            self.anchor()
        );
        scope.hooks().link(self, &mut link);
        link
    }

    /// Like [`SectionRecord::link`] with a cache-busting query parameter.
    pub fn preview_link(&self, scope: &RenderScope<'_>, action: Option<&str>) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        let action = format!("{}?{PREVIEW_PARAM}={nonce}", action.unwrap_or_default());
        let mut link = self.link(scope, Some(&action));
        scope.hooks().preview_link(self, &mut link);
        link
    }

    pub fn edit_link(&self, area: &AreaRecord, scope: &RenderScope<'_>) -> String {
        let prefix = scope.linker().edit_form_prefix(scope.page());
        let id = self.id.to_string();
        let mut link = join_links(&[&prefix, "field", &area.slug, "item", &id, "edit"]);
        scope.hooks().edit_link(self, &mut link);
        link
    }
}

/// A section loaded for one request. The controller is bound at most once
/// and the record cannot change afterwards.
#[derive(Debug)]
pub struct Section {
    record: SectionRecord,
    controller: Option<BoundController>,
}

impl Section {
    pub fn new(record: SectionRecord) -> Self {
        Self {
            record,
            controller: None,
        }
    }

    pub fn record(&self) -> &SectionRecord {
        &self.record
    }

    pub fn into_record(self) -> SectionRecord {
        self.record
    }

    pub fn id(&self) -> SectionId {
        self.record.id
    }

    pub fn type_id(&self) -> &str {
        &self.record.type_id
    }

    pub fn is_bound(&self) -> bool {
        self.controller.is_some()
    }

    pub fn bound(&self) -> Option<&BoundController> {
        self.controller.as_ref()
    }

    /// The section's controller, resolving and initialising it on first use.
    pub fn controller(
        &mut self,
        registry: &TypeRegistry,
        controllers: &ControllerRegistry,
    ) -> Result<&mut BoundController, SectionError> {
        bind_once(&mut self.controller, &self.record, registry, controllers)
    }

    pub fn render(
        &mut self,
        area: Option<&AreaRecord>,
        scope: &RenderScope<'_>,
    ) -> Result<String, SectionError> {
        let bound = bind_once(
            &mut self.controller,
            &self.record,
            scope.registry(),
            scope.controllers(),
        )?;
        bound.render(&self.record, area, scope)
    }

    /// Section-scoped sub-route handoff.
    pub fn handle(
        &mut self,
        area: Option<&AreaRecord>,
        action: Option<&str>,
        scope: &RenderScope<'_>,
    ) -> Result<Option<String>, SectionError> {
        let bound = bind_once(
            &mut self.controller,
            &self.record,
            scope.registry(),
            scope.controllers(),
        )?;
        bound.handle(&self.record, area, action, scope)
    }

    pub fn link(&self, scope: &RenderScope<'_>, action: Option<&str>) -> String {
        self.record.link(scope, action)
    }

    pub fn preview_link(&self, scope: &RenderScope<'_>, action: Option<&str>) -> String {
        self.record.preview_link(scope, action)
    }

    pub fn edit_link(&self, area: &AreaRecord, scope: &RenderScope<'_>) -> String {
        self.record.edit_link(area, scope)
    }
}

fn bind_once<'a>(
    slot: &'a mut Option<BoundController>,
    record: &SectionRecord,
    registry: &TypeRegistry,
    controllers: &ControllerRegistry,
) -> Result<&'a mut BoundController, SectionError> {
    let bound = match slot.take() {
        Some(bound) => bound,
        None => controllers.bind(registry, record)?,
    };
    Ok(slot.insert(bound))
}

#[cfg(test)]
#[path = "tests/section_tests.rs"]
mod tests;

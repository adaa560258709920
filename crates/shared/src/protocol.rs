use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AreaId, PageId, SectionId, TitleSemantic, Viewport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaSummary {
    pub area_id: AreaId,
    pub page_id: PageId,
    pub slug: String,
    pub title: String,
    pub allow_mobile_sort: bool,
    pub search_index: String,
    pub section_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section_id: SectionId,
    pub area_id: AreaId,
    pub type_id: String,
    pub type_label: String,
    pub title: String,
    pub sort: i64,
    pub mobile_sort: i64,
    pub show_for_desktop: bool,
    pub show_for_mobile: bool,
    pub title_hide: bool,
    pub title_semantic: TitleSemantic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub anchor: String,
    pub link: String,
    pub edit_link: String,
    pub updated_at: DateTime<Utc>,
}

/// Fields an editor may set on a section. Absent fields keep their stored
/// value on update and take the defaults on create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionFields {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sort: Option<i64>,
    #[serde(default)]
    pub mobile_sort: Option<i64>,
    #[serde(default)]
    pub show_for_desktop: Option<bool>,
    #[serde(default)]
    pub show_for_mobile: Option<bool>,
    #[serde(default)]
    pub title_hide: Option<bool>,
    #[serde(default)]
    pub title_semantic: Option<TitleSemantic>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSectionRequest {
    pub actor: String,
    pub type_id: String,
    #[serde(default, flatten)]
    pub fields: SectionFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSectionRequest {
    pub actor: String,
    #[serde(default, flatten)]
    pub fields: SectionFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePageRequest {
    pub page_type: String,
    pub url_segment: String,
    pub title: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavePageRequest {
    /// Per-slug override of the area's mobile ordering switch.
    #[serde(default)]
    pub allow_mobile_sort: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedArea {
    pub page_id: PageId,
    pub slug: String,
    pub viewport: Viewport,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTypeSummary {
    pub type_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub layouts: Vec<String>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDescriptor {
    pub code: String,
    pub name: String,
    pub category: String,
}

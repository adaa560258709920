use std::collections::{BTreeSet, HashMap};

use anyhow::Context;
use serde::Deserialize;

use crate::registry::{CreationPolicy, SectionType, TypeRegistry, ROOT_TYPE};

pub const DEFAULT_AREA_SLUG: &str = "Sections";
pub const DEFAULT_AREA_TITLE: &str = "Main";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AreaSlot {
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageTypeConfig {
    #[serde(default)]
    pub areas: Vec<AreaSlot>,
    #[serde(default)]
    pub allowed_sections: Option<BTreeSet<String>>,
    #[serde(default)]
    pub excluded_sections: BTreeSet<String>,
}

/// Page types, section types and the global creation filter, as read from
/// `sections.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionsConfig {
    #[serde(default)]
    pub allowed_sections: Option<BTreeSet<String>>,
    #[serde(default)]
    pub excluded_sections: BTreeSet<String>,
    #[serde(default)]
    pub section_types: Vec<SectionType>,
    #[serde(default)]
    pub page_types: HashMap<String, PageTypeConfig>,
}

impl SectionsConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid sections configuration")
    }

    /// Builds the registry, registering a bare root type when the file does
    /// not declare one.
    pub fn build_registry(&self) -> anyhow::Result<TypeRegistry> {
        let mut types = self.section_types.clone();
        if !types.iter().any(SectionType::is_root) {
            types.insert(0, SectionType::new(ROOT_TYPE, None));
        }
        TypeRegistry::new(types).context("invalid section type hierarchy")
    }

    pub fn global_policy(&self) -> CreationPolicy {
        CreationPolicy::new(self.allowed_sections.clone(), self.excluded_sections.clone())
    }

    pub fn page_policy(&self, page_type: &str) -> CreationPolicy {
        let global = self.global_policy();
        match self.page_types.get(page_type) {
            Some(page) => global.narrowed_by(&CreationPolicy::new(
                page.allowed_sections.clone(),
                page.excluded_sections.clone(),
            )),
            None => global,
        }
    }

    /// Configured area slots for a page type, in declaration order.
    pub fn areas_for(&self, page_type: &str) -> Vec<AreaSlot> {
        match self.page_types.get(page_type) {
            Some(page) if !page.areas.is_empty() => page.areas.clone(),
            _ => vec![AreaSlot {
                slug: DEFAULT_AREA_SLUG.to_string(),
                title: DEFAULT_AREA_TITLE.to_string(),
            }],
        }
    }

    pub fn declares_area(&self, page_type: &str, slug: &str) -> bool {
        self.areas_for(page_type).iter().any(|slot| slot.slug == slug)
    }
}

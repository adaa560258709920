use chrono::{DateTime, Utc};
use shared::domain::{AreaId, PageId, SectionId, Viewport};

use crate::{
    ordering,
    registry::TypeRegistry,
    section::{Section, SectionRecord},
    store::SearchIndexer,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AreaRecord {
    pub id: AreaId,
    pub page_id: PageId,
    pub slug: String,
    pub title: String,
    pub allow_mobile_sort: bool,
    pub search_index: String,
    pub updated_at: DateTime<Utc>,
}

impl AreaRecord {
    pub fn new(id: AreaId, page_id: PageId, slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            page_id,
            slug: slug.into(),
            title: title.into(),
            allow_mobile_sort: false,
            search_index: String::new(),
            updated_at: Utc::now(),
        }
    }
}

/// An area with its sections loaded for one request.
#[derive(Debug)]
pub struct Area {
    pub record: AreaRecord,
    pub(crate) sections: Vec<Section>,
}

impl Area {
    pub fn new(record: AreaRecord, sections: Vec<SectionRecord>) -> Self {
        Self {
            record,
            sections: sections.into_iter().map(Section::new).collect(),
        }
    }

    pub fn slug(&self) -> &str {
        &self.record.slug
    }

    /// Sections in load order; use [`ordering`] for display order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn push_section(&mut self, record: SectionRecord) {
        self.sections.push(Section::new(record));
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id() == id)
    }

    pub fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id() == id)
    }

    /// Recomputes the search index; returns whether it changed.
    pub fn refresh_search_index(&mut self, registry: &TypeRegistry) -> bool {
        let records: Vec<SectionRecord> =
            self.sections.iter().map(|s| s.record().clone()).collect();
        let index = registry.search_index(&records);
        if index == self.record.search_index {
            return false;
        }
        self.record.search_index = index;
        true
    }
}

impl SearchIndexer for TypeRegistry {
    /// Space-joined searchable values of every section, in desktop order.
    /// Sections of unregistered types contribute their title.
    fn search_index(&self, sections: &[SectionRecord]) -> String {
        let loaded: Vec<Section> = sections.iter().cloned().map(Section::new).collect();
        let mut values = Vec::new();
        for index in ordering::ordered_indices(&loaded, Viewport::Desktop, false) {
            let record = loaded[index].record();
            match self.get(&record.type_id) {
                Ok(section_type) => values.extend(record.searchable_values(section_type)),
                Err(_) => values.extend(
                    Some(record.title.clone()).filter(|title| !title.trim().is_empty()),
                ),
            }
        }
        values.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SectionType;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        TypeRegistry::new(vec![
            SectionType::new("Section", None),
            SectionType::new("Content", Some("Section")),
            SectionType::new("Quote", Some("Section")).with_searchable_fields(["Title", "Author"]),
        ])
        .expect("registry")
    }

    fn record(id: i64, title: &str, sort: i64) -> SectionRecord {
        SectionRecord::new(SectionId(id), "Content", AreaId(1))
            .with_title(title)
            .with_sort(sort, sort)
    }

    #[test]
    fn search_index_follows_section_order_and_tracks_additions() {
        let registry = registry();
        let mut area = Area::new(
            AreaRecord::new(AreaId(1), PageId(1), "Sections", "Main"),
            vec![record(2, "Beta", 2), record(1, "Alpha", 1)],
        );
        assert!(area.refresh_search_index(&registry));
        assert_eq!(area.record.search_index, "Alpha Beta");

        area.push_section(record(3, "Gamma", 3));
        assert!(area.refresh_search_index(&registry));
        assert_eq!(area.record.search_index, "Alpha Beta Gamma");
        assert!(!area.refresh_search_index(&registry));
    }

    #[test]
    fn search_index_reads_configured_extra_fields() {
        let registry = registry();
        let mut quote = SectionRecord::new(SectionId(1), "Quote", AreaId(1)).with_title("On rust");
        quote.extra.insert("Author".into(), json!("Ferris"));
        quote.extra.insert("Body".into(), json!("not indexed"));
        let untitled = SectionRecord::new(SectionId(2), "Content", AreaId(1)).with_sort(1, 1);
        assert_eq!(registry.search_index(&[quote, untitled]), "On rust Ferris");
    }
}

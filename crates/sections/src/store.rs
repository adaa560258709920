use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{AreaId, PageId, SectionId};

use crate::{area::AreaRecord, config::AreaSlot, section::SectionRecord};

/// Computes an area's search index from its sections.
pub trait SearchIndexer: Send + Sync {
    fn search_index(&self, sections: &[SectionRecord]) -> String;
}

#[derive(Debug, Clone)]
pub enum SectionWrite {
    Insert(SectionRecord),
    Update(SectionRecord),
    Delete(SectionId),
}

/// Persistence seam for areas and sections. Every write that touches an
/// area's sections recomputes that area's search index inside the same
/// transaction.
#[async_trait]
pub trait SectionStore: Send + Sync {
    /// Creates the area for `slot` on first use and refreshes its title
    /// otherwise. `allow_mobile_sort` is only written when given.
    async fn upsert_area(
        &self,
        page_id: PageId,
        slot: &AreaSlot,
        allow_mobile_sort: Option<bool>,
        indexer: &dyn SearchIndexer,
    ) -> Result<AreaRecord>;

    async fn find_area(&self, page_id: PageId, slug: &str) -> Result<Option<AreaRecord>>;

    async fn list_areas(&self, page_id: PageId) -> Result<Vec<AreaRecord>>;

    /// Sections of an area in creation order.
    async fn load_sections(&self, area_id: AreaId) -> Result<Vec<SectionRecord>>;

    async fn find_section(&self, section_id: SectionId) -> Result<Option<SectionRecord>>;

    /// Applies one section write and re-indexes the owning area. Returns the
    /// id of the written section.
    async fn write_section(
        &self,
        write: SectionWrite,
        indexer: &dyn SearchIndexer,
    ) -> Result<SectionId>;

    /// Deletes an area and every section it owns.
    async fn delete_area(&self, area_id: AreaId) -> Result<()>;
}

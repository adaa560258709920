use shared::domain::{SectionId, Viewport};
use tracing::debug;

use crate::{
    area::Area,
    config::AreaSlot,
    error::SectionError,
    page::{parse_section_route, PageRef},
    render::{self, SectionEnv},
    section::Section,
};

/// A page with its configured area slots and the areas loaded for them.
#[derive(Debug)]
pub struct SectionedPage {
    pub page: PageRef,
    slots: Vec<AreaSlot>,
    areas: Vec<Area>,
}

impl SectionedPage {
    pub fn new(page: PageRef, slots: Vec<AreaSlot>, areas: Vec<Area>) -> Self {
        Self { page, slots, areas }
    }

    pub fn slots(&self) -> &[AreaSlot] {
        &self.slots
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn area(&self, slug: &str) -> Option<&Area> {
        self.areas.iter().find(|area| area.slug() == slug)
    }

    pub fn declares(&self, slug: &str) -> bool {
        self.slots.iter().any(|slot| slot.slug == slug)
    }

    /// Renders the named area. Undeclared slugs and areas that were never
    /// built render as an empty string.
    pub fn render_area(
        &mut self,
        slug: &str,
        viewport: Viewport,
        offset: usize,
        env: &SectionEnv,
    ) -> String {
        if !self.declares(slug) {
            debug!(page_id = %self.page.id, slug, "area slug not configured for page");
            return String::new();
        }
        let scope = env.scope(&self.page);
        let area = self.areas.iter_mut().find(|area| area.record.slug == slug);
        render::render_area(area, viewport, offset, &scope)
    }

    /// Every section on the page, across all areas.
    pub fn current_sections(&self) -> impl Iterator<Item = &Section> {
        self.areas.iter().flat_map(|area| area.sections().iter())
    }

    /// Hands a `section/{id}/{action}` sub-route to the section's controller.
    /// `Ok(None)` means there is nothing to hand off to.
    pub fn handle_section(
        &mut self,
        sub_path: &str,
        env: &SectionEnv,
    ) -> Result<Option<String>, SectionError> {
        let Some(route) = parse_section_route(sub_path) else {
            return Ok(None);
        };
        self.dispatch(route.section_id, route.action.as_deref(), env)
    }

    pub fn dispatch(
        &mut self,
        section_id: SectionId,
        action: Option<&str>,
        env: &SectionEnv,
    ) -> Result<Option<String>, SectionError> {
        let scope = env.scope(&self.page);
        for area in &mut self.areas {
            let Some(section) = area.sections.iter_mut().find(|s| s.id() == section_id) else {
                continue;
            };
            return section.handle(Some(&area.record), action, &scope);
        }
        debug!(page_id = %self.page.id, %section_id, "no section to hand off to");
        Ok(None)
    }
}

#[cfg(test)]
#[path = "tests/composition_tests.rs"]
mod tests;

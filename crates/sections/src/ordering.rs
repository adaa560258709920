use serde_json::json;
use shared::domain::Viewport;

use crate::{
    area::Area,
    section::{Section, SectionRecord},
};

/// One section's place in an ordered area. Hidden sections keep their
/// position; visibility is decided by the renderer.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub section: &'a Section,
    pub position: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl Placement<'_> {
    pub fn is_middle(&self) -> bool {
        !self.is_first && !self.is_last
    }
}

pub fn order_desktop(area: &Area) -> Vec<Placement<'_>> {
    order(area, Viewport::Desktop)
}

/// Mobile order. Identical to the desktop order unless the area allows
/// mobile sorting.
pub fn order_mobile(area: &Area) -> Vec<Placement<'_>> {
    order(area, Viewport::Mobile)
}

pub fn order(area: &Area, viewport: Viewport) -> Vec<Placement<'_>> {
    let sections = area.sections();
    let indices = ordered_indices(sections, viewport, area.record.allow_mobile_sort);
    let total = indices.len();
    indices
        .into_iter()
        .enumerate()
        .map(|(i, index)| Placement {
            section: &sections[index],
            position: i + 1,
            is_first: i == 0,
            is_last: i + 1 == total,
        })
        .collect()
}

/// Indices into `sections` in display order. Equal keys fall back to
/// creation order (id, then load order), so the result is deterministic.
pub(crate) fn ordered_indices(
    sections: &[Section],
    viewport: Viewport,
    allow_mobile_sort: bool,
) -> Vec<usize> {
    let use_mobile = viewport == Viewport::Mobile && allow_mobile_sort;
    let mut indices: Vec<usize> = (0..sections.len()).collect();
    indices.sort_by_key(|&i| {
        let record = sections[i].record();
        let key = if use_mobile {
            record.mobile_sort
        } else {
            record.sort
        };
        (key, record.id, i)
    });
    indices
}

pub fn is_visible(record: &SectionRecord, viewport: Viewport) -> bool {
    match viewport {
        Viewport::Desktop => record.show_for_desktop,
        Viewport::Mobile => record.show_for_mobile,
    }
}

/// Responsive order hint, `{"small":m,"medium":d}` with one-based keys, when
/// the area orders mobile independently.
pub fn sort_order_json(record: &SectionRecord, allow_mobile_sort: bool) -> Option<String> {
    allow_mobile_sort.then(|| {
        json!({
            "small": record.mobile_sort + 1,
            "medium": record.sort + 1,
        })
        .to_string()
    })
}

/// Responsive visibility classes for sections shown on only one axis.
pub fn display_classes(record: &SectionRecord, allow_mobile_sort: bool) -> String {
    if !allow_mobile_sort {
        return String::new();
    }
    match (record.show_for_desktop, record.show_for_mobile) {
        (true, false) => "show-for-medium".to_string(),
        (false, true) => "hide-for-medium".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
#[path = "tests/ordering_tests.rs"]
mod tests;

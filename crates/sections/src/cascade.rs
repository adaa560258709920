//! Template candidate cascade.
//!
//! For every type in the ancestry (most specific first) the candidates are
//! `{type}_{page}_{layout}`, `{type}_{layout}`, `{type}_{page}` and `{type}`,
//! the layout forms only when a layout is chosen. A more specific type with
//! a layout always outranks a less specific type without one.

use crate::{error::SectionError, registry::TypeRegistry, templates::TemplateEngine};

#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    ancestry: Vec<&'a str>,
    page_type: Option<&'a str>,
    layout: Option<&'a str>,
    level: usize,
    step: u8,
}

pub fn candidates<'a>(
    registry: &'a TypeRegistry,
    section_type: &str,
    page_type: &'a str,
    layout: Option<&'a str>,
) -> Result<Candidates<'a>, SectionError> {
    let ancestry = registry
        .ancestry(section_type)?
        .into_iter()
        .map(|t| t.id.as_str())
        .collect();
    Ok(Candidates {
        ancestry,
        page_type: Some(page_type).filter(|p| !p.is_empty()),
        layout: layout.filter(|l| !l.is_empty()),
        level: 0,
        step: 0,
    })
}

impl Iterator for Candidates<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let ancestor = *self.ancestry.get(self.level)?;
            let step = self.step;
            if step >= 4 {
                self.level += 1;
                self.step = 0;
                continue;
            }
            self.step += 1;

            let candidate = match (step, self.page_type, self.layout) {
                (0, Some(page), Some(layout)) => format!("{ancestor}_{page}_{layout}"),
                (1, _, Some(layout)) => format!("{ancestor}_{layout}"),
                (2, Some(page), _) => format!("{ancestor}_{page}"),
                (3, _, _) => ancestor.to_string(),
                _ => continue,
            };
            return Some(candidate);
        }
    }
}

/// First candidate with a backing template.
pub fn resolve(
    candidates: Candidates<'_>,
    templates: &dyn TemplateEngine,
) -> Result<String, SectionError> {
    let section_type = candidates
        .ancestry
        .first()
        .copied()
        .unwrap_or_default()
        .to_string();
    let mut tried = Vec::new();
    for candidate in candidates {
        if templates.exists(&candidate) {
            return Ok(candidate);
        }
        tried.push(candidate);
    }
    Err(SectionError::NoTemplateFound {
        section_type,
        tried,
    })
}

use std::sync::Arc;

use deunicode::deunicode;

use crate::{registry::SectionType, section::SectionRecord};

/// URL-friendly in-page anchor for a section title.
pub fn anchor(title: &str) -> String {
    let lowered = deunicode(title)
        .to_lowercase()
        .replace("&amp;", "-and-")
        .replace('&', "-and-");

    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match c {
            'a'..='z' | '0'..='9' => out.push(c),
            '-' | '+' | '_' | '.' | '/' | '?' | '=' | '#' | ':' => push_dash(&mut out),
            c if c.is_whitespace() => push_dash(&mut out),
            _ => {}
        }
    }
    out.trim_matches('-').to_string()
}

fn push_dash(out: &mut String) {
    if !out.ends_with('-') {
        out.push('-');
    }
}

/// `ImageGallery` -> `image-gallery`, `HTMLBlock` -> `html-block`.
/// Namespace prefixes are dropped.
pub fn hyphenate(type_id: &str) -> String {
    let name = type_id.rsplit(['\\', ':']).next().unwrap_or(type_id);
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let after_word = prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
            let ends_acronym = prev.is_some_and(|p| p.is_ascii_uppercase())
                && next.is_some_and(|n| n.is_ascii_lowercase());
            if after_word || ends_acronym {
                push_dash(&mut out);
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '_' || c == ' ' {
            push_dash(&mut out);
        } else {
            out.push(c);
        }
    }
    out.trim_matches('-').to_string()
}

pub fn css_class(section_type: &SectionType) -> String {
    match section_type.base_class.as_deref() {
        Some(base) if !base.trim().is_empty() => base.trim().to_string(),
        _ => hyphenate(&section_type.id),
    }
}

/// Extension point for link rewriting. Each callback may only rewrite the
/// link it is handed; observers run in registration order.
pub trait LinkObserver: Send + Sync {
    fn update_link(&self, _section: &SectionRecord, _link: &mut String) {}
    fn update_preview_link(&self, _section: &SectionRecord, _link: &mut String) {}
    fn update_edit_link(&self, _section: &SectionRecord, _link: &mut String) {}
}

#[derive(Clone, Default)]
pub struct Hooks {
    observers: Vec<Arc<dyn LinkObserver>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn LinkObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn link(&self, section: &SectionRecord, link: &mut String) {
        for observer in &self.observers {
            observer.update_link(section, link);
        }
    }

    pub(crate) fn preview_link(&self, section: &SectionRecord, link: &mut String) {
        for observer in &self.observers {
            observer.update_preview_link(section, link);
        }
    }

    pub(crate) fn edit_link(&self, section: &SectionRecord, link: &mut String) {
        for observer in &self.observers {
            observer.update_edit_link(section, link);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_are_link_friendly() {
        assert_eq!(anchor("Our Team"), "our-team");
        assert_eq!(anchor("  Fish & Chips!  "), "fish-and-chips");
        assert_eq!(anchor("v2.0_release notes"), "v2-0-release-notes");
        assert_eq!(anchor("C++ -- tips"), "c-tips");
        assert_eq!(anchor("???"), "");
        assert_eq!(anchor("Café Menu"), "cafe-menu");
        assert_eq!(anchor("Über uns"), "uber-uns");
    }

    #[test]
    fn hyphenates_type_names() {
        assert_eq!(hyphenate("ImageGallery"), "image-gallery");
        assert_eq!(hyphenate("Sections\\Models\\HeroBanner"), "hero-banner");
        assert_eq!(hyphenate("Section"), "section");
        assert_eq!(hyphenate("Video2Column"), "video2-column");
        assert_eq!(hyphenate("HTMLBlock"), "html-block");
        assert_eq!(hyphenate("FAQ"), "faq");
        assert_eq!(hyphenate("MyHTML"), "my-html");
    }

    #[test]
    fn base_class_overrides_hyphenated_name() {
        let mut section_type = SectionType::new("ImageGallery", Some("Section"));
        assert_eq!(css_class(&section_type), "image-gallery");
        section_type.base_class = Some("gallery".into());
        assert_eq!(css_class(&section_type), "gallery");
    }
}

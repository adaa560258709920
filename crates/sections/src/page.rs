use std::collections::BTreeMap;

use shared::domain::{PageId, SectionId};

/// The page a render or routing pass is acting for. Owned by the routing
/// collaborator; the core only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub id: PageId,
    pub page_type: String,
    pub url_segment: String,
    pub title: String,
    pub fields: BTreeMap<String, String>,
}

impl PageRef {
    pub fn new(
        id: PageId,
        page_type: impl Into<String>,
        url_segment: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id,
            page_type: page_type.into(),
            url_segment: url_segment.into(),
            title: title.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Named page field; `Title` and `URLSegment` always resolve.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "Title" => Some(&self.title),
            "URLSegment" => Some(&self.url_segment),
            _ => self.fields.get(name).map(String::as_str),
        }
    }
}

pub trait PageLinker: Send + Sync {
    fn page_link(&self, page: &PageRef, subpath: Option<&str>) -> String;

    /// Prefix of the page edit form that section edit links hang off.
    fn edit_form_prefix(&self, page: &PageRef) -> String;
}

/// Links of the form `/{url_segment}/{subpath}` with an `/admin/pages/edit`
/// edit form.
#[derive(Debug, Clone, Default)]
pub struct RelativeLinker;

impl PageLinker for RelativeLinker {
    fn page_link(&self, page: &PageRef, subpath: Option<&str>) -> String {
        let base = if page.url_segment.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", page.url_segment.trim_matches('/'))
        };
        match subpath {
            Some(subpath) => join_links(&[&base, subpath]),
            None => base,
        }
    }

    fn edit_form_prefix(&self, page: &PageRef) -> String {
        join_links(&["/admin/pages/edit/EditForm", &page.id.to_string()])
    }
}

/// Joins path fragments with single slashes, keeping any query string on
/// the last fragment intact.
pub fn join_links(parts: &[&str]) -> String {
    let mut path = String::new();
    let mut query = String::new();
    for part in parts.iter().filter(|part| !part.is_empty()) {
        let (segment, part_query) = match part.split_once('?') {
            Some((segment, q)) => (segment, Some(q)),
            None => (*part, None),
        };
        if let Some(q) = part_query {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(q);
        }
        if segment.is_empty() {
            continue;
        }
        if path.is_empty() {
            path.push_str(segment);
        } else {
            let trimmed = segment.trim_start_matches('/');
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(trimmed);
        }
    }
    if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    }
}

/// A section-scoped sub-route: `section/{id}` with an optional trailing
/// action path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRoute {
    pub section_id: SectionId,
    pub action: Option<String>,
}

pub fn parse_section_route(sub_path: &str) -> Option<SectionRoute> {
    let mut parts = sub_path.trim_matches('/').splitn(3, '/');
    if parts.next()? != "section" {
        return None;
    }
    let section_id = parts.next()?.parse::<i64>().ok()?;
    let action = parts
        .next()
        .map(|rest| rest.trim_matches('/').to_string())
        .filter(|rest| !rest.is_empty());
    Some(SectionRoute {
        section_id: SectionId(section_id),
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_links_without_doubling_slashes() {
        assert_eq!(join_links(&["/about/", "section", "4"]), "/about/section/4");
        assert_eq!(join_links(&["/about/", "/edit?x=1"]), "/about/edit?x=1");
        assert_eq!(join_links(&["/", "", "?SectionPreview=3"]), "/?SectionPreview=3");
    }

    #[test]
    fn relative_linker_builds_page_links() {
        let page = PageRef::new(PageId(7), "LandingPage", "about-us", "About us");
        let linker = RelativeLinker;
        assert_eq!(linker.page_link(&page, None), "/about-us/");
        assert_eq!(
            linker.page_link(&page, Some("section/3")),
            "/about-us/section/3"
        );
        assert_eq!(
            linker.edit_form_prefix(&page),
            "/admin/pages/edit/EditForm/7"
        );
    }

    #[test]
    fn parses_section_sub_routes() {
        assert_eq!(
            parse_section_route("section/42/gallery/next"),
            Some(SectionRoute {
                section_id: SectionId(42),
                action: Some("gallery/next".into())
            })
        );
        assert_eq!(
            parse_section_route("/section/42/"),
            Some(SectionRoute {
                section_id: SectionId(42),
                action: None
            })
        );
        assert_eq!(parse_section_route("section/abc"), None);
        assert_eq!(parse_section_route("blog/42"), None);
    }
}

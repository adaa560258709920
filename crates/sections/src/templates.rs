use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use serde_json::Value;

pub type RenderContext = serde_json::Map<String, Value>;

pub trait TemplateEngine: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    /// Renders `name` against `context`. Context values are inserted as
    /// given; anything that needs escaping was escaped when the context was
    /// built.
    fn render(&self, name: &str, context: &RenderContext) -> anyhow::Result<String>;

    fn escape(&self, text: &str) -> String {
        escape_html(text)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// In-memory templates with `{{ Key }}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, String>,
}

pub const TEMPLATE_EXTENSION: &str = "html";

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.templates.insert(name.into(), body.into());
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Loads every `*.html` file in `dir`, named by file stem.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut set = Self::new();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to read template directory '{}'", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let body = fs::read_to_string(&path)
                .with_context(|| format!("failed to read template '{}'", path.display()))?;
            set.insert(name, body);
        }
        Ok(set)
    }
}

impl TemplateEngine for TemplateSet {
    fn exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    fn render(&self, name: &str, context: &RenderContext) -> anyhow::Result<String> {
        let Some(body) = self.templates.get(name) else {
            bail!("template '{name}' is not loaded");
        };
        substitute(body, context)
    }
}

fn substitute(body: &str, context: &RenderContext) -> anyhow::Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            bail!("unclosed placeholder in template");
        };
        let key = after[..end].trim();
        match context.get(key) {
            Some(Value::String(text)) => out.push_str(text),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_known_keys_and_drops_unknown() {
        let mut set = TemplateSet::new();
        set.insert("Section", "<section {{AnchorAttr}}>{{ Title }}{{Missing}}#{{Pos}}</section>");
        let mut context = RenderContext::new();
        context.insert("AnchorAttr".into(), json!("id=\"intro\""));
        context.insert("Title".into(), json!("<h1>Intro</h1>"));
        context.insert("Pos".into(), json!(2));
        let html = set.render("Section", &context).expect("render");
        assert_eq!(html, "<section id=\"intro\"><h1>Intro</h1>#2</section>");
    }

    #[test]
    fn unclosed_placeholder_is_an_error() {
        let mut set = TemplateSet::new();
        set.insert("Broken", "<p>{{Title</p>");
        assert!(set.render("Broken", &RenderContext::new()).is_err());
        assert!(set.render("Absent", &RenderContext::new()).is_err());
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("Tom & \"Jerry\" <b>"),
            "Tom &amp; &quot;Jerry&quot; &lt;b&gt;"
        );
    }

    #[test]
    fn loads_templates_from_directory() {
        let suffix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("sections_templates_test_{suffix}"));
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join("Section.html"), "<div>{{Title}}</div>").expect("write");
        fs::write(dir.join("notes.txt"), "ignored").expect("write");

        let set = TemplateSet::from_dir(&dir).expect("load");
        assert!(set.exists("Section"));
        assert!(!set.exists("notes"));
        assert_eq!(set.len(), 1);

        fs::remove_dir_all(dir).expect("cleanup");
    }
}

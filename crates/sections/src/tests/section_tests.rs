use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use shared::domain::PageId;

use super::*;
use crate::{
    controller::SectionController,
    links::{Hooks, LinkObserver},
    page::{PageRef, RelativeLinker},
    registry::SectionType,
    render::SectionEnv,
    templates::TemplateSet,
};

fn registry() -> TypeRegistry {
    TypeRegistry::new(vec![
        SectionType::new("Section", None),
        SectionType::new("Content", Some("Section"))
            .with_layouts(["wide"])
            .with_colors(["dark", "light"]),
        SectionType::new("Quote", Some("Section")).with_searchable_fields(["Title", "Author"]),
    ])
    .expect("registry")
}

fn env(hooks: Hooks) -> SectionEnv {
    SectionEnv {
        registry: Arc::new(registry()),
        controllers: Arc::new(ControllerRegistry::with_default()),
        templates: Arc::new(TemplateSet::new()),
        linker: Arc::new(RelativeLinker),
        hooks: Arc::new(hooks),
    }
}

fn page() -> PageRef {
    PageRef::new(PageId(5), "LandingPage", "about", "About")
}

fn content(id: i64, title: &str) -> SectionRecord {
    SectionRecord::new(SectionId(id), "Content", AreaId(1)).with_title(title)
}

#[test]
fn apply_keeps_absent_fields_and_clears_empty_options() {
    let mut record = content(1, "Intro");
    record.layout = Some("wide".into());
    record.apply(SectionFields {
        sort: Some(4),
        layout: Some(String::new()),
        color: Some("dark".into()),
        title_semantic: Some(TitleSemantic::Heading(3)),
        ..SectionFields::default()
    });
    assert_eq!(record.title, "Intro");
    assert_eq!(record.sort, 4);
    assert_eq!(record.layout, None);
    assert_eq!(record.color.as_deref(), Some("dark"));
    assert_eq!(record.title_semantic, TitleSemantic::Heading(3));
}

#[test]
fn validate_rejects_undeclared_options_and_types() {
    let registry = registry();
    let mut record = content(1, "Intro");
    record.color = Some("neon".into());
    let err = record.validate(&registry).expect_err("colour");
    assert!(matches!(
        err,
        SectionError::InvalidOption { field: "color", ref value, .. } if value == "neon"
    ));

    record.color = Some("light".into());
    record.layout = Some("wide".into());
    record.validate(&registry).expect("valid");

    let unknown = SectionRecord::new(SectionId(2), "Carousel", AreaId(1));
    assert!(matches!(
        unknown.validate(&registry),
        Err(SectionError::UnknownType(_))
    ));
}

#[test]
fn searchable_values_skip_empty_fields() {
    let registry = registry();
    let mut quote = SectionRecord::new(SectionId(3), "Quote", AreaId(1));
    quote.extra.insert("Author".into(), serde_json::json!("Ada"));
    let quote_type = registry.get("Quote").expect("quote");
    assert_eq!(quote.searchable_values(quote_type), ["Ada"]);
    assert_eq!(quote.field_text("Missing"), None);
}

#[test]
fn links_carry_anchor_and_edit_path() {
    let env = env(Hooks::new());
    let page = page();
    let scope = env.scope(&page);
    let record = content(9, "Our Team");
    let area = AreaRecord::new(AreaId(1), PageId(5), "Sections", "Main");

    assert_eq!(record.link(&scope, None), "/about/#our-team");
    assert_eq!(
        record.edit_link(&area, &scope),
        "/admin/pages/edit/EditForm/5/field/Sections/item/9/edit"
    );
}

#[test]
fn preview_links_are_unique_per_call() {
    let env = env(Hooks::new());
    let page = page();
    let scope = env.scope(&page);
    let record = content(9, "Our Team");

    let first = record.preview_link(&scope, None);
    let second = record.preview_link(&scope, None);
    assert!(first.starts_with("/about/?SectionPreview="));
    assert!(first.ends_with("#our-team"));
    assert_ne!(first, second);
}

struct Tracking;

impl LinkObserver for Tracking {
    fn update_link(&self, _section: &SectionRecord, link: &mut String) {
        link.insert_str(0, "https://cdn.example");
    }

    fn update_edit_link(&self, section: &SectionRecord, link: &mut String) {
        link.push_str(&format!("?type={}", section.type_id));
    }
}

struct Suffix(&'static str);

impl LinkObserver for Suffix {
    fn update_link(&self, _section: &SectionRecord, link: &mut String) {
        link.push_str(self.0);
    }
}

#[test]
fn observers_rewrite_links_in_registration_order() {
    let mut hooks = Hooks::new();
    hooks.register(Arc::new(Tracking));
    hooks.register(Arc::new(Suffix("-x")));
    let env = env(hooks);
    let page = page();
    let scope = env.scope(&page);
    let record = content(9, "Team");
    let area = AreaRecord::new(AreaId(1), PageId(5), "Sections", "Main");

    assert_eq!(record.link(&scope, None), "https://cdn.example/about/#team-x");
    assert!(record.edit_link(&area, &scope).ends_with("/edit?type=Content"));
}

struct Counting(Arc<AtomicUsize>);

impl SectionController for Counting {
    fn init(&self, _section: &SectionRecord) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn controller_is_bound_once_per_section() {
    let registry = registry();
    let inits = Arc::new(AtomicUsize::new(0));
    let mut controllers = ControllerRegistry::with_default();
    let counter = inits.clone();
    controllers.register("ContentController", move |_| {
        Arc::new(Counting(counter.clone())) as Arc<dyn SectionController>
    });

    let mut section = Section::new(content(1, "Intro"));
    assert!(!section.is_bound());
    let first = section
        .controller(&registry, &controllers)
        .expect("bind")
        .handler()
        .clone();
    let second = section
        .controller(&registry, &controllers)
        .expect("bind")
        .handler()
        .clone();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(section.bound().map(|b| b.name()), Some("ContentController"));
}

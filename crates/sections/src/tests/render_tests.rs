use shared::domain::PageId;

use super::*;
use crate::{
    controller::SectionController,
    page::RelativeLinker,
    registry::SectionType,
    templates::TemplateSet,
};

fn registry() -> TypeRegistry {
    TypeRegistry::new(vec![
        SectionType::new("Section", None),
        SectionType::new("Content", Some("Section")).with_layouts(["wide"]),
        SectionType::new("Quote", Some("Section")),
    ])
    .expect("registry")
}

fn templates() -> TemplateSet {
    let mut templates = TemplateSet::new();
    templates.insert("Content", "[{{Pos}}/{{TotalItems}} {{TitleText}}]");
    templates.insert("Content_wide", "[wide {{TitleText}}]");
    templates.insert("Section", "[{{Title}}]");
    templates
}

fn env_with(templates: TemplateSet, controllers: ControllerRegistry) -> SectionEnv {
    SectionEnv {
        registry: Arc::new(registry()),
        controllers: Arc::new(controllers),
        templates: Arc::new(templates),
        linker: Arc::new(RelativeLinker),
        hooks: Arc::new(Hooks::new()),
    }
}

fn env() -> SectionEnv {
    env_with(templates(), ControllerRegistry::with_default())
}

fn page() -> PageRef {
    PageRef::new(PageId(1), "Page", "home", "Home & Away")
}

fn section(id: i64, type_id: &str, title: &str, sort: i64) -> SectionRecord {
    SectionRecord::new(SectionId(id), type_id, AreaId(1))
        .with_title(title)
        .with_sort(sort, sort)
}

fn area(allow_mobile_sort: bool, sections: Vec<SectionRecord>) -> Area {
    let mut record = AreaRecord::new(AreaId(1), PageId(1), "Sections", "Main");
    record.allow_mobile_sort = allow_mobile_sort;
    Area::new(record, sections)
}

#[test]
fn positions_count_visible_sections_only() {
    let env = env();
    let page = page();
    let scope = env.scope(&page);
    let mut hidden = section(2, "Content", "B", 1);
    hidden.show_for_desktop = false;
    let mut area = area(false, vec![section(1, "Content", "A", 0), hidden, section(3, "Content", "C", 2)]);

    assert_eq!(
        render_area(Some(&mut area), Viewport::Desktop, 0, &scope),
        "<div class=\"sections\">[1/2 A][2/2 C]</div>"
    );
    assert_eq!(
        render_area(Some(&mut area), Viewport::Mobile, 0, &scope),
        "<div class=\"sections\">[1/3 A][2/3 B][3/3 C]</div>"
    );
}

#[test]
fn offset_shifts_positions_and_total() {
    let env = env();
    let page = page();
    let scope = env.scope(&page);
    let mut area = area(false, vec![section(1, "Content", "A", 0), section(2, "Content", "B", 1)]);
    assert_eq!(
        render_area(Some(&mut area), Viewport::Desktop, 1, &scope),
        "<div class=\"sections\">[2/3 A][3/3 B]</div>"
    );
}

#[test]
fn mobile_render_follows_mobile_order_when_allowed() {
    let env = env();
    let page = page();
    let scope = env.scope(&page);
    let mut first = section(1, "Content", "A", 0);
    first.mobile_sort = 5;
    let mut area = area(true, vec![first, section(2, "Content", "B", 1)]);
    assert_eq!(
        render_area(Some(&mut area), Viewport::Mobile, 0, &scope),
        "<div class=\"sections\">[1/2 B][2/2 A]</div>"
    );
}

#[test]
fn absent_area_renders_nothing() {
    let env = env();
    let page = page();
    assert_eq!(
        render_area(None, Viewport::Desktop, 0, &env.scope(&page)),
        ""
    );
}

#[test]
fn failing_sections_are_left_out() {
    let mut templates = TemplateSet::new();
    templates.insert("Content", "[{{TitleText}}]");
    let env = env_with(templates, ControllerRegistry::with_default());
    let page = page();
    let scope = env.scope(&page);
    let mut area = area(
        false,
        vec![
            section(1, "Content", "A", 0),
            section(2, "Carousel", "Unknown type", 1),
            section(3, "Quote", "No template", 2),
            section(4, "Content", "D", 3),
        ],
    );
    assert_eq!(
        render_area(Some(&mut area), Viewport::Desktop, 0, &scope),
        "<div class=\"sections\">[A][D]</div>"
    );
}

#[test]
fn missing_default_controller_fails_the_section_only() {
    let env = env_with(templates(), ControllerRegistry::empty());
    let page = page();
    let scope = env.scope(&page);
    let mut area = area(false, vec![section(1, "Content", "A", 0)]);
    assert_eq!(
        render_area(Some(&mut area), Viewport::Desktop, 0, &scope),
        "<div class=\"sections\"></div>"
    );
}

#[test]
fn layout_selects_more_specific_template() {
    let env = env();
    let page = page();
    let scope = env.scope(&page);
    let mut wide = section(1, "Content", "Wide one", 0);
    wide.layout = Some("wide".into());
    let mut area = area(false, vec![wide]);
    assert_eq!(
        render_area(Some(&mut area), Viewport::Desktop, 0, &scope),
        "<div class=\"sections\">[wide Wide one]</div>"
    );
}

struct Extra;

impl SectionController for Extra {
    fn extend_context(&self, section: &SectionRecord, context: &mut RenderContext) {
        context.insert("Extra".into(), Value::String(format!("extra-{}", section.id)));
    }
}

#[test]
fn context_carries_standard_and_controller_values() {
    let mut controllers = ControllerRegistry::with_default();
    controllers.register("ContentController", |_| Arc::new(Extra) as Arc<dyn SectionController>);
    let env = env_with(templates(), controllers);
    let page = page();
    let scope = env.scope(&page);
    let mut record = section(4, "Content", "Fish & <Chips>", 0);
    record.extra.insert("Body".into(), json!("<p>raw</p>"));
    let area_record = AreaRecord::new(AreaId(1), PageId(1), "Sections", "Main");
    let bound = env.controllers.bind(&env.registry, &record).expect("bind");

    let context = section_context(&bound, &record, Some(&area_record), &scope).expect("context");
    assert_eq!(
        context["Title"],
        json!("<h1 class=\"content__title\">Fish &amp; &lt;Chips&gt;</h1>")
    );
    assert_eq!(context["Anchor"], json!("fish-and-chips"));
    assert_eq!(context["Class"], json!("content"));
    assert_eq!(context["Body"], json!("&lt;p&gt;raw&lt;/p&gt;"));
    assert_eq!(context["Link"], json!("/home/#fish-and-chips"));
    assert_eq!(context["ControllerLink"], json!("/home/section/4"));
    assert_eq!(context["PageTitle"], json!("Home &amp; Away"));
    assert_eq!(context["SortOrder"], Value::Null);
    assert_eq!(context["Extra"], json!("extra-4"));
    assert_eq!(context["First"], json!(true));
}

#[test]
fn standalone_section_uses_customised_data() {
    let mut templates = TemplateSet::new();
    templates.insert("Quote", "{{Title}}|{{Note}}|{{Pos}}");
    templates.insert("Section", "unused");
    let env = env_with(templates, ControllerRegistry::with_default());
    let page = page();
    let scope = env.scope(&page);

    let html = render_standalone("Quote", "Title=Title, Note=Hi <there>,broken", &scope)
        .expect("standalone");
    assert_eq!(html, "<h2>Home &amp; Away</h2>|Hi &lt;there&gt;|1");

    assert!(matches!(
        render_standalone("Carousel", "", &scope),
        Err(SectionError::UnknownType(_))
    ));
}

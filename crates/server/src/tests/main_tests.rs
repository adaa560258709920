use super::*;
use axum::{body, body::Body, http::Request, response::Response};
use sections::{page::RelativeLinker, permissions::StaticPermissions};
use serde_json::json;
use tower::ServiceExt;

const CONFIG: &str = r#"
[[section_types]]
id = "Content"
parent = "Section"
layouts = ["wide"]

[[section_types]]
id = "Gallery"
parent = "Section"

[[page_types.LandingPage.areas]]
slug = "Hero"
title = "Hero"

[[page_types.LandingPage.areas]]
slug = "Sections"
title = "Main"
"#;

async fn test_app() -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let config = SectionsConfig::from_toml_str(CONFIG).expect("config");
    let registry = config.build_registry().expect("registry");
    let mut templates = TemplateSet::new();
    templates.insert("Section", "<section {{AnchorAttr}}>{{Title}}</section>");
    let mut permissions = StaticPermissions::default();
    permissions.grant("editor", "CONTENTCREATE");
    permissions.grant("admin", "ADMIN");

    let api = ApiContext {
        storage,
        env: SectionEnv {
            registry: Arc::new(registry),
            controllers: Arc::new(ControllerRegistry::with_default()),
            templates: Arc::new(templates),
            linker: Arc::new(RelativeLinker),
            hooks: Arc::new(Hooks::new()),
        },
        config: Arc::new(config),
        permissions: Arc::new(permissions),
    };
    build_router(Arc::new(AppState { api }))
}

fn post_json(uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

async fn text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

async fn create_landing_page(app: &Router) -> i64 {
    let response = app
        .clone()
        .oneshot(post_json(
            "/pages",
            json!({ "page_type": "LandingPage", "url_segment": "landing", "title": "Landing" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let page: PageSummary = serde_json::from_str(&text(response).await).expect("json");
    page.page_id.0
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let response = app.oneshot(get("/healthz")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "ok");
}

#[tokio::test]
async fn created_page_exposes_configured_areas() {
    let app = test_app().await;
    let page_id = create_landing_page(&app).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/pages/{page_id}/areas")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let areas: Vec<AreaSummary> = serde_json::from_str(&text(response).await).expect("json");
    let slugs: Vec<&str> = areas.iter().map(|a| a.slug.as_str()).collect();
    assert_eq!(slugs, ["Hero", "Sections"]);

    let response = app
        .oneshot(get("/pages/999/areas"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sections_render_through_area_routes() {
    let app = test_app().await;
    let page_id = create_landing_page(&app).await;

    for (title, sort) in [("Second", 1), ("First", 0)] {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/pages/{page_id}/areas/Sections/sections"),
                json!({ "actor": "editor", "type_id": "Content", "title": title, "sort": sort }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(get(&format!("/pages/{page_id}/areas/Sections")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        text(response).await,
        "<div class=\"sections\">\
         <section id=\"first\"><h1 class=\"content__title\">First</h1></section>\
         <section id=\"second\"><h2 class=\"content__title\">Second</h2></section>\
         </div>"
    );

    let response = app
        .clone()
        .oneshot(get(&format!("/pages/{page_id}/areas/Sidebar?viewport=mobile")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "");

    let response = app
        .oneshot(get(&format!("/pages/{page_id}/areas/Sections/sections")))
        .await
        .expect("response");
    let sections: Vec<SectionSummary> =
        serde_json::from_str(&text(response).await).expect("json");
    assert_eq!(sections[0].link, "/landing/#first");
}

#[tokio::test]
async fn section_sub_routes_hand_off_or_return_not_found() {
    let app = test_app().await;
    let page_id = create_landing_page(&app).await;
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/pages/{page_id}/areas/Hero/sections"),
            json!({ "actor": "editor", "type_id": "Content", "title": "Hello" }),
        ))
        .await
        .expect("response");
    let section: SectionSummary = serde_json::from_str(&text(response).await).expect("json");
    let section_id = section.section_id.0;

    let response = app
        .clone()
        .oneshot(get(&format!("/pages/{page_id}/section/{section_id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Hello"));

    let response = app
        .clone()
        .oneshot(get(&format!("/pages/{page_id}/section/{section_id}/index")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/pages/{page_id}/section/{section_id}/vote/yes")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get(&format!("/pages/{page_id}/section/424242")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn write_errors_map_to_status_codes() {
    let app = test_app().await;
    let page_id = create_landing_page(&app).await;
    let uri = format!("/pages/{page_id}/areas/Sections/sections");

    let response = app
        .clone()
        .oneshot(post_json(
            &uri,
            json!({ "actor": "editor", "type_id": "Gallery", "title": "Nope" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(post_json(
            &uri,
            json!({ "actor": "admin", "type_id": "Content", "layout": "narrow" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = serde_json::from_str(&text(response).await).expect("json");
    assert_eq!(err.code, ErrorCode::Validation);

    let response = app
        .oneshot(
            Request::delete(format!("/pages/{page_id}/sections/77?actor=admin"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let app = test_app().await;
    let page_id = create_landing_page(&app).await;
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/pages/{page_id}/areas/Sections/sections"),
            json!({ "actor": "admin", "type_id": "Content", "title": "Draft" }),
        ))
        .await
        .expect("response");
    let section: SectionSummary = serde_json::from_str(&text(response).await).expect("json");
    let section_id = section.section_id.0;

    let response = app
        .clone()
        .oneshot(
            Request::put(format!("/pages/{page_id}/sections/{section_id}"))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "actor": "admin", "title": "Final", "title_semantic": "h3" })
                        .to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: SectionSummary = serde_json::from_str(&text(response).await).expect("json");
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.title_semantic.to_string(), "h3");

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/pages/{page_id}/sections/{section_id}?actor=admin"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/pages/{page_id}/areas/Sections")))
        .await
        .expect("response");
    assert_eq!(text(response).await, "<div class=\"sections\"></div>");
}

#[tokio::test]
async fn lists_section_types_and_permissions() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(get("/section_types?page_type=LandingPage"))
        .await
        .expect("response");
    let types: Vec<SectionTypeSummary> =
        serde_json::from_str(&text(response).await).expect("json");
    assert_eq!(types.len(), 2);

    let response = app.oneshot(get("/permissions")).await.expect("response");
    let permissions: Vec<PermissionDescriptor> =
        serde_json::from_str(&text(response).await).expect("json");
    assert_eq!(permissions.len(), 6);
    assert_eq!(permissions[0].code, "CONTENTCREATE");
}

#[tokio::test]
async fn standalone_sections_render_with_page_fields() {
    let app = test_app().await;
    let page_id = create_landing_page(&app).await;
    let response = app
        .oneshot(get(&format!(
            "/pages/{page_id}/standalone/Gallery?data=Title%3DTitle"
        )))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        text(response).await,
        "<section id=\"\"><h2>Landing</h2></section>"
    );
}

#[tokio::test]
async fn script_title_tag_is_rejected() {
    let app = test_app().await;
    let page_id = create_landing_page(&app).await;
    let response = app
        .oneshot(post_json(
            &format!("/pages/{page_id}/areas/Sections/sections"),
            json!({ "actor": "admin", "type_id": "Content", "title": "x", "title_semantic": "script" }),
        ))
        .await
        .expect("response");
    assert!(response.status().is_client_error());
    assert_ne!(response.status(), StatusCode::CREATED);
}

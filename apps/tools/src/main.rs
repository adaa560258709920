use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sections::{
    config::SectionsConfig, controller::ControllerRegistry, links::Hooks, page::RelativeLinker,
    permissions::StaticPermissions, render::SectionEnv, templates::TemplateSet,
};
use server_api::ApiContext;
use shared::{
    domain::{PageId, Viewport},
    error::ApiError,
    protocol::{CreateSectionRequest, SavePageRequest, SectionFields},
};
use storage::Storage;

const CLI_ACTOR: &str = "cli";

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://pages.db")]
    database_url: String,
    #[arg(long, default_value = "sections.toml")]
    sections_config: PathBuf,
    #[arg(long, default_value = "templates")]
    templates_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    ListPages,
    CreatePage {
        page_type: String,
        url_segment: String,
        title: String,
    },
    /// Builds missing areas; `--mobile-sort Hero` switches mobile ordering on.
    SavePage {
        page_id: i64,
        #[arg(long = "mobile-sort")]
        mobile_sort: Vec<String>,
    },
    AddSection {
        page_id: i64,
        area: String,
        type_id: String,
        title: String,
        #[arg(long, default_value_t = 0)]
        sort: i64,
        #[arg(long)]
        mobile_sort: Option<i64>,
        #[arg(long)]
        layout: Option<String>,
    },
    RenderArea {
        page_id: i64,
        area: String,
        #[arg(long)]
        mobile: bool,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = build_context(storage, &cli)?;

    match cli.command {
        Command::ListPages => {
            for page in server_api::list_pages(&ctx).await.map_err(api_error)? {
                println!(
                    "{}\t{}\t/{}/\t{}",
                    page.page_id, page.page_type, page.url_segment, page.title
                );
            }
        }
        Command::CreatePage {
            page_type,
            url_segment,
            title,
        } => {
            let page =
                server_api::create_page(&ctx, &page_type, &url_segment, &title, &BTreeMap::new())
                    .await
                    .map_err(api_error)?;
            println!("created page_id={}", page.page_id);
        }
        Command::SavePage {
            page_id,
            mobile_sort,
        } => {
            let request = SavePageRequest {
                allow_mobile_sort: mobile_sort.into_iter().map(|slug| (slug, true)).collect(),
            };
            let areas = server_api::save_page(&ctx, PageId(page_id), request)
                .await
                .map_err(api_error)?;
            for area in areas {
                println!(
                    "{}\t{}\tsections={}\tmobile_sort={}",
                    area.area_id, area.slug, area.section_count, area.allow_mobile_sort
                );
            }
        }
        Command::AddSection {
            page_id,
            area,
            type_id,
            title,
            sort,
            mobile_sort,
            layout,
        } => {
            let request = CreateSectionRequest {
                actor: CLI_ACTOR.into(),
                type_id,
                fields: SectionFields {
                    title: Some(title),
                    sort: Some(sort),
                    mobile_sort: Some(mobile_sort.unwrap_or(sort)),
                    layout,
                    ..SectionFields::default()
                },
            };
            let section = server_api::create_section(&ctx, PageId(page_id), &area, request)
                .await
                .map_err(api_error)?;
            println!("created section_id={} link={}", section.section_id, section.link);
        }
        Command::RenderArea {
            page_id,
            area,
            mobile,
            offset,
        } => {
            let viewport = if mobile {
                Viewport::Mobile
            } else {
                Viewport::Desktop
            };
            let rendered = server_api::render_area(&ctx, PageId(page_id), &area, viewport, offset)
                .await
                .map_err(api_error)?;
            println!("{}", rendered.html);
        }
    }

    Ok(())
}

fn build_context(storage: Storage, cli: &Cli) -> Result<ApiContext> {
    let raw = std::fs::read_to_string(&cli.sections_config).with_context(|| {
        format!(
            "failed to read sections config '{}'",
            cli.sections_config.display()
        )
    })?;
    let config = SectionsConfig::from_toml_str(&raw)?;
    let registry = config.build_registry()?;
    let templates = if cli.templates_dir.is_dir() {
        TemplateSet::from_dir(&cli.templates_dir)?
    } else {
        TemplateSet::new()
    };
    let mut permissions = StaticPermissions::default();
    permissions.grant(CLI_ACTOR, sections::permissions::ADMIN_CODE);

    Ok(ApiContext {
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
    })
}

fn api_error(err: ApiError) -> anyhow::Error {
    anyhow::anyhow!("{:?}: {}", err.code, err.message)
}

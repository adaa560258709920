use std::{collections::HashMap, fmt, sync::Arc};

use shared::domain::TitleSemantic;
use tracing::debug;

use crate::{
    area::AreaRecord,
    error::SectionError,
    links,
    page::join_links,
    registry::{SectionType, TypeRegistry},
    render::{self, RenderScope},
    section::SectionRecord,
    templates::RenderContext,
};

pub const DEFAULT_CONTROLLER: &str = "SectionController";
pub const CONTROLLER_SUFFIX: &str = "Controller";

/// Behaviour attached to a section type. Implementations are created once
/// per section instance and may keep per-section state.
pub trait SectionController: Send + Sync {
    /// Runs once, right after the controller is bound.
    fn init(&self, _section: &SectionRecord) {}

    /// Adds template variables on top of the standard section context.
    fn extend_context(&self, _section: &SectionRecord, _context: &mut RenderContext) {}

    /// Handles a section-scoped sub-route other than `index`. `None` means
    /// the action is not handled here.
    fn handle_action(
        &self,
        _section: &SectionRecord,
        _action: &str,
        _scope: &RenderScope<'_>,
    ) -> Option<String> {
        None
    }
}

#[derive(Debug, Default)]
pub struct DefaultController;

impl SectionController for DefaultController {}

pub type ControllerFactory =
    Arc<dyn Fn(&SectionRecord) -> Arc<dyn SectionController> + Send + Sync>;

/// Controller types by name. Section types pick one by explicit override or
/// by the `{Type}Controller` naming convention.
#[derive(Clone)]
pub struct ControllerRegistry {
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding only the default controller.
    pub fn with_default() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_CONTROLLER, |_| {
            Arc::new(DefaultController) as Arc<dyn SectionController>
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SectionRecord) -> Arc<dyn SectionController> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Startup check that the fallback controller is present.
    pub fn validate(&self) -> Result<(), SectionError> {
        if self.contains(DEFAULT_CONTROLLER) {
            Ok(())
        } else {
            Err(SectionError::ControllerResolution {
                section_type: String::new(),
                default: DEFAULT_CONTROLLER.to_string(),
            })
        }
    }

    /// Name of the most specific controller along the type's ancestry.
    pub fn resolve_name(
        &self,
        registry: &TypeRegistry,
        type_id: &str,
    ) -> Result<String, SectionError> {
        for section_type in registry.ancestry(type_id)? {
            if let Some(name) = section_type.controller.as_deref() {
                if self.contains(name) {
                    return Ok(name.to_string());
                }
            }
            let conventional = format!("{}{CONTROLLER_SUFFIX}", section_type.id);
            if self.contains(&conventional) {
                return Ok(conventional);
            }
        }
        if self.contains(DEFAULT_CONTROLLER) {
            Ok(DEFAULT_CONTROLLER.to_string())
        } else {
            Err(SectionError::ControllerResolution {
                section_type: type_id.to_string(),
                default: DEFAULT_CONTROLLER.to_string(),
            })
        }
    }

    pub fn bind(
        &self,
        registry: &TypeRegistry,
        section: &SectionRecord,
    ) -> Result<BoundController, SectionError> {
        let name = self.resolve_name(registry, &section.type_id)?;
        let factory = self
            .factories
            .get(&name)
            .ok_or_else(|| SectionError::ControllerResolution {
                section_type: section.type_id.clone(),
                default: DEFAULT_CONTROLLER.to_string(),
            })?;
        let handler = factory(section);
        handler.init(section);
        debug!(section_id = %section.id, controller = %name, "bound section controller");
        Ok(BoundController {
            handler,
            name,
            position: 1,
            total: 1,
        })
    }
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::with_default()
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ControllerRegistry")
            .field("controllers", &names)
            .finish()
    }
}

/// A controller bound to one section, plus the placement the area renderer
/// injects before each render.
pub struct BoundController {
    handler: Arc<dyn SectionController>,
    name: String,
    position: usize,
    total: usize,
}

impl BoundController {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &Arc<dyn SectionController> {
        &self.handler
    }

    pub fn place(&mut self, position: usize, total: usize) {
        self.position = position;
        self.total = total;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_first(&self) -> bool {
        self.position == 1
    }

    pub fn is_last(&self) -> bool {
        self.position == self.total
    }

    pub fn is_middle(&self) -> bool {
        !self.is_first() && !self.is_last()
    }

    /// Element name the title renders in, or `None` when it is hidden.
    pub fn title_tag(&self, section: &SectionRecord, section_type: &SectionType) -> Option<String> {
        if section_type.title_force_hide || section.title_hide {
            return None;
        }
        match &section.title_semantic {
            TitleSemantic::Hide => None,
            TitleSemantic::Auto if self.is_first() => Some("h1".to_string()),
            TitleSemantic::Auto => Some("h2".to_string()),
            TitleSemantic::Tag(tag) if !TitleSemantic::EXTRA_TAGS.contains(&tag.as_str()) => None,
            explicit => Some(explicit.to_string()),
        }
    }

    /// `<tag class="{class}__title">title</tag>`; `escaped_title` must
    /// already be escaped.
    pub fn title_element(
        &self,
        section: &SectionRecord,
        section_type: &SectionType,
        escaped_title: &str,
    ) -> Option<String> {
        if escaped_title.trim().is_empty() {
            return None;
        }
        let tag = self.title_tag(section, section_type)?;
        let class = links::css_class(section_type);
        Some(format!(
            "<{tag} class=\"{class}__title\">{escaped_title}</{tag}>"
        ))
    }

    /// `section/{id}/{action}` under the owning page.
    pub fn link(&self, section: &SectionRecord, scope: &RenderScope<'_>, action: Option<&str>) -> String {
        let id = section.id.to_string();
        let segment = join_links(&["section", &id, action.unwrap_or_default()]);
        scope.linker().page_link(scope.page(), Some(&segment))
    }

    pub fn render(
        &self,
        section: &SectionRecord,
        area: Option<&AreaRecord>,
        scope: &RenderScope<'_>,
    ) -> Result<String, SectionError> {
        render::render_bound(self, section, area, scope, None)
    }

    /// Dispatches a section sub-route. `index` (or no action) renders the
    /// section; other actions go to the controller.
    pub fn handle(
        &self,
        section: &SectionRecord,
        area: Option<&AreaRecord>,
        action: Option<&str>,
        scope: &RenderScope<'_>,
    ) -> Result<Option<String>, SectionError> {
        match action {
            None | Some("") | Some("index") => self.render(section, area, scope).map(Some),
            Some(action) => Ok(self.handler.handle_action(section, action, scope)),
        }
    }
}

impl fmt::Debug for BoundController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundController")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("total", &self.total)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

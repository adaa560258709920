//! Sectioned content pages: typed, orderable sections grouped into named
//! areas, rendered through a template cascade and per-section controllers.

pub mod area;
pub mod cascade;
pub mod composition;
pub mod config;
pub mod controller;
pub mod error;
pub mod links;
pub mod ordering;
pub mod page;
pub mod permissions;
pub mod registry;
pub mod render;
pub mod section;
pub mod store;
pub mod templates;

pub use area::{Area, AreaRecord};
pub use composition::SectionedPage;
pub use config::{AreaSlot, SectionsConfig};
pub use controller::{BoundController, ControllerRegistry, SectionController};
pub use error::{RegistryError, SectionError};
pub use links::{Hooks, LinkObserver};
pub use page::{PageLinker, PageRef, RelativeLinker};
pub use permissions::{PermissionChecker, SectionAction, StaticPermissions};
pub use registry::{CreationPolicy, SectionType, TypeRegistry};
pub use render::{RenderScope, SectionEnv};
pub use section::{Section, SectionRecord};
pub use store::{SearchIndexer, SectionStore, SectionWrite};
pub use templates::{RenderContext, TemplateEngine, TemplateSet};

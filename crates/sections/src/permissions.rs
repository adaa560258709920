use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use shared::protocol::PermissionDescriptor;

use crate::registry::TypeRegistry;

/// Grants every permission code.
pub const ADMIN_CODE: &str = "ADMIN";
pub const ANY_SCOPE: &str = "any";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionAction {
    Create,
    Edit,
    Delete,
}

impl SectionAction {
    pub const ALL: [SectionAction; 3] = [
        SectionAction::Create,
        SectionAction::Edit,
        SectionAction::Delete,
    ];

    fn code(self) -> &'static str {
        match self {
            SectionAction::Create => "CREATE",
            SectionAction::Edit => "EDIT",
            SectionAction::Delete => "DELETE",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            SectionAction::Create => "Create",
            SectionAction::Edit => "Edit",
            SectionAction::Delete => "Delete",
        }
    }
}

impl fmt::Display for SectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Answers whether `actor` holds permission `code` in `scope`.
pub trait PermissionChecker: Send + Sync {
    fn check(&self, code: &str, scope: &str, actor: &str) -> bool;
}

/// `{TYPE}CREATE`, `{TYPE}EDIT` or `{TYPE}DELETE`, type id upper-cased.
pub fn permission_code(type_id: &str, action: SectionAction) -> String {
    format!("{}{}", type_id.to_uppercase(), action.code())
}

/// Permission descriptors for every non-root section type.
pub fn provide_permissions(registry: &TypeRegistry) -> Vec<PermissionDescriptor> {
    let root = registry.root().id.as_str();
    registry
        .types()
        .filter(|section_type| section_type.id != root)
        .flat_map(|section_type| {
            let label = section_type.label().to_string();
            let id = section_type.id.clone();
            SectionAction::ALL.into_iter().map(move |action| PermissionDescriptor {
                code: permission_code(&id, action),
                name: format!("{action} {ANY_SCOPE} '{label}' section"),
                category: format!("Section '{label}' permissions"),
            })
        })
        .collect()
}

pub fn can(checker: &dyn PermissionChecker, type_id: &str, action: SectionAction, actor: &str) -> bool {
    checker.check(&permission_code(type_id, action), ANY_SCOPE, actor)
}

pub fn can_view(_type_id: &str, _actor: &str) -> bool {
    true
}

pub fn can_reorder(_type_id: &str, _actor: &str) -> bool {
    true
}

/// Fixed grants per actor, read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    grants: HashMap<String, BTreeSet<String>>,
}

impl StaticPermissions {
    pub fn new(grants: HashMap<String, BTreeSet<String>>) -> Self {
        Self { grants }
    }

    pub fn grant(&mut self, actor: impl Into<String>, code: impl Into<String>) {
        self.grants
            .entry(actor.into())
            .or_default()
            .insert(code.into());
    }
}

impl PermissionChecker for StaticPermissions {
    fn check(&self, code: &str, _scope: &str, actor: &str) -> bool {
        self.grants
            .get(actor)
            .is_some_and(|codes| codes.contains(ADMIN_CODE) || codes.contains(code))
    }
}

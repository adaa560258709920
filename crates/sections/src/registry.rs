use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Deserialize;

use crate::error::{RegistryError, SectionError};

pub const ROOT_TYPE: &str = "Section";

fn default_searchable_fields() -> Vec<String> {
    vec!["Title".to_string()]
}

/// One registered section type. Types form a tree through `parent`; the
/// single parentless type is the root every ancestry walk ends at.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionType {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub controller: Option<String>,
    #[serde(default)]
    pub allowed_children: Option<BTreeSet<String>>,
    #[serde(default)]
    pub layouts: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub base_class: Option<String>,
    #[serde(default)]
    pub title_force_hide: bool,
    #[serde(default = "default_searchable_fields")]
    pub searchable_fields: Vec<String>,
}

impl SectionType {
    pub fn new(id: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            parent: parent.map(str::to_string),
            label: None,
            controller: None,
            allowed_children: None,
            layouts: Vec::new(),
            colors: Vec::new(),
            base_class: None,
            title_force_hide: false,
            searchable_fields: default_searchable_fields(),
        }
    }

    pub fn with_layouts<I, S>(mut self, layouts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layouts = layouts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.colors = colors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    pub fn with_searchable_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn allows_layout(&self, layout: &str) -> bool {
        self.layouts.is_empty() || self.layouts.iter().any(|l| l == layout)
    }

    pub fn allows_color(&self, color: &str) -> bool {
        self.colors.is_empty() || self.colors.iter().any(|c| c == color)
    }
}

/// Allow/deny filter over creatable section types. An absent allow-list
/// admits everything; the deny-list always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationPolicy {
    pub allowed: Option<BTreeSet<String>>,
    pub excluded: BTreeSet<String>,
}

impl CreationPolicy {
    pub fn new(allowed: Option<BTreeSet<String>>, excluded: BTreeSet<String>) -> Self {
        Self { allowed, excluded }
    }

    pub fn permits(&self, type_id: &str) -> bool {
        if self.excluded.contains(type_id) {
            return false;
        }
        self.allowed
            .as_ref()
            .map_or(true, |allowed| allowed.contains(type_id))
    }

    /// Narrows this policy by another: both allow-lists must admit a type
    /// and either deny-list rejects it.
    pub fn narrowed_by(&self, other: &CreationPolicy) -> CreationPolicy {
        let allowed = match (&self.allowed, &other.allowed) {
            (Some(a), Some(b)) => Some(a.intersection(b).cloned().collect()),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        CreationPolicy {
            allowed,
            excluded: self.excluded.union(&other.excluded).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, SectionType>,
    order: Vec<String>,
    root: String,
}

impl TypeRegistry {
    pub fn new(types: Vec<SectionType>) -> Result<Self, RegistryError> {
        let mut map = HashMap::with_capacity(types.len());
        let mut order = Vec::with_capacity(types.len());
        for section_type in types {
            if map.contains_key(&section_type.id) {
                return Err(RegistryError::DuplicateType(section_type.id));
            }
            order.push(section_type.id.clone());
            map.insert(section_type.id.clone(), section_type);
        }

        let roots: Vec<String> = order
            .iter()
            .filter(|id| map[*id].is_root())
            .cloned()
            .collect();
        if roots.len() != 1 {
            return Err(RegistryError::RootCount(roots));
        }

        for id in &order {
            let mut seen = HashSet::new();
            let mut current = id.as_str();
            loop {
                if !seen.insert(current) {
                    return Err(RegistryError::Cycle(id.clone()));
                }
                let Some(parent) = map[current].parent.as_deref() else {
                    break;
                };
                if !map.contains_key(parent) {
                    return Err(RegistryError::UnknownParent {
                        child: current.to_string(),
                        parent: parent.to_string(),
                    });
                }
                current = parent;
            }
        }

        Ok(Self {
            types: map,
            order,
            root: roots[0].clone(),
        })
    }

    pub fn get(&self, type_id: &str) -> Result<&SectionType, SectionError> {
        self.types
            .get(type_id)
            .ok_or_else(|| SectionError::UnknownType(type_id.to_string()))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    pub fn root(&self) -> &SectionType {
        &self.types[&self.root]
    }

    /// Registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &SectionType> {
        self.order.iter().map(|id| &self.types[id])
    }

    /// Most-specific first, ending with the root type.
    pub fn ancestry(&self, type_id: &str) -> Result<Vec<&SectionType>, SectionError> {
        let mut chain = Vec::new();
        let mut current = Some(self.get(type_id)?);
        while let Some(section_type) = current {
            chain.push(section_type);
            current = match section_type.parent.as_deref() {
                Some(parent) => Some(self.get(parent)?),
                None => None,
            };
        }
        Ok(chain)
    }

    pub fn is_descendant_of(&self, type_id: &str, ancestor: &str) -> Result<bool, SectionError> {
        Ok(self
            .ancestry(type_id)?
            .iter()
            .any(|section_type| section_type.id == ancestor))
    }

    /// Types that may be created beneath `type_id`. A type without its own
    /// list falls back to every non-root type.
    pub fn allowed_child_types(
        &self,
        type_id: &str,
        policy: &CreationPolicy,
    ) -> Result<BTreeSet<String>, SectionError> {
        let section_type = self.get(type_id)?;
        let candidates: BTreeSet<String> = match &section_type.allowed_children {
            Some(children) => children
                .iter()
                .filter(|id| self.contains(id))
                .cloned()
                .collect(),
            None => self.non_root_ids().collect(),
        };
        Ok(candidates
            .into_iter()
            .filter(|id| policy.permits(id))
            .collect())
    }

    /// Creatable types for a page, in registration order.
    pub fn allowed_sections(&self, policy: &CreationPolicy) -> Vec<String> {
        self.non_root_ids().filter(|id| policy.permits(id)).collect()
    }

    fn non_root_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.order
            .iter()
            .filter(move |id| **id != self.root)
            .cloned()
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;

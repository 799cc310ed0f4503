use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::models::MenuItem;

/// Placeholder substituted with the record id in edit/show templates.
pub const ID_PLACEHOLDER: &str = ":id";

/// ResourceDescriptor
///
/// Static description of one resource: its registry name (also the upstream
/// collection name), the UI paths of its four screens and its capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub name: String,
    pub label: String,
    pub list_path: Option<String>,
    pub create_path: Option<String>,
    /// Templated by `:id`.
    pub edit_path: Option<String>,
    /// Templated by `:id`.
    pub show_path: Option<String>,
    pub can_delete: bool,
}

impl ResourceDescriptor {
    /// Descriptor exposing all four screens under `/{segment}`.
    pub fn crud(name: &str, label: &str, segment: &str, can_delete: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            list_path: Some(format!("/{segment}")),
            create_path: Some(format!("/{segment}/create")),
            edit_path: Some(format!("/{segment}/edit/{ID_PLACEHOLDER}")),
            show_path: Some(format!("/{segment}/show/{ID_PLACEHOLDER}")),
            can_delete,
        }
    }

    pub fn edit_url(&self, id: &str) -> Option<String> {
        self.edit_path
            .as_ref()
            .map(|template| template.replace(ID_PLACEHOLDER, id))
    }

    pub fn show_url(&self, id: &str) -> Option<String> {
        self.show_path
            .as_ref()
            .map(|template| template.replace(ID_PLACEHOLDER, id))
    }

    fn exposes_all_paths(&self) -> bool {
        self.list_path.is_some()
            && self.create_path.is_some()
            && self.edit_path.is_some()
            && self.show_path.is_some()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("resource registry is empty")]
    Empty,

    #[error("resource name must not be empty")]
    EmptyName,

    #[error("duplicate resource name: {0}")]
    Duplicate(String),

    #[error("resource {0} allows deletion but does not expose list, create, edit and show paths")]
    IncompleteDeletable(String),

    #[error("path template {path} of resource {resource} is missing the :id placeholder")]
    MissingIdPlaceholder { resource: String, path: String },

    #[error("route references unregistered resource {0}")]
    UnregisteredRoute(String),
}

/// ResourceRegistry
///
/// The immutable list of resources the shell knows about. Registration order
/// matters: the first resource is the default landing page.
#[derive(Debug)]
pub struct ResourceRegistry {
    resources: Vec<ResourceDescriptor>,
}

/// Shared handle stored in `AppState`.
pub type RegistryState = Arc<ResourceRegistry>;

impl ResourceRegistry {
    /// Validates and freezes the descriptors.
    ///
    /// # Errors
    /// Fails when the list is empty, a name is empty or duplicated, a
    /// deletable resource lacks one of its four paths, or an edit/show
    /// template has no `:id`.
    pub fn new(resources: Vec<ResourceDescriptor>) -> Result<Self, RegistryError> {
        if resources.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for resource in &resources {
            if resource.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(RegistryError::Duplicate(resource.name.clone()));
            }
            if resource.can_delete && !resource.exposes_all_paths() {
                return Err(RegistryError::IncompleteDeletable(resource.name.clone()));
            }
            for template in [&resource.edit_path, &resource.show_path].into_iter().flatten() {
                if !template.contains(ID_PLACEHOLDER) {
                    return Err(RegistryError::MissingIdPlaceholder {
                        resource: resource.name.clone(),
                        path: template.clone(),
                    });
                }
            }
        }

        Ok(Self { resources })
    }

    /// The resources served by the admin panel: blog posts and categories
    /// against the default REST origin.
    ///
    /// # Errors
    /// Never in practice; the descriptors are fixed and valid.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(vec![
            ResourceDescriptor::crud("blog_posts", "Blog Posts", "blog-posts", true),
            ResourceDescriptor::crud("categories", "Categories", "categories", true),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|resource| resource.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|resource| resource.name.as_str())
    }

    /// First registered resource. `new` guarantees there is one.
    pub fn default_resource(&self) -> &ResourceDescriptor {
        &self.resources[0]
    }

    /// Where authenticated visitors land: the default resource's list page,
    /// or `/` when that resource has no list screen.
    pub fn default_path(&self) -> String {
        self.default_resource()
            .list_path
            .clone()
            .unwrap_or_else(|| "/".to_string())
    }

    /// Navigation entries for every resource with a list screen.
    pub fn menu(&self) -> Vec<MenuItem> {
        self.resources
            .iter()
            .filter_map(|resource| {
                resource.list_path.as_ref().map(|path| MenuItem {
                    name: resource.name.clone(),
                    label: resource.label.clone(),
                    path: path.clone(),
                })
            })
            .collect()
    }
}

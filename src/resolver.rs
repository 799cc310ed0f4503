use crate::models::ViewKind;
use crate::registry::{ID_PLACEHOLDER, RegistryError, ResourceRegistry};

/// Access
///
/// Session state a route demands before it may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Requires an authenticated session.
    Protected,
    /// Login, register and forgot-password: only without a session.
    GuestOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Id,
}

/// Route
///
/// One entry of the route table.
#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: String,
    pub access: Access,
    pub view: ViewKind,
    pub resource: Option<String>,
    segments: Vec<Segment>,
}

impl Route {
    fn new(pattern: &str, view: ViewKind, resource: Option<&str>) -> Self {
        let segments = split(pattern)
            .map(|part| {
                if part == ID_PLACEHOLDER {
                    Segment::Id
                } else {
                    Segment::Literal(part.to_string())
                }
            })
            .collect();

        let access = if view.is_auth_screen() {
            Access::GuestOnly
        } else {
            Access::Protected
        };

        Self {
            pattern: pattern.to_string(),
            access,
            view,
            resource: resource.map(str::to_string),
            segments,
        }
    }

    fn matches<'a>(&self, parts: &[&'a str]) -> Option<Option<&'a str>> {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut id = None;
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Id => id = Some(*part),
            }
        }
        Some(id)
    }
}

/// RouteMatch
///
/// The resolver's answer: which view, bound to which resource and record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub view: ViewKind,
    pub resource: Option<String>,
    pub id: Option<String>,
    pub access: Access,
    /// Normalized path that was resolved.
    pub path: String,
}

impl RouteMatch {
    pub fn is_not_found(&self) -> bool {
        self.view == ViewKind::NotFound
    }
}

/// RouteTable
///
/// Static table derived from the registry plus the fixed auth routes.
/// Unknown paths resolve to the catch-all not-found view, which sits behind
/// the authenticated layout like every resource screen.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn from_registry(registry: &ResourceRegistry) -> Self {
        let mut routes = vec![Route::new("/", ViewKind::Index, None)];

        for resource in registry.iter() {
            let name = Some(resource.name.as_str());
            let screens = [
                (&resource.list_path, ViewKind::List),
                (&resource.create_path, ViewKind::Create),
                (&resource.edit_path, ViewKind::Edit),
                (&resource.show_path, ViewKind::Show),
            ];
            for (path, view) in screens {
                if let Some(path) = path {
                    routes.push(Route::new(path, view, name));
                }
            }
        }

        routes.push(Route::new("/login", ViewKind::Login, None));
        routes.push(Route::new("/register", ViewKind::Register, None));
        routes.push(Route::new("/forgot-password", ViewKind::ForgotPassword, None));

        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Checks that every resource named by a route is registered.
    ///
    /// # Errors
    /// `RegistryError::UnregisteredRoute` with the first unknown name.
    pub fn verify(&self, registry: &ResourceRegistry) -> Result<(), RegistryError> {
        match self
            .routes
            .iter()
            .filter_map(|route| route.resource.as_deref())
            .find(|name| !registry.contains(name))
        {
            Some(name) => Err(RegistryError::UnregisteredRoute(name.to_string())),
            None => Ok(()),
        }
    }

    pub fn references_only(&self, registry: &ResourceRegistry) -> bool {
        self.verify(registry).is_ok()
    }

    /// resolve
    ///
    /// Maps a request path to its view. Never fails: anything unrecognized,
    /// including an edit/show path without its id or with an id that is not
    /// valid percent-encoded UTF-8, is `NotFound`.
    pub fn resolve(&self, raw_path: &str) -> RouteMatch {
        let path = normalize_path(raw_path);
        let parts: Vec<&str> = split(&path).collect();

        for route in &self.routes {
            if let Some(id) = route.matches(&parts) {
                // Ids are decoded here, as axum decodes `{id}` on the data API.
                let id = match id.map(urlencoding::decode).transpose() {
                    Ok(id) => id.map(|id| id.into_owned()),
                    Err(_) => continue,
                };
                return RouteMatch {
                    view: route.view,
                    resource: route.resource.clone(),
                    id,
                    access: route.access,
                    path,
                };
            }
        }

        RouteMatch {
            view: ViewKind::NotFound,
            resource: None,
            id: None,
            access: Access::Protected,
            path,
        }
    }
}

/// normalize_path
///
/// Drops query and fragment, collapses repeated slashes and removes the
/// trailing slash. The root stays `/`.
pub fn normalize_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let parts: Vec<&str> = split(&raw[..end]).collect();
    format!("/{}", parts.join("/"))
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

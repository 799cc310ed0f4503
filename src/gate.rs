use crate::auth::Session;
use crate::resolver::{Access, RouteMatch, normalize_path};

pub const LOGIN_PATH: &str = "/login";

/// GateDecision
///
/// Outcome of the auth gate. Authentication problems never become errors:
/// they become redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render,
    Redirect {
        to: String,
        /// Page to come back to after logging in.
        return_to: Option<String>,
    },
}

impl GateDecision {
    /// `Location` header value; the return target travels as `?to=`.
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Render => None,
            Self::Redirect {
                to,
                return_to: Some(back),
            } => Some(format!("{to}?to={}", urlencoding::encode(back))),
            Self::Redirect { to, .. } => Some(to.clone()),
        }
    }
}

/// AuthGate
///
/// Render-or-redirect decision for a resolved route.
#[derive(Debug, Clone)]
pub struct AuthGate {
    default_path: String,
}

impl AuthGate {
    /// `default_path` is where authenticated visitors of an auth screen go.
    pub fn new(default_path: impl Into<String>) -> Self {
        Self {
            default_path: default_path.into(),
        }
    }

    pub fn default_path(&self) -> &str {
        &self.default_path
    }

    pub fn decide(&self, route: &RouteMatch, session: &Session) -> GateDecision {
        match (route.access, session.is_authenticated) {
            (Access::Protected, false) => GateDecision::Redirect {
                to: LOGIN_PATH.to_string(),
                // Bouncing from `/` gains nothing; login lands on the default page anyway.
                return_to: (route.path != "/").then(|| route.path.clone()),
            },
            (Access::GuestOnly, true) => GateDecision::Redirect {
                to: self.default_path.clone(),
                return_to: None,
            },
            _ => GateDecision::Render,
        }
    }
}

/// Accepts a `to` target only if it is a local absolute path, so the login
/// form cannot be turned into an open redirect. Browsers read `/\` like
/// `//` and drop tabs and newlines, so backslashes and control characters
/// are refused anywhere in the target.
pub fn sanitize_return_to(to: Option<&str>) -> Option<String> {
    let target = to?;
    if !target.starts_with('/') || target.starts_with("//") {
        return None;
    }
    if target.contains('\\') || target.chars().any(|c| c.is_control()) {
        return None;
    }
    if normalize_path(target) == LOGIN_PATH {
        return None;
    }
    Some(target.to_string())
}

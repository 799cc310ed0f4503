
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Views ---

/// ViewKind
///
/// Identifies the screen the front end should render for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ViewKind {
    /// `/`: immediately forwarded to the default resource.
    Index,
    List,
    Create,
    Edit,
    Show,
    Login,
    Register,
    ForgotPassword,
    NotFound,
}

impl ViewKind {
    /// Auth screens are only shown to visitors without a session.
    pub fn is_auth_screen(self) -> bool {
        matches!(self, Self::Login | Self::Register | Self::ForgotPassword)
    }
}

/// MenuItem
///
/// One entry of the side navigation, built from the resource registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MenuItem {
    pub name: String,
    pub label: String,
    pub path: String,
}

/// ViewModel
///
/// Response body of every rendered navigation. `records` is filled for list
/// views, `record` for edit/show views.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ViewModel {
    pub view: ViewKind,
    pub resource: Option<String>,
    pub id: Option<String>,
    pub title: String,
    pub can_delete: bool,
    pub menu: Vec<MenuItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<ListResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub record: Option<Value>,
}

// --- Notifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Notification
///
/// The toast the front end shows after an action. Failures of data requests
/// are always reported through one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
            description: None,
        }
    }

    pub fn error(message: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
            description: Some(description.into()),
        }
    }
}

// --- Data ---

/// ListResult
///
/// One page of records plus the total number of records matching the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListResult {
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Value>,
    pub total: u64,
}

/// MutationResponse
///
/// Result of create/update/delete. `list` is the first page of the resource
/// fetched after the mutation completed, under the same resource lock; it is
/// absent when that refresh failed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MutationResponse {
    #[schema(value_type = Object)]
    pub data: Value,
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ListResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gte,
    Lte,
    Contains,
}

impl FilterOperator {
    /// Query-string suffix used by json-server style backends.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Eq => "",
            Self::Ne => "_ne",
            Self::Gte => "_gte",
            Self::Lte => "_lte",
            Self::Contains => "_like",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sorter {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current: u32,
    pub page_size: u32,
}

impl Pagination {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Zero-based, half-open `[start, end)` window of the page.
    pub fn window(&self) -> (u64, u64) {
        let start = u64::from(self.current.saturating_sub(1)) * u64::from(self.page_size);
        (start, start + u64::from(self.page_size))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// ListParams
///
/// Filters, sorters and pagination for a list call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    pub filters: Vec<Filter>,
    pub sorters: Vec<Sorter>,
    pub pagination: Pagination,
}

impl ListParams {
    /// Builds list parameters from a navigation or API query string, given
    /// as pairs in request order so repeated keys (`id=1&id=2`) survive.
    ///
    /// Reserved keys: `current`, `page_size`, `sort` (`title,-id`) and `to`.
    /// Keys starting with `_` belong to the upstream protocol and are
    /// dropped. Any other key is a filter; suffixes `_ne`, `_gte`, `_lte`
    /// and `_like` select the operator, no suffix means equality.
    /// Unparseable numbers fall back to the defaults.
    pub fn from_query(query: &[(String, String)]) -> Self {
        let mut params = Self::default();

        for (key, value) in query {
            match key.as_str() {
                "current" => {
                    if let Ok(current) = value.parse::<u32>() {
                        params.pagination.current = current.max(1);
                    }
                }
                "page_size" => {
                    if let Ok(size) = value.parse::<u32>() {
                        params.pagination.page_size = size.clamp(1, Pagination::MAX_PAGE_SIZE);
                    }
                }
                "sort" => {
                    params.sorters = value
                        .split(',')
                        .map(str::trim)
                        .filter(|field| !field.is_empty() && *field != "-")
                        .map(|field| match field.strip_prefix('-') {
                            Some(desc) => Sorter {
                                field: desc.to_string(),
                                order: SortOrder::Desc,
                            },
                            None => Sorter {
                                field: field.to_string(),
                                order: SortOrder::Asc,
                            },
                        })
                        .collect();
                }
                "to" => {}
                reserved if reserved.starts_with('_') => {
                    tracing::debug!(key = reserved, "dropping reserved list parameter");
                }
                _ => params.filters.push(parse_filter(key, value)),
            }
        }

        params
    }
}

fn parse_filter(key: &str, value: &str) -> Filter {
    const OPERATORS: [FilterOperator; 4] = [
        FilterOperator::Ne,
        FilterOperator::Gte,
        FilterOperator::Lte,
        FilterOperator::Contains,
    ];

    for operator in OPERATORS {
        if let Some(field) = key.strip_suffix(operator.suffix()) {
            if !field.is_empty() {
                return Filter {
                    field: field.to_string(),
                    operator,
                    value: value.to_string(),
                };
            }
        }
    }

    Filter {
        field: key.to_string(),
        operator: FilterOperator::Eq,
        value: value.to_string(),
    }
}

// --- Auth payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// AuthResponse
///
/// Returned by login and register. `redirect_to` is where the front end
/// navigates next: the page that bounced the visitor to `/login`, or the
/// default resource.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub redirect_to: String,
    pub notification: Notification,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RedirectResponse {
    pub redirect_to: String,
    pub notification: Notification,
}

/// UserIdentity
///
/// Public view of an account, as returned by `GET /api/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

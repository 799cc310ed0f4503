use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Filter, FilterOperator, ListParams, ListResult, SortOrder};

/// Operation
///
/// The five facade calls, carried in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// ProviderError
///
/// Every failure of a data request, whatever its cause, is one condition.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{operation} on {resource} failed: {reason}")]
pub struct ProviderError {
    pub resource: String,
    pub operation: Operation,
    /// Upstream status, when a response was received.
    pub status: Option<u16>,
    pub reason: String,
}

impl ProviderError {
    pub fn request_failed(
        resource: &str,
        operation: Operation,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.to_string(),
            operation,
            status,
            reason: reason.into(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// DataProvider
///
/// Generic CRUD over named resources. Implementations treat every resource
/// alike; the caller decides which names are valid.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn list(&self, resource: &str, params: &ListParams) -> ProviderResult<ListResult>;
    async fn get(&self, resource: &str, id: &str) -> ProviderResult<Value>;
    async fn create(&self, resource: &str, payload: Value) -> ProviderResult<Value>;
    async fn update(&self, resource: &str, id: &str, payload: Value) -> ProviderResult<Value>;
    async fn delete(&self, resource: &str, id: &str) -> ProviderResult<Value>;
}

pub type ProviderState = Arc<dyn DataProvider>;

// --- REST implementation ---

/// SimpleRestProvider
///
/// Talks to a json-server style backend at one origin:
/// `GET /{res}` with `_start`/`_end`/`_sort`/`_order` and filter parameters,
/// `GET|PATCH|DELETE /{res}/{id}`, `POST /{res}`. The list total comes from
/// `x-total-count`.
#[derive(Clone)]
pub struct SimpleRestProvider {
    client: Client,
    base_url: String,
}

impl SimpleRestProvider {
    /// # Errors
    /// Fails only if the HTTP client cannot be built (TLS backend init).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    fn record_url(&self, resource: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, resource, urlencoding::encode(id))
    }

    async fn send(
        &self,
        request: RequestBuilder,
        resource: &str,
        operation: Operation,
    ) -> ProviderResult<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(resource, %operation, error = %e, "upstream request failed");
            ProviderError::request_failed(resource, operation, None, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(resource, %operation, status = status.as_u16(), "upstream returned an error status");
            return Err(ProviderError::request_failed(
                resource,
                operation,
                Some(status.as_u16()),
                format!("upstream responded with {status}"),
            ));
        }

        Ok(response)
    }

    async fn json(response: Response, resource: &str, operation: Operation) -> ProviderResult<Value> {
        let status = response.status().as_u16();
        response.json::<Value>().await.map_err(|e| {
            ProviderError::request_failed(resource, operation, Some(status), format!("invalid body: {e}"))
        })
    }
}

/// Query string for a list call, in json-server conventions.
pub fn list_query(params: &ListParams) -> Vec<(String, String)> {
    let (start, end) = params.pagination.window();
    let mut query = vec![
        ("_start".to_string(), start.to_string()),
        ("_end".to_string(), end.to_string()),
    ];

    if !params.sorters.is_empty() {
        let fields: Vec<&str> = params.sorters.iter().map(|s| s.field.as_str()).collect();
        let orders: Vec<&str> = params.sorters.iter().map(|s| s.order.as_str()).collect();
        query.push(("_sort".to_string(), fields.join(",")));
        query.push(("_order".to_string(), orders.join(",")));
    }

    for filter in &params.filters {
        query.push((
            format!("{}{}", filter.field, filter.operator.suffix()),
            filter.value.clone(),
        ));
    }

    query
}

#[async_trait]
impl DataProvider for SimpleRestProvider {
    async fn list(&self, resource: &str, params: &ListParams) -> ProviderResult<ListResult> {
        let request = self
            .client
            .get(self.collection_url(resource))
            .query(&list_query(params));
        let response = self.send(request, resource, Operation::List).await?;

        let total_header = response
            .headers()
            .get("x-total-count")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let body = Self::json(response, resource, Operation::List).await?;
        let Value::Array(data) = body else {
            return Err(ProviderError::request_failed(
                resource,
                Operation::List,
                None,
                "list response is not an array",
            ));
        };

        let total = total_header.unwrap_or(data.len() as u64);
        tracing::debug!(resource, returned = data.len(), total, "list fetched");
        Ok(ListResult { data, total })
    }

    async fn get(&self, resource: &str, id: &str) -> ProviderResult<Value> {
        let request = self.client.get(self.record_url(resource, id));
        let response = self.send(request, resource, Operation::Get).await?;
        Self::json(response, resource, Operation::Get).await
    }

    async fn create(&self, resource: &str, payload: Value) -> ProviderResult<Value> {
        let request = self.client.post(self.collection_url(resource)).json(&payload);
        let response = self.send(request, resource, Operation::Create).await?;
        Self::json(response, resource, Operation::Create).await
    }

    async fn update(&self, resource: &str, id: &str, payload: Value) -> ProviderResult<Value> {
        let request = self.client.patch(self.record_url(resource, id)).json(&payload);
        let response = self.send(request, resource, Operation::Update).await?;
        Self::json(response, resource, Operation::Update).await
    }

    async fn delete(&self, resource: &str, id: &str) -> ProviderResult<Value> {
        let request = self.client.delete(self.record_url(resource, id));
        let response = self.send(request, resource, Operation::Delete).await?;
        // json-server answers `{}`; some backends answer with an empty body.
        let bytes = response.bytes().await.map_err(|e| {
            ProviderError::request_failed(resource, Operation::Delete, None, e.to_string())
        })?;
        if bytes.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::request_failed(resource, Operation::Delete, None, format!("invalid body: {e}"))
        })
    }
}

// --- In-memory implementation ---

#[derive(Default)]
struct Collection {
    next_id: u64,
    records: BTreeMap<u64, Map<String, Value>>,
}

/// MemoryProvider
///
/// Keeps records in-process with json-server semantics: numeric ids assigned
/// in sequence, the same filter/sort/pagination rules, PATCH-style merges.
/// Unknown ids fail with status 404, as the REST backend would.
#[derive(Default)]
pub struct MemoryProvider {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates a collection. Records without a numeric `id` get one.
    pub async fn seed(&self, resource: &str, records: Vec<Value>) {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(resource.to_string()).or_default();
        for record in records {
            if let Value::Object(object) = record {
                insert_record(collection, object);
            }
        }
    }

    fn parse_id(resource: &str, operation: Operation, id: &str) -> ProviderResult<u64> {
        id.parse::<u64>().map_err(|_| not_found(resource, operation, id))
    }
}

fn not_found(resource: &str, operation: Operation, id: &str) -> ProviderError {
    ProviderError::request_failed(resource, operation, Some(404), format!("record {id} not found"))
}

fn insert_record(collection: &mut Collection, mut object: Map<String, Value>) -> Value {
    let id = match object.get("id").and_then(Value::as_u64) {
        Some(id) => id,
        None => collection.next_id + 1,
    };
    collection.next_id = collection.next_id.max(id);
    object.insert("id".to_string(), Value::from(id));
    collection.records.insert(id, object.clone());
    Value::Object(object)
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(a), Some(b)) => field_text(a).cmp(&field_text(b)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn matches_filter(record: &Map<String, Value>, filter: &Filter) -> bool {
    // `q` is json-server's full-text search across all fields.
    if filter.field == "q" && filter.operator == FilterOperator::Eq {
        let needle = filter.value.to_lowercase();
        return record
            .values()
            .any(|value| field_text(value).to_lowercase().contains(&needle));
    }

    let Some(value) = record.get(&filter.field) else {
        return filter.operator == FilterOperator::Ne;
    };
    let literal = Value::String(filter.value.clone());
    let expected = filter
        .value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .filter(|_| value.is_number())
        .unwrap_or(literal);

    match filter.operator {
        FilterOperator::Eq => field_text(value) == filter.value,
        FilterOperator::Ne => field_text(value) != filter.value,
        FilterOperator::Gte => compare_values(Some(value), Some(&expected)) != Ordering::Less,
        FilterOperator::Lte => compare_values(Some(value), Some(&expected)) != Ordering::Greater,
        FilterOperator::Contains => field_text(value)
            .to_lowercase()
            .contains(&filter.value.to_lowercase()),
    }
}

/// Filters combine with AND, except repeated equality filters on one field
/// (`id=1&id=2`), which are alternatives as in json-server.
fn matches_all(record: &Map<String, Value>, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        if filter.operator == FilterOperator::Eq && filter.field != "q" {
            filters
                .iter()
                .filter(|other| other.operator == FilterOperator::Eq && other.field == filter.field)
                .any(|other| matches_filter(record, other))
        } else {
            matches_filter(record, filter)
        }
    })
}

#[async_trait]
impl DataProvider for MemoryProvider {
    async fn list(&self, resource: &str, params: &ListParams) -> ProviderResult<ListResult> {
        let collections = self.collections.read().await;
        let mut matching: Vec<&Map<String, Value>> = collections
            .get(resource)
            .map(|collection| {
                collection
                    .records
                    .values()
                    .filter(|record| matches_all(record, &params.filters))
                    .collect()
            })
            .unwrap_or_default();

        matching.sort_by(|a, b| {
            params
                .sorters
                .iter()
                .map(|sorter| {
                    let ordering = compare_values(a.get(&sorter.field), b.get(&sorter.field));
                    match sorter.order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let total = matching.len() as u64;
        let (start, end) = params.pagination.window();
        let data = matching
            .into_iter()
            .skip(usize::try_from(start).unwrap_or(usize::MAX))
            .take(usize::try_from(end - start).unwrap_or(usize::MAX))
            .map(|record| Value::Object(record.clone()))
            .collect();

        Ok(ListResult { data, total })
    }

    async fn get(&self, resource: &str, id: &str) -> ProviderResult<Value> {
        let key = Self::parse_id(resource, Operation::Get, id)?;
        self.collections
            .read()
            .await
            .get(resource)
            .and_then(|collection| collection.records.get(&key))
            .map(|record| Value::Object(record.clone()))
            .ok_or_else(|| not_found(resource, Operation::Get, id))
    }

    async fn create(&self, resource: &str, payload: Value) -> ProviderResult<Value> {
        let Value::Object(mut object) = payload else {
            return Err(ProviderError::request_failed(
                resource,
                Operation::Create,
                Some(400),
                "payload must be a JSON object",
            ));
        };
        // The store assigns ids on create.
        object.remove("id");

        let mut collections = self.collections.write().await;
        let collection = collections.entry(resource.to_string()).or_default();
        Ok(insert_record(collection, object))
    }

    async fn update(&self, resource: &str, id: &str, payload: Value) -> ProviderResult<Value> {
        let key = Self::parse_id(resource, Operation::Update, id)?;
        let Value::Object(changes) = payload else {
            return Err(ProviderError::request_failed(
                resource,
                Operation::Update,
                Some(400),
                "payload must be a JSON object",
            ));
        };

        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(resource)
            .and_then(|collection| collection.records.get_mut(&key))
            .ok_or_else(|| not_found(resource, Operation::Update, id))?;

        for (field, value) in changes {
            if field != "id" {
                record.insert(field, value);
            }
        }
        Ok(Value::Object(record.clone()))
    }

    async fn delete(&self, resource: &str, id: &str) -> ProviderResult<Value> {
        let key = Self::parse_id(resource, Operation::Delete, id)?;
        self.collections
            .write()
            .await
            .get_mut(resource)
            .and_then(|collection| collection.records.remove(&key))
            .map(|_| Value::Object(Map::new()))
            .ok_or_else(|| not_found(resource, Operation::Delete, id))
    }
}

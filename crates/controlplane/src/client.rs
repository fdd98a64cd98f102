//! Blocking HTTP implementation of [`RemoteStore`].
//!
//! Requests carry a bearer token and JSON bodies keyed by attribute name.
//! Every entity response is a JSON object with an `id` field; the remaining
//! scalar and string-list fields become observed attributes.

use crate::error::{Error, Result};
use crate::routes::Route;
use declarative::{
    Attributes, CallContext, ParentIds, RemoteError, RemoteId, RemoteStore, ResourceKind, Value,
};
use serde_json::{Map, Value as Json};
use std::time::Duration;

/// Production control-plane endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.synadia.cloud";

/// Upper bound for a single request when the context has no deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("controlplane-rs/", env!("CARGO_PKG_VERSION"));

/// Longest raw error body echoed back in a message.
const MAX_ERROR_BODY: usize = 200;

/// Control-plane REST client.
///
/// Holds the endpoint and credentials; constructed by the caller and passed
/// to the engine as a `&dyn RemoteStore`.
///
/// # Example
///
/// ```no_run
/// use controlplane::HttpStore;
///
/// let store = HttpStore::new("https://api.synadia.cloud", "token").unwrap();
/// assert_eq!(store.endpoint(), "https://api.synadia.cloud");
/// ```
pub struct HttpStore {
    agent: ureq::Agent,
    endpoint: String,
    token: String,
    timeout: Duration,
}

enum Request<'a> {
    Get,
    Delete,
    Post(&'a Json),
    Put(&'a Json),
}

impl Request<'_> {
    fn method(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Delete => "DELETE",
            Self::Post(_) => "POST",
            Self::Put(_) => "PUT",
        }
    }
}

impl HttpStore {
    /// Create a client for `endpoint` authenticating with `token`.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(Error::InvalidEndpoint(endpoint));
        }

        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::MissingToken);
        }

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            endpoint,
            token,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Cap every request at `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Request timeout: the client cap, shortened to the context deadline.
    fn timeout_for(&self, ctx: &CallContext) -> Duration {
        ctx.remaining()
            .map_or(self.timeout, |remaining| remaining.min(self.timeout))
    }

    fn prepare<B>(&self, request: ureq::RequestBuilder<B>, timeout: Duration) -> ureq::RequestBuilder<B> {
        request
            .config()
            .timeout_global(Some(timeout))
            .build()
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
    }

    fn send(&self, ctx: &CallContext, request: Request<'_>, path: &str) -> Result<Json> {
        ctx.check()?;
        let url = self.url(path);
        let timeout = self.timeout_for(ctx);
        log::debug!("{} {} (timeout {:?})", request.method(), url, timeout);

        let mut response = match request {
            Request::Get => self.prepare(self.agent.get(&url), timeout).call()?,
            Request::Delete => self.prepare(self.agent.delete(&url), timeout).call()?,
            Request::Post(body) => self.prepare(self.agent.post(&url), timeout).send_json(body)?,
            Request::Put(body) => self.prepare(self.agent.put(&url), timeout).send_json(body)?,
        };

        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;
        log::trace!("{url} -> {status}");

        if !(200..300).contains(&status) {
            return Err(Error::Status {
                status,
                message: error_message(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Json::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn create_entity(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        attrs: &Attributes,
    ) -> Result<(RemoteId, Attributes)> {
        let route = Route::of(kind);
        let body = request_body(&route, attrs)?;
        let json = self.send(ctx, Request::Post(&body), &route.collection_path(parents)?)?;
        parse_entity(json)
    }

    fn read_entity(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
    ) -> Result<Attributes> {
        let route = Route::of(kind);
        let json = self.send(ctx, Request::Get, &route.entity_path(parents, id)?)?;
        Ok(parse_entity(json)?.1)
    }

    fn update_entity(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
        attrs: &Attributes,
    ) -> Result<Attributes> {
        let route = Route::of(kind);
        let body = request_body(&route, attrs)?;
        let json = self.send(ctx, Request::Put(&body), &route.entity_path(parents, id)?)?;

        // Some endpoints answer 204; the sent state is then what was recorded
        if json.is_null() {
            return Ok(attrs.clone());
        }
        Ok(parse_entity(json)?.1)
    }

    fn delete_entity(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
    ) -> Result<()> {
        let route = Route::of(kind);
        self.send(ctx, Request::Delete, &route.entity_path(parents, id)?)?;
        Ok(())
    }

    fn list_entities(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
    ) -> Result<Vec<(RemoteId, Attributes)>> {
        let route = Route::of(kind);
        let json = self.send(ctx, Request::Get, &route.collection_path(parents)?)?;
        parse_list(json)
    }
}

impl RemoteStore for HttpStore {
    fn create(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        attrs: &Attributes,
    ) -> std::result::Result<(RemoteId, Attributes), RemoteError> {
        Ok(self.create_entity(ctx, kind, parents, attrs)?)
    }

    fn read(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
    ) -> std::result::Result<Attributes, RemoteError> {
        Ok(self.read_entity(ctx, kind, parents, id)?)
    }

    fn update(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
        attrs: &Attributes,
    ) -> std::result::Result<Attributes, RemoteError> {
        Ok(self.update_entity(ctx, kind, parents, id, attrs)?)
    }

    fn delete(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
    ) -> std::result::Result<(), RemoteError> {
        Ok(self.delete_entity(ctx, kind, parents, id)?)
    }

    fn list(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
    ) -> std::result::Result<Vec<(RemoteId, Attributes)>, RemoteError> {
        Ok(self.list_entities(ctx, kind, parents)?)
    }
}

// =============================================================================
// Wire conversion
// =============================================================================

/// JSON body for create/update, without the parents already in the path
fn request_body(route: &Route, attrs: &Attributes) -> Result<Json> {
    let mut body = Map::new();
    for (name, value) in attrs {
        if route.is_path_parent(name) {
            continue;
        }
        body.insert(name.clone(), serde_json::to_value(value)?);
    }
    Ok(Json::Object(body))
}

/// Split an entity object into its ID and attributes
///
/// Fields that are not scalars or string lists are dropped; the descriptor
/// only keeps declared attributes anyway.
fn parse_entity(json: Json) -> Result<(RemoteId, Attributes)> {
    let Json::Object(fields) = json else {
        return Err(Error::InvalidResponse(format!(
            "expected an object, got {}",
            json_type(&json)
        )));
    };

    let mut id = None;
    let mut attrs = Attributes::new();
    for (name, field) in fields {
        if name == "id" {
            id = match field {
                Json::String(s) => Some(s),
                Json::Number(n) => Some(n.to_string()),
                _ => None,
            };
            continue;
        }
        if field.is_null() {
            continue;
        }
        if let Ok(value) = serde_json::from_value::<Value>(field) {
            attrs.insert(name, value);
        }
    }

    let id = id.ok_or_else(|| Error::InvalidResponse("entity has no 'id' field".to_string()))?;
    Ok((id, attrs))
}

/// Accept a bare array or an envelope with `items` or `data`
fn parse_list(json: Json) -> Result<Vec<(RemoteId, Attributes)>> {
    let items = match json {
        Json::Array(items) => items,
        Json::Object(mut envelope) => match envelope
            .remove("items")
            .or_else(|| envelope.remove("data"))
        {
            Some(Json::Array(items)) => items,
            _ => {
                return Err(Error::InvalidResponse(
                    "list response has no 'items' array".to_string(),
                ));
            }
        },
        Json::Null => Vec::new(),
        other => {
            return Err(Error::InvalidResponse(format!(
                "expected a list, got {}",
                json_type(&other)
            )));
        }
    };

    items.into_iter().map(parse_entity).collect()
}

/// Best human-readable message in an error body
fn error_message(body: &str) -> String {
    if let Ok(Json::Object(fields)) = serde_json::from_str::<Json>(body) {
        for key in ["message", "error", "detail", "title"] {
            match fields.get(key) {
                Some(Json::String(s)) if !s.is_empty() => return s.clone(),
                Some(Json::Object(inner)) => {
                    if let Some(Json::String(s)) = inner.get("message") {
                        return s.clone();
                    }
                }
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        return format!("{cut}...");
    }
    trimmed.to_string()
}

fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::attributes;
    use serde_json::json;

    #[test]
    fn test_new_trims_endpoint() {
        let store = HttpStore::new("https://api.example.com/ ", "t").unwrap();
        assert_eq!(store.endpoint(), "https://api.example.com");
        assert_eq!(store.url("/clusters"), "https://api.example.com/clusters");
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let err = HttpStore::new("api.example.com", "t").err().unwrap();
        assert!(matches!(err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_new_requires_token() {
        let err = HttpStore::new(DEFAULT_ENDPOINT, "  ").err().unwrap();
        assert!(matches!(err, Error::MissingToken));
    }

    #[test]
    fn test_timeout_follows_deadline() {
        let store = HttpStore::new(DEFAULT_ENDPOINT, "t").unwrap();
        assert_eq!(store.timeout_for(&CallContext::new()), DEFAULT_TIMEOUT);

        let ctx = CallContext::new().with_timeout(Duration::from_secs(2));
        assert!(store.timeout_for(&ctx) <= Duration::from_secs(2));

        let store = store.with_timeout(Duration::from_millis(10));
        let ctx = CallContext::new().with_timeout(Duration::from_secs(60));
        assert_eq!(store.timeout_for(&ctx), Duration::from_millis(10));
    }

    #[test]
    fn test_cancelled_context_sends_nothing() {
        let store = HttpStore::new("http://127.0.0.1:9", "t").unwrap();
        let ctx = CallContext::new();
        ctx.cancel_token().cancel();

        let err = store
            .read(&ctx, ResourceKind::Cluster, &ParentIds::new(), "c1")
            .unwrap_err();
        assert_eq!(err, RemoteError::Cancelled);
    }

    #[test]
    fn test_missing_parent_is_reported_before_sending() {
        let store = HttpStore::new("http://127.0.0.1:9", "t").unwrap();
        let err = store
            .read(&CallContext::new(), ResourceKind::Stream, &ParentIds::new(), "s1")
            .unwrap_err();
        match err {
            RemoteError::Other(msg) => assert!(msg.contains("cluster_id")),
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn test_request_body_drops_path_parents() {
        let route = Route::of(ResourceKind::ClusterGateway);
        let attrs = attributes([
            ("cluster_id", Value::from("c1")),
            ("remote_cluster_id", Value::from("c2")),
            ("name", Value::from("gw")),
        ]);
        let body = request_body(&route, &attrs).unwrap();
        assert_eq!(body, json!({"remote_cluster_id": "c2", "name": "gw"}));
    }

    #[test]
    fn test_request_body_plain_values() {
        let route = Route::of(ResourceKind::Stream);
        let attrs = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::List(vec!["orders.>".to_string()])),
            ("max_msgs", Value::Int(0)),
        ]);
        let body = request_body(&route, &attrs).unwrap();
        assert_eq!(
            body,
            json!({"name": "orders", "subjects": ["orders.>"], "max_msgs": 0})
        );
    }

    #[test]
    fn test_parse_entity() {
        let (id, attrs) = parse_entity(json!({
            "id": "c1",
            "name": "prod",
            "tier": "standard",
            "replicas": 3,
            "public": true,
            "tags": ["a", "b"],
            "nested": {"x": 1},
            "deleted_at": null,
        }))
        .unwrap();

        assert_eq!(id, "c1");
        assert_eq!(attrs.get("name"), Some(&Value::from("prod")));
        assert_eq!(attrs.get("replicas"), Some(&Value::Int(3)));
        assert_eq!(attrs.get("public"), Some(&Value::Bool(true)));
        assert_eq!(
            attrs.get("tags"),
            Some(&Value::List(vec!["a".to_string(), "b".to_string()]))
        );
        assert!(!attrs.contains_key("nested"));
        assert!(!attrs.contains_key("deleted_at"));
        assert!(!attrs.contains_key("id"));
    }

    #[test]
    fn test_parse_entity_numeric_id() {
        let (id, _) = parse_entity(json!({"id": 42})).unwrap();
        assert_eq!(id, "42");
    }

    #[test]
    fn test_parse_entity_requires_id() {
        assert!(matches!(
            parse_entity(json!({"name": "x"})),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_entity(json!(["x"])),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_list_shapes() {
        let bare = parse_list(json!([{"id": "a"}, {"id": "b"}])).unwrap();
        assert_eq!(bare.len(), 2);

        let items = parse_list(json!({"items": [{"id": "a"}]})).unwrap();
        assert_eq!(items[0].0, "a");

        let data = parse_list(json!({"data": [{"id": "z"}]})).unwrap();
        assert_eq!(data[0].0, "z");

        assert!(parse_list(Json::Null).unwrap().is_empty());
        assert!(parse_list(json!({"total": 0})).is_err());
        assert!(parse_list(json!("nope")).is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message": "name taken"}"#), "name taken");
        assert_eq!(error_message(r#"{"error": "forbidden"}"#), "forbidden");
        assert_eq!(
            error_message(r#"{"error": {"code": 7, "message": "bad tier"}}"#),
            "bad tier"
        );
        assert_eq!(error_message("upstream timeout\n"), "upstream timeout");
        assert_eq!(error_message(""), "empty response body");

        let long = "x".repeat(500);
        let msg = error_message(&long);
        assert!(msg.ends_with("..."));
        assert_eq!(msg.len(), MAX_ERROR_BODY + 3);
    }
}

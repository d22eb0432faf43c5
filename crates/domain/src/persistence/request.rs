//! Saved request type (*.request.yaml).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::body::RequestBody;
use super::common::{CURRENT_SCHEMA_VERSION, HttpMethod, OrderKey, Protocol, is_default};
use crate::error::{DomainError, DomainResult};

/// A request as stored on disk.
///
/// Field order here is the key order on disk; `version` always comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SavedRequest {
    /// Schema version.
    pub version: u32,

    /// Human-readable request name.
    pub name: String,

    /// Position among siblings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderKey>,

    /// Protocol the request is executed with.
    #[serde(default, skip_serializing_if = "is_default")]
    pub protocol: Protocol,

    /// HTTP method.
    pub method: HttpMethod,

    /// URL template. May contain `{{variables}}`.
    pub url: String,

    /// Request headers, sorted by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Query parameters, sorted by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    /// Optional request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,

    /// Embedded scripts.
    #[serde(default, skip_serializing_if = "RequestScripts::is_empty")]
    pub scripts: RequestScripts,
}

/// Scripts stored alongside a request. Executed by an external sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestScripts {
    /// Runs before the request is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request: Option<String>,

    /// Runs after the response arrives; usually holds tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_response: Option<String>,
}

impl RequestScripts {
    /// Returns true if neither script is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pre_request.is_none() && self.post_response.is_none()
    }
}

impl SavedRequest {
    /// Creates a new GET request.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            name: name.into(),
            order: None,
            protocol: Protocol::Http,
            method: HttpMethod::Get,
            url: url.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
            scripts: RequestScripts::default(),
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the protocol.
    #[must_use]
    pub const fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the explicit ordering key.
    #[must_use]
    pub const fn with_order(mut self, order: OrderKey) -> Self {
        self.order = Some(order);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the pre-request script.
    #[must_use]
    pub fn with_pre_request(mut self, script: impl Into<String>) -> Self {
        self.scripts.pre_request = Some(script.into());
        self
    }

    /// Every string that may hold `{{variable}}` placeholders: the URL,
    /// header and query values, then the body's string leaves.
    #[must_use]
    pub fn templates(&self) -> Vec<&str> {
        let mut templates = vec![self.url.as_str()];
        templates.extend(self.headers.values().map(String::as_str));
        templates.extend(self.query.values().map(String::as_str));
        if let Some(body) = &self.body {
            templates.extend(body.strings());
        }
        templates
    }

    /// Checks the fields that the type system cannot.
    ///
    /// # Errors
    /// Returns `DomainError::EmptyField` if the name or URL is blank.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyField("name".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(DomainError::EmptyField("url".to_string()));
        }
        Ok(())
    }
}

//! Resolved request snapshot handed to protocol executors.

use std::collections::BTreeMap;

use crate::persistence::{HttpMethod, Protocol, RequestBody, SavedRequest};

/// A request with every variable substituted.
///
/// This is the only shape that crosses the protocol boundary; it holds no
/// references back into the collection and responses are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// Protocol to execute with.
    pub protocol: Protocol,
    /// HTTP method.
    pub method: HttpMethod,
    /// Fully substituted URL.
    pub url: String,
    /// Substituted header values.
    pub headers: BTreeMap<String, String>,
    /// Substituted query parameter values.
    pub query: BTreeMap<String, String>,
    /// Substituted body.
    pub body: Option<RequestBody>,
}

impl ResolvedRequest {
    /// Builds a snapshot by passing every template string of `request`
    /// through `substitute`. Names (header keys, query keys) are kept verbatim.
    #[must_use]
    pub fn from_saved(request: &SavedRequest, mut substitute: impl FnMut(&str) -> String) -> Self {
        let url = substitute(&request.url);
        let headers = request
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), substitute(v)))
            .collect();
        let query = request
            .query
            .iter()
            .map(|(k, v)| (k.clone(), substitute(v)))
            .collect();
        let body = request
            .body
            .as_ref()
            .map(|body| body.map_strings(&mut substitute));

        Self {
            protocol: request.protocol,
            method: request.method,
            url,
            headers,
            query,
            body,
        }
    }
}

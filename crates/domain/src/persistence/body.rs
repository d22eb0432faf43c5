//! Request body types for various content formats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Request body with multiple format support.
///
/// The `type` field is the discriminator on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBody {
    /// JSON body with structured content.
    Json {
        /// The JSON content (can be object, array, or primitive).
        content: JsonValue,
    },

    /// Plain text body. May contain `{{variables}}`.
    Text {
        /// The text content.
        content: String,
    },

    /// URL-encoded form data (application/x-www-form-urlencoded).
    FormUrlencoded {
        /// Form fields as key-value pairs.
        fields: BTreeMap<String, String>,
    },

    /// GraphQL query body.
    Graphql {
        /// The GraphQL query string.
        query: String,
        /// GraphQL variables as JSON object.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variables: Option<JsonValue>,
    },

    /// Binary file body, referenced by path relative to the collection root.
    Binary {
        /// Relative path to the binary file.
        path: String,
    },
}

impl RequestBody {
    /// Creates a JSON body from a `serde_json::Value`.
    #[must_use]
    pub const fn json(content: JsonValue) -> Self {
        Self::Json { content }
    }

    /// Creates a text body.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Creates a form-urlencoded body from key-value pairs.
    #[must_use]
    pub const fn form_urlencoded(fields: BTreeMap<String, String>) -> Self {
        Self::FormUrlencoded { fields }
    }

    /// Creates a GraphQL body.
    #[must_use]
    pub fn graphql(query: impl Into<String>, variables: Option<JsonValue>) -> Self {
        Self::Graphql {
            query: query.into(),
            variables,
        }
    }

    /// Creates a binary body referencing a file path.
    #[must_use]
    pub fn binary(path: impl Into<String>) -> Self {
        Self::Binary { path: path.into() }
    }

    /// Returns a copy with every string leaf passed through `f`.
    ///
    /// Used to substitute variables; JSON keys and binary paths are left as-is.
    #[must_use]
    pub fn map_strings(&self, mut f: impl FnMut(&str) -> String) -> Self {
        match self {
            Self::Json { content } => Self::Json {
                content: map_json_strings(content, &mut f),
            },
            Self::Text { content } => Self::Text {
                content: f(content),
            },
            Self::FormUrlencoded { fields } => Self::FormUrlencoded {
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), f(v)))
                    .collect(),
            },
            Self::Graphql { query, variables } => Self::Graphql {
                query: f(query),
                variables: variables.as_ref().map(|v| map_json_strings(v, &mut f)),
            },
            Self::Binary { path } => Self::Binary { path: path.clone() },
        }
    }
}

impl RequestBody {
    /// Every string leaf [`Self::map_strings`] would visit, in the same order.
    #[must_use]
    pub fn strings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match self {
            Self::Json { content } => collect_json_strings(content, &mut out),
            Self::Text { content } => out.push(content.as_str()),
            Self::FormUrlencoded { fields } => out.extend(fields.values().map(String::as_str)),
            Self::Graphql { query, variables } => {
                out.push(query.as_str());
                if let Some(variables) = variables {
                    collect_json_strings(variables, &mut out);
                }
            }
            Self::Binary { .. } => {}
        }
        out
    }
}

fn collect_json_strings<'a>(value: &'a JsonValue, out: &mut Vec<&'a str>) {
    match value {
        JsonValue::String(s) => out.push(s),
        JsonValue::Array(items) => items.iter().for_each(|item| collect_json_strings(item, out)),
        JsonValue::Object(map) => map.values().for_each(|v| collect_json_strings(v, out)),
        _ => {}
    }
}

fn map_json_strings(value: &JsonValue, f: &mut impl FnMut(&str) -> String) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(f(s)),
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|item| map_json_strings(item, f)).collect())
        }
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), map_json_strings(v, f)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_body_json() {
        let body = RequestBody::json(serde_json::json!({"name": "test"}));
        match body {
            RequestBody::Json { content } => {
                assert_eq!(content["name"], "test");
            }
            _ => panic!("Expected JSON body"),
        }
    }

    #[test]
    fn test_body_tagged_yaml() {
        let body = RequestBody::text("hello");
        let yaml = serde_yaml::to_string(&body).unwrap();
        assert!(yaml.contains("type: text"));
        let back: RequestBody = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn test_map_strings_reaches_nested_json() {
        let body = RequestBody::json(serde_json::json!({
            "user": "{{name}}",
            "tags": ["{{name}}", 3],
        }));

        let mapped = body.map_strings(|s| s.replace("{{name}}", "ada"));
        assert_eq!(
            mapped,
            RequestBody::json(serde_json::json!({"user": "ada", "tags": ["ada", 3]}))
        );
    }

    #[test]
    fn test_strings_match_map_strings() {
        let body = RequestBody::graphql(
            "query { user(id: \"{{id}}\") }",
            Some(serde_json::json!({"tags": ["{{tag}}", 3], "key": "{{key}}"})),
        );
        let mut visited = Vec::new();
        let _ = body.map_strings(|s| {
            visited.push(s.to_string());
            s.to_string()
        });

        assert_eq!(body.strings(), visited);
        assert!(RequestBody::binary("{{file}}").strings().is_empty());
    }

    #[test]
    fn test_map_strings_leaves_binary_path() {
        let body = RequestBody::binary("{{file}}");
        assert_eq!(body.map_strings(|_| "x".to_string()), body);
    }
}

//! Resolution context for variable substitution
//!
//! Holds all variable sources for resolution with proper precedence.

use std::collections::BTreeMap;

use super::variable::{Environment, ResolvedVariable, VariableScope, VariableSet};

/// Holds all variable sources for resolution.
/// Variables are looked up most specific first:
/// 1. Runtime overrides supplied for one execution
/// 2. Active environment (environments/*.yaml)
/// 3. Collection (collection.yaml variables)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Ephemeral overrides, always enabled.
    pub runtime: BTreeMap<String, String>,

    /// Active environment variables.
    pub environment: VariableSet,

    /// Active environment name (for display purposes).
    pub environment_name: Option<String>,

    /// Collection-level variables.
    pub collection: VariableSet,
}

impl ResolutionContext {
    /// Creates a new empty resolution context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the raw (unexpanded) value of a variable.
    /// Returns None if no scope holds an enabled binding for `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ResolvedVariable> {
        if let Some(value) = self.runtime.get(name) {
            return Some(ResolvedVariable::new(name, value.clone(), VariableScope::Runtime));
        }

        if let Some(value) = self.environment.enabled_value(name) {
            return Some(ResolvedVariable::new(name, value, VariableScope::Environment));
        }

        self.collection
            .enabled_value(name)
            .map(|value| ResolvedVariable::new(name, value, VariableScope::Collection))
    }

    /// Returns all variable names across all scopes, enabled or not.
    #[must_use]
    pub fn all_variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .runtime
            .keys()
            .map(String::as_str)
            .chain(self.environment.keys())
            .chain(self.collection.keys())
            .map(ToString::to_string)
            .collect();

        names.sort();
        names.dedup();
        names
    }

    /// Sets the runtime overrides.
    #[must_use]
    pub fn with_runtime(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.runtime = overrides;
        self
    }

    /// Adds a single runtime override.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.runtime.insert(key.into(), value.into());
        self
    }

    /// Sets the environment source.
    #[must_use]
    pub fn with_environment(mut self, environment: &Environment) -> Self {
        self.environment.clone_from(&environment.variables);
        self.environment_name = Some(environment.name.clone());
        self
    }

    /// Sets the collection variables source.
    #[must_use]
    pub fn with_collection(mut self, collection: &VariableSet) -> Self {
        self.collection.clone_from(collection);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::environment::Variable;
    use pretty_assertions::assert_eq;

    fn collection_vars() -> VariableSet {
        vec![
            Variable::new("baseUrl", "https://collection"),
            Variable::new("version", "v1"),
        ]
        .into_iter()
        .collect()
    }

    fn environment() -> Environment {
        Environment::new("development").with_variable("baseUrl", "https://env")
    }

    #[test]
    fn test_lookup_precedence_chain() {
        let ctx = ResolutionContext::new()
            .with_collection(&collection_vars())
            .with_environment(&environment())
            .with_override("baseUrl", "https://override");

        let resolved = ctx.lookup("baseUrl").expect("Should resolve");
        assert_eq!(resolved.value, "https://override");
        assert_eq!(resolved.scope, VariableScope::Runtime);

        let ctx = ctx.with_runtime(BTreeMap::new());
        assert_eq!(ctx.lookup("baseUrl").unwrap().value, "https://env");

        let ctx = ResolutionContext::new().with_collection(&collection_vars());
        assert_eq!(ctx.lookup("baseUrl").unwrap().value, "https://collection");
    }

    #[test]
    fn test_disabled_environment_binding_falls_through() {
        let mut env = Environment::new("staging");
        env.set_variable(Variable::disabled("version", "v9"));

        let ctx = ResolutionContext::new()
            .with_collection(&collection_vars())
            .with_environment(&env);

        let resolved = ctx.lookup("version").unwrap();
        assert_eq!(resolved.value, "v1");
        assert_eq!(resolved.scope, VariableScope::Collection);
    }

    #[test]
    fn test_lookup_not_found() {
        assert!(ResolutionContext::new().lookup("missing").is_none());
    }

    #[test]
    fn test_all_variable_names() {
        let ctx = ResolutionContext::new()
            .with_collection(&collection_vars())
            .with_environment(&environment())
            .with_override("token", "t");

        assert_eq!(ctx.all_variable_names(), vec!["baseUrl", "token", "version"]);
    }
}

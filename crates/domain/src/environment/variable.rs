//! Variable bindings and environments

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::persistence::CURRENT_SCHEMA_VERSION;

/// A single variable binding with its value and enabled flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Variable {
    /// Variable name, unique within its owning scope.
    pub key: String,

    /// The variable value. May contain `{{other}}` references.
    #[serde(default)]
    pub value: String,

    /// Disabled bindings are skipped during resolution as if absent.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl Variable {
    /// Creates a new enabled variable.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates a disabled variable.
    #[must_use]
    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: false,
        }
    }

    /// Returns the value if the variable is enabled.
    #[must_use]
    pub fn enabled_value(&self) -> Option<&str> {
        if self.enabled {
            Some(&self.value)
        } else {
            None
        }
    }
}

/// Ordered set of variables keyed by name.
///
/// Insertion order is kept so files diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSet(Vec<Variable>);

impl VariableSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Gets a variable by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.0.iter().find(|v| v.key == key)
    }

    /// Gets the value of an enabled variable.
    #[must_use]
    pub fn enabled_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Variable::enabled_value)
    }

    /// Adds or replaces a variable, keeping the original position on replace.
    pub fn set(&mut self, variable: Variable) {
        if let Some(existing) = self.0.iter_mut().find(|v| v.key == variable.key) {
            *existing = variable;
        } else {
            self.0.push(variable);
        }
    }

    /// Removes a variable by key.
    pub fn remove(&mut self, key: &str) -> Option<Variable> {
        let position = self.0.iter().position(|v| v.key == key)?;
        Some(self.0.remove(position))
    }

    /// Iterates over the variables in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.0.iter()
    }

    /// Iterates over variable keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|v| v.key.as_str())
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks that every key is non-empty and appears once.
    ///
    /// # Errors
    ///
    /// Returns the first empty or duplicated key.
    pub fn validate(&self) -> DomainResult<()> {
        for (index, variable) in self.0.iter().enumerate() {
            if variable.key.trim().is_empty() {
                return Err(DomainError::EmptyField("variable key".to_string()));
            }
            if self.0[..index].iter().any(|v| v.key == variable.key) {
                return Err(DomainError::DuplicateVariable(variable.key.clone()));
            }
        }
        Ok(())
    }
}

impl FromIterator<Variable> for VariableSet {
    fn from_iter<T: IntoIterator<Item = Variable>>(iter: T) -> Self {
        let mut set = Self::new();
        for variable in iter {
            set.set(variable);
        }
        set
    }
}

impl<'a> IntoIterator for &'a VariableSet {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Defines the scope a variable was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariableScope {
    /// Variables defined in `collection.yaml` - lowest precedence
    Collection = 0,
    /// Variables defined in the active environment file
    Environment = 1,
    /// Overrides supplied by the caller for one execution - highest precedence
    Runtime = 2,
}

impl VariableScope {
    /// Returns the precedence level (higher = takes priority).
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        *self as u8
    }

    /// Returns a human-readable name for the scope.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Collection => "Collection",
            Self::Environment => "Environment",
            Self::Runtime => "Runtime",
        }
    }
}

/// A resolved variable with its value and origin scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariable {
    /// The variable name (without {{ }}).
    pub name: String,
    /// The resolved value.
    pub value: String,
    /// The scope from which this value was resolved.
    pub scope: VariableScope,
}

impl ResolvedVariable {
    /// Creates a new resolved variable.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, scope: VariableScope) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            scope,
        }
    }
}

/// A named environment stored under `environments/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    /// Schema version; always the first key on disk.
    pub version: u32,
    /// Environment name (e.g., "development", "production")
    pub name: String,
    /// Variables in this environment.
    #[serde(default, skip_serializing_if = "VariableSet::is_empty")]
    pub variables: VariableSet,
}

impl Environment {
    /// Creates a new environment with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            name: name.into(),
            variables: VariableSet::new(),
        }
    }

    /// Adds a variable with name and value.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.set(Variable::new(key, value));
        self
    }

    /// Adds or updates a variable.
    pub fn set_variable(&mut self, variable: Variable) {
        self.variables.set(variable);
    }

    /// Resolves a raw value (returns value only if variable is enabled).
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.variables.enabled_value(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_disabled() {
        let var = Variable::disabled("host", "localhost");
        assert!(!var.enabled);
        assert_eq!(var.enabled_value(), None);
    }

    #[test]
    fn test_variable_set_replace_keeps_position() {
        let mut set: VariableSet = vec![Variable::new("a", "1"), Variable::new("b", "2")]
            .into_iter()
            .collect();
        set.set(Variable::new("a", "3"));

        let keys: Vec<&str> = set.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(set.enabled_value("a"), Some("3"));
    }

    #[test]
    fn test_variable_set_validate_duplicates() {
        let set = VariableSet(vec![Variable::new("a", "1"), Variable::new("a", "2")]);
        assert_eq!(
            set.validate(),
            Err(DomainError::DuplicateVariable("a".to_string()))
        );
    }

    #[test]
    fn test_environment_resolve_disabled() {
        let mut env = Environment::new("Test");
        env.set_variable(Variable::disabled("token", "abc"));
        env.set_variable(Variable::new("host", "localhost"));

        assert_eq!(env.resolve("token"), None);
        assert_eq!(env.resolve("host"), Some("localhost"));
    }

    #[test]
    fn test_scope_precedence() {
        assert!(VariableScope::Runtime.precedence() > VariableScope::Environment.precedence());
        assert!(VariableScope::Environment.precedence() > VariableScope::Collection.precedence());
    }
}

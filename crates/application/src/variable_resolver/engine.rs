//! Variable resolution engine
//!
//! Resolves `{{variable}}` references against a [`ResolutionContext`],
//! expanding nested references recursively.

use courier_domain::environment::{ResolutionContext, ResolvedVariable};
use thiserror::Error;

use super::parser::parse_variables;

/// Maximum nesting of variable references.
pub const MAX_RESOLUTION_DEPTH: usize = 10;

/// Errors raised while resolving a variable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No scope holds an enabled binding for the name.
    #[error("unresolved variable: {0}")]
    Unresolved(String),

    /// A variable refers back to itself, directly or transitively.
    #[error("circular variable reference: {}", chain.join(" -> "))]
    CircularReference {
        /// Names visited, ending with the repeated one.
        chain: Vec<String>,
    },

    /// References nest deeper than [`MAX_RESOLUTION_DEPTH`].
    #[error("variable nesting exceeds {MAX_RESOLUTION_DEPTH} levels: {}", chain.join(" -> "))]
    DepthExceeded {
        /// Names visited, ending with the one that would exceed the limit.
        chain: Vec<String>,
    },
}

/// Result of substituting a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    /// The template with every resolvable placeholder substituted.
    pub resolved: String,

    /// Variables substituted at the top level, in order of appearance.
    pub resolved_variables: Vec<ResolvedVariable>,

    /// Placeholder names left as literal text.
    pub unresolved: Vec<String>,
}

impl ResolutionResult {
    /// Whether every placeholder was substituted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// The variable resolution engine.
#[derive(Debug, Clone, Default)]
pub struct VariableResolver {
    context: ResolutionContext,
}

impl VariableResolver {
    /// Creates a new resolver with the given context.
    #[must_use]
    pub const fn new(context: ResolutionContext) -> Self {
        Self { context }
    }

    /// Returns a reference to the current context.
    #[must_use]
    pub const fn context(&self) -> &ResolutionContext {
        &self.context
    }

    /// Resolves a single variable to its fully expanded value.
    ///
    /// Nested references that cannot be found stay as literal placeholders
    /// in the value.
    ///
    /// # Errors
    ///
    /// - `Unresolved` if `name` itself has no enabled binding.
    /// - `CircularReference` if expansion revisits a name.
    /// - `DepthExceeded` past [`MAX_RESOLUTION_DEPTH`] nested names.
    pub fn resolve(&self, name: &str) -> Result<ResolvedVariable, ResolveError> {
        let mut stack = Vec::new();
        self.resolve_nested(name, &mut stack)
    }

    /// Substitutes every placeholder in `input`.
    ///
    /// # Errors
    ///
    /// Returns `CircularReference` or `DepthExceeded` if any referenced
    /// variable cannot be expanded. Missing variables are not errors.
    pub fn resolve_template(&self, input: &str) -> Result<ResolutionResult, ResolveError> {
        let mut stack = Vec::new();
        self.expand(input, &mut stack)
    }

    fn resolve_nested(
        &self,
        name: &str,
        stack: &mut Vec<String>,
    ) -> Result<ResolvedVariable, ResolveError> {
        if stack.iter().any(|visited| visited == name) {
            return Err(ResolveError::CircularReference {
                chain: chain_with(stack, name),
            });
        }
        if stack.len() >= MAX_RESOLUTION_DEPTH {
            return Err(ResolveError::DepthExceeded {
                chain: chain_with(stack, name),
            });
        }

        let raw = self
            .context
            .lookup(name)
            .ok_or_else(|| ResolveError::Unresolved(name.to_string()))?;

        stack.push(name.to_string());
        let expanded = self.expand(&raw.value, stack);
        stack.pop();

        Ok(ResolvedVariable::new(name, expanded?.resolved, raw.scope))
    }

    fn expand(
        &self,
        input: &str,
        stack: &mut Vec<String>,
    ) -> Result<ResolutionResult, ResolveError> {
        let references = parse_variables(input);
        let mut resolved = String::with_capacity(input.len());
        let mut resolved_variables = Vec::new();
        let mut unresolved = Vec::new();
        let mut last_end = 0;

        for reference in references {
            resolved.push_str(&input[last_end..reference.span.start]);

            match self.resolve_nested(&reference.name, stack) {
                Ok(variable) => {
                    resolved.push_str(&variable.value);
                    resolved_variables.push(variable);
                }
                Err(ResolveError::Unresolved(name)) => {
                    resolved.push_str(&input[reference.span.clone()]);
                    unresolved.push(name);
                }
                Err(other) => return Err(other),
            }

            last_end = reference.span.end;
        }
        resolved.push_str(&input[last_end..]);

        Ok(ResolutionResult {
            resolved,
            resolved_variables,
            unresolved,
        })
    }
}

fn chain_with(stack: &[String], name: &str) -> Vec<String> {
    let mut chain = stack.to_vec();
    chain.push(name.to_string());
    chain
}

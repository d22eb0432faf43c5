//! Variable resolution module
//!
//! Provides parsing and resolution of `{{variable}}` syntax in strings.
//!
//! # Usage
//!
//! ```
//! use courier_application::variable_resolver::VariableResolver;
//! use courier_domain::environment::{Environment, ResolutionContext};
//!
//! let env = Environment::new("development").with_variable("host", "localhost");
//! let resolver = VariableResolver::new(ResolutionContext::new().with_environment(&env));
//!
//! let result = resolver.resolve_template("http://{{host}}/api").unwrap();
//! assert_eq!(result.resolved, "http://localhost/api");
//! ```

pub mod engine;
pub mod parser;

pub use engine::{MAX_RESOLUTION_DEPTH, ResolutionResult, ResolveError, VariableResolver};
pub use parser::{VariableReference, extract_variable_names, has_variables, parse_variables};

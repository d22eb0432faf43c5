//! Placeholder parser for `{{variable}}` syntax.

use std::ops::Range;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A placeholder found in a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    /// The variable name (without braces), trimmed.
    pub name: String,

    /// Byte range of the whole placeholder, braces included.
    pub span: Range<usize>,
}

/// Finds every well-formed placeholder in `input`, left to right.
///
/// Whitespace inside the braces is ignored (`{{ host }}` names `host`).
/// Empty placeholders and an unclosed trailing `{{` are not references.
///
/// ```
/// use courier_application::variable_resolver::parse_variables;
///
/// let refs = parse_variables("{{base_url}}/users/{{ id }}");
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[1].name, "id");
/// ```
#[must_use]
pub fn parse_variables(input: &str) -> Vec<VariableReference> {
    let mut references = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find(OPEN) {
        let start = cursor + offset;
        let inner_start = start + OPEN.len();

        let Some(close) = input[inner_start..].find(CLOSE) else {
            break;
        };
        let inner_end = inner_start + close;
        let name = input[inner_start..inner_end].trim();

        // `{{ {{a}} }}`: rescan from the inner opening.
        if name.contains('{') {
            cursor = inner_start;
            continue;
        }

        let end = inner_end + CLOSE.len();
        if !name.is_empty() {
            references.push(VariableReference {
                name: name.to_string(),
                span: start..end,
            });
        }
        cursor = end;
    }

    references
}

/// Returns true if the input contains at least one placeholder.
#[must_use]
pub fn has_variables(input: &str) -> bool {
    !parse_variables(input).is_empty()
}

/// Placeholder names in order of appearance, duplicates kept.
#[must_use]
pub fn extract_variable_names(input: &str) -> Vec<String> {
    parse_variables(input).into_iter().map(|r| r.name).collect()
}

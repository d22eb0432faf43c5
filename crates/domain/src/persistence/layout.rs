//! On-disk layout of a collection.
//!
//! ```text
//! <root>/collection.yaml
//! <root>/environments/<slug>.yaml
//! <root>/<folder>/folder.yaml            (optional)
//! <root>/<folder>/<slug>.request.yaml
//! ```

use std::path::{Component, Path};

use super::codec::DocumentKind;
use crate::error::{DomainError, DomainResult};

/// Collection metadata file at the root.
pub const COLLECTION_FILE: &str = "collection.yaml";

/// Optional folder metadata file inside a folder directory.
pub const FOLDER_FILE: &str = "folder.yaml";

/// Directory holding environment files, directly below the root.
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Suffix of request files.
pub const REQUEST_SUFFIX: &str = ".request.yaml";

/// Suffix of environment files.
pub const ENVIRONMENT_SUFFIX: &str = ".yaml";

/// Suffix of in-flight atomic-write temp files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// What a file inside a collection represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `collection.yaml` at the root.
    Collection,
    /// A file in `environments/`.
    Environment,
    /// `folder.yaml` inside a folder; describes its parent directory.
    FolderMeta,
    /// A `*.request.yaml` file.
    Request,
}

impl EntryKind {
    /// Document kind the file decodes to.
    #[must_use]
    pub const fn document_kind(self) -> DocumentKind {
        match self {
            Self::Collection => DocumentKind::Collection,
            Self::Environment => DocumentKind::Environment,
            Self::FolderMeta => DocumentKind::Folder,
            Self::Request => DocumentKind::Request,
        }
    }
}

/// Returns true for paths that never belong to the collection tree:
/// hidden entries (including atomic-write temp files) and stray temp files.
#[must_use]
pub fn is_ignored(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(segment) => {
            let segment = segment.to_string_lossy();
            segment.starts_with('.') || segment.ends_with(TEMP_SUFFIX)
        }
        _ => false,
    })
}

/// Returns true if `relative` is the environments directory.
#[must_use]
pub fn is_environments_dir(relative: &Path) -> bool {
    relative == Path::new(ENVIRONMENTS_DIR)
}

/// Classifies a file path relative to the collection root.
///
/// Returns `None` for files that are not part of the collection
/// (ignored entries, unrelated files).
#[must_use]
pub fn classify(relative: &Path) -> Option<EntryKind> {
    if is_ignored(relative) {
        return None;
    }

    let file_name = relative.file_name()?.to_str()?;
    let parent = relative.parent().unwrap_or_else(|| Path::new(""));

    if parent.as_os_str().is_empty() && file_name == COLLECTION_FILE {
        return Some(EntryKind::Collection);
    }

    if relative.starts_with(ENVIRONMENTS_DIR) {
        return (is_environments_dir(parent) && file_name.ends_with(ENVIRONMENT_SUFFIX))
            .then_some(EntryKind::Environment);
    }

    if file_name == FOLDER_FILE && !parent.as_os_str().is_empty() {
        return Some(EntryKind::FolderMeta);
    }

    if file_name.ends_with(REQUEST_SUFFIX) && file_name.len() > REQUEST_SUFFIX.len() {
        return Some(EntryKind::Request);
    }

    None
}

/// Converts a display name into a filesystem-safe slug.
///
/// Lower-cases, replaces every non-alphanumeric run with a single `-` and
/// trims leading/trailing dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn non_empty_slug(name: &str) -> DomainResult<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        Err(DomainError::InvalidName(name.to_string()))
    } else {
        Ok(slug)
    }
}

/// File name for a request with the given display name.
///
/// # Errors
/// Returns `DomainError::InvalidName` if the name has no usable characters.
pub fn request_file_name(name: &str) -> DomainResult<String> {
    Ok(format!("{}{REQUEST_SUFFIX}", non_empty_slug(name)?))
}

/// File name for an environment with the given display name.
///
/// # Errors
/// Returns `DomainError::InvalidName` if the name has no usable characters.
pub fn environment_file_name(name: &str) -> DomainResult<String> {
    Ok(format!("{}{ENVIRONMENT_SUFFIX}", non_empty_slug(name)?))
}

/// Directory name for a folder with the given display name.
///
/// # Errors
/// Returns `DomainError::InvalidName` if the name has no usable characters
/// or collides with the reserved environments directory.
pub fn folder_dir_name(name: &str) -> DomainResult<String> {
    let slug = non_empty_slug(name)?;
    if slug == ENVIRONMENTS_DIR {
        return Err(DomainError::InvalidName(name.to_string()));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Get Users"), "get-users");
        assert_eq!(slugify("POST /api/v1/users"), "post-api-v1-users");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(Path::new("collection.yaml")),
            Some(EntryKind::Collection)
        );
        assert_eq!(
            classify(Path::new("environments/dev.yaml")),
            Some(EntryKind::Environment)
        );
        assert_eq!(
            classify(Path::new("users/folder.yaml")),
            Some(EntryKind::FolderMeta)
        );
        assert_eq!(
            classify(Path::new("users/admin/list.request.yaml")),
            Some(EntryKind::Request)
        );
        assert_eq!(classify(Path::new("list.request.yaml")), Some(EntryKind::Request));
    }

    #[test]
    fn test_classify_rejects_unrelated() {
        assert_eq!(classify(Path::new("folder.yaml")), None);
        assert_eq!(classify(Path::new("users/collection.yaml")), None);
        assert_eq!(classify(Path::new("README.md")), None);
        assert_eq!(classify(Path::new("environments/notes.txt")), None);
        assert_eq!(classify(Path::new("environments/old/x.request.yaml")), None);
        assert_eq!(classify(Path::new(".request.yaml")), None);
    }

    #[test]
    fn test_ignored_paths() {
        assert!(is_ignored(Path::new(".git/HEAD")));
        assert!(is_ignored(Path::new("users/.list.request.yaml.0193.tmp")));
        assert!(is_ignored(Path::new("users/backup.tmp")));
        assert!(!is_ignored(Path::new("users/list.request.yaml")));
        assert_eq!(classify(Path::new(".hidden/x.request.yaml")), None);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            request_file_name("List Users").unwrap_or_default(),
            "list-users.request.yaml"
        );
        assert_eq!(
            environment_file_name("Production").unwrap_or_default(),
            "production.yaml"
        );
        assert!(request_file_name("!!!").is_err());
        assert!(folder_dir_name("Environments").is_err());
    }
}

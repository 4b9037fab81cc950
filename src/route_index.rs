//! Route trie built from directory layout. Each directory or file name (extension stripped) is a
//! literal segment; a name of the form `${var}` is the node's single capture child.

use crate::error::{AppError, ConfigError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default)]
pub struct RouteNode {
    children: HashMap<String, RouteNode>,
    capture: Option<Capture>,
}

#[derive(Clone, Debug)]
struct Capture {
    name: String,
    node: Box<RouteNode>,
}

impl RouteNode {
    /// Child for `segment`, created if absent. `${name}` selects the capture child.
    fn child_mut(&mut self, segment: &str, location: &str) -> Result<&mut RouteNode, ConfigError> {
        match capture_name(segment) {
            Some(name) => {
                let capture = self.capture.get_or_insert_with(|| Capture {
                    name: name.to_string(),
                    node: Box::default(),
                });
                if capture.name != name {
                    return Err(ConfigError::ConflictingCapture {
                        dir: location.to_string(),
                        first: capture.name.clone(),
                        second: name.to_string(),
                    });
                }
                Ok(&mut capture.node)
            }
            None => Ok(self.children.entry(segment.to_string()).or_default()),
        }
    }
}

/// `${id}` -> `id`. Anything else, including `${}`, is not a capture.
fn capture_name(segment: &str) -> Option<&str> {
    let rest = segment.strip_prefix("${")?;
    let end = rest.find('}')?;
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Result of resolving a uri.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    /// Canonical path, captures written as `${name}`.
    pub path: String,
    /// Captured variables in traversal order.
    pub captures: Vec<(String, String)>,
    /// The uri actually resolved (the index path for an empty or `/` uri).
    pub uri: String,
}

#[derive(Clone, Debug)]
pub struct RouteIndex {
    root: RouteNode,
    index_path: String,
}

impl RouteIndex {
    pub fn new(index_path: impl Into<String>) -> Self {
        RouteIndex {
            root: RouteNode::default(),
            index_path: index_path.into(),
        }
    }

    /// Scan every base directory recursively. Missing directories are skipped with a warning.
    pub fn build(dirs: &[PathBuf], index_path: impl Into<String>) -> Result<Self, ConfigError> {
        let mut index = RouteIndex::new(index_path);
        for dir in dirs {
            if !dir.is_dir() {
                tracing::warn!(dir = %dir.display(), "route directory not found, skipping");
                continue;
            }
            add_directory(dir, &mut index.root)?;
            tracing::info!(dir = %dir.display(), "routes loaded");
        }
        Ok(index)
    }

    /// Register a route pattern such as `/users/${id}/edit`.
    pub fn add_route(&mut self, pattern: &str) -> Result<(), ConfigError> {
        let mut node = &mut self.root;
        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            node = node.child_mut(segment, pattern)?;
        }
        Ok(())
    }

    pub fn index_path(&self) -> &str {
        &self.index_path
    }

    /// Walk the trie. Literal children win over the capture child; no match is `NotFound`.
    pub fn resolve(&self, uri: &str) -> Result<RouteMatch, AppError> {
        let uri = if uri.is_empty() || uri == "/" {
            self.index_path.as_str()
        } else {
            uri
        };
        let mut node = &self.root;
        let mut path = String::new();
        let mut captures = Vec::new();
        for token in uri.split('/').filter(|t| !t.is_empty()) {
            if let Some(child) = node.children.get(token) {
                path.push('/');
                path.push_str(token);
                node = child;
            } else if let Some(capture) = &node.capture {
                path.push_str("/${");
                path.push_str(&capture.name);
                path.push('}');
                captures.push((capture.name.clone(), token.to_string()));
                node = &capture.node;
            } else {
                return Err(AppError::NotFound(uri.to_string()));
            }
        }
        Ok(RouteMatch {
            path,
            captures,
            uri: uri.to_string(),
        })
    }
}

fn add_directory(dir: &Path, node: &mut RouteNode) -> Result<(), ConfigError> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::warn!(entry = ?file_name, "non-utf8 route entry, skipping");
            continue;
        };
        if name.is_empty() || name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type()?.is_dir();
        let segment = if is_dir {
            name
        } else {
            match name.rfind('.') {
                Some(i) if i > 0 => &name[..i],
                _ => name,
            }
        };
        let child = node.child_mut(segment, &dir.display().to_string())?;
        if is_dir {
            add_directory(&entry.path(), child)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> RouteIndex {
        let mut idx = RouteIndex::new("/index");
        for p in ["/index", "/users", "/users/new", "/users/${id}", "/users/${id}/edit"] {
            idx.add_route(p).unwrap();
        }
        idx
    }

    #[test]
    fn literal_match_has_no_captures() {
        let m = index().resolve("/users/new").unwrap();
        assert_eq!(m.path, "/users/new");
        assert!(m.captures.is_empty());
    }

    #[test]
    fn capture_binds_token_and_rewrites_path() {
        let m = index().resolve("/users/42/edit").unwrap();
        assert_eq!(m.path, "/users/${id}/edit");
        assert_eq!(m.captures, vec![("id".to_string(), "42".to_string())]);
    }

    #[test]
    fn canonical_path_resolves_to_itself() {
        let idx = index();
        let first = idx.resolve("/users/7/edit").unwrap();
        let again = idx.resolve(&first.path).unwrap();
        assert_eq!(again.path, first.path);
        assert_eq!(again.captures.len(), first.captures.len());
    }

    #[test]
    fn empty_and_root_uri_map_to_index() {
        let idx = index();
        assert_eq!(idx.resolve("").unwrap().path, "/index");
        let m = idx.resolve("/").unwrap();
        assert_eq!(m.path, "/index");
        assert_eq!(m.uri, "/index");
    }

    #[test]
    fn repeated_slashes_are_ignored() {
        assert_eq!(index().resolve("//users///9").unwrap().path, "/users/${id}");
    }

    #[test]
    fn unknown_path_is_not_found() {
        assert!(matches!(index().resolve("/orders"), Err(AppError::NotFound(_))));
        assert!(matches!(index().resolve("/users/1/delete"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn second_capture_name_at_same_level_is_rejected() {
        let mut idx = index();
        assert!(matches!(
            idx.add_route("/users/${name}"),
            Err(ConfigError::ConflictingCapture { .. })
        ));
    }

    #[test]
    fn capture_name_parsing() {
        assert_eq!(capture_name("${id}"), Some("id"));
        assert_eq!(capture_name("${}"), None);
        assert_eq!(capture_name("users"), None);
    }
}

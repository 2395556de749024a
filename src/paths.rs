//! Relative path handling for the image root.
//!
//! Every directory is addressed by its normalized full path below the image
//! root (`""` for the root itself, `"a/b"` otherwise). Catalog rows are keyed
//! by `(name, path)` where `path` is the parent's full path plus a trailing
//! `/` (empty for top-level entries).

use crate::scanner::ScanError;

/// Name stored for the image root row.
pub const ROOT_NAME: &str = ".";

/// Normalizes a caller-supplied relative path.
///
/// Accepts `/` and `\` separators, drops `.` components and resolves `..`.
/// Paths that climb above the image root are rejected.
pub fn normalize(raw: &str) -> Result<String, ScanError> {
    if raw.contains('\0') {
        return Err(ScanError::InvalidPath("path contains null characters".into()));
    }
    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(ScanError::InvalidPath(format!("{} escapes the image root", raw)));
                }
            }
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

/// Catalog key of one directory row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryKey {
    pub name: String,
    pub path: String,
}

impl DirectoryKey {
    /// Builds the key for an already normalized full path.
    pub fn from_full_path(full: &str) -> Self {
        match full.rsplit_once('/') {
            Some((parent, name)) => Self { name: name.to_string(), path: format!("{}/", parent) },
            None if full.is_empty() => Self { name: ROOT_NAME.to_string(), path: String::new() },
            None => Self { name: full.to_string(), path: String::new() },
        }
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_NAME && self.path.is_empty()
    }

    pub fn full_path(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}{}", self.path, self.name)
        }
    }

    /// The `path` value carried by this directory's children.
    pub fn child_path(&self) -> String {
        child_path_of(&self.full_path())
    }

    /// Key of the owning directory, `None` for the root.
    pub fn parent(&self) -> Option<DirectoryKey> {
        if self.is_root() {
            return None;
        }
        Some(DirectoryKey::from_full_path(self.path.trim_end_matches('/')))
    }
}

pub fn child_path_of(full: &str) -> String {
    if full.is_empty() {
        String::new()
    } else {
        format!("{}/", full)
    }
}

/// Joins a child name onto a normalized full path.
pub fn join(full: &str, name: &str) -> String {
    format!("{}{}", child_path_of(full), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots_and_separators() {
        assert_eq!(normalize("").unwrap(), "");
        assert_eq!(normalize("/").unwrap(), "");
        assert_eq!(normalize("./a//b/").unwrap(), "a/b");
        assert_eq!(normalize("a\\b\\..\\c").unwrap(), "a/c");
    }

    #[test]
    fn normalize_rejects_escape() {
        assert!(matches!(normalize("../etc"), Err(ScanError::InvalidPath(_))));
        assert!(matches!(normalize("a/../../b"), Err(ScanError::InvalidPath(_))));
    }

    #[test]
    fn keys_round_trip_full_paths() {
        let root = DirectoryKey::from_full_path("");
        assert!(root.is_root());
        assert_eq!(root.full_path(), "");
        assert_eq!(root.child_path(), "");
        assert!(root.parent().is_none());

        let top = DirectoryKey::from_full_path("2019");
        assert_eq!(top, DirectoryKey { name: "2019".into(), path: "".into() });
        assert_eq!(top.child_path(), "2019/");
        assert!(top.parent().unwrap().is_root());

        let nested = DirectoryKey::from_full_path("2019/summer/beach");
        assert_eq!(nested.name, "beach");
        assert_eq!(nested.path, "2019/summer/");
        assert_eq!(nested.full_path(), "2019/summer/beach");
        assert_eq!(nested.parent().unwrap().full_path(), "2019/summer");
    }
}

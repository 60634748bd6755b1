//! Hierarchical storage paths.
//!
//! Paths are `/`-separated sequences of segments. The canonical absolute
//! form starts with a single `/`, has no trailing separator (except the root
//! path `/` itself) and never contains empty segments. Every store key and
//! every entity path in the bridge goes through [`build`] or [`join`] before
//! it reaches a backend.

use crate::error::TypeError;

/// Segment separator.
pub const SEPARATOR: char = '/';

/// The root path.
pub const ROOT: &str = "/";

/// Compose path components into one canonical path.
///
/// Each component may itself contain separators; empty segments are
/// collapsed. With `absolute == true` the result starts with `/` (and an
/// empty component list yields `/`). Relative results never start with `/`.
pub fn build<I, S>(components: I, absolute: bool) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for component in components {
        for segment in component.as_ref().split(SEPARATOR) {
            if segment.is_empty() {
                continue;
            }
            if !out.is_empty() || absolute {
                out.push(SEPARATOR);
            }
            out.push_str(segment);
        }
    }
    if absolute && out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

/// Join a root and a relative name into a canonical absolute path.
pub fn join(root: &str, name: &str) -> String {
    build([root, name], true)
}

/// Canonical absolute form of `path`.
pub fn normalize(path: &str) -> String {
    build([path], true)
}

/// Iterate over the non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Number of segments. The root path has depth 0.
pub fn depth(path: &str) -> usize {
    segments(path).count()
}

/// Last segment of the path, or `""` for the root.
pub fn name(path: &str) -> &str {
    segments(path).last().unwrap_or("")
}

/// Parent of `path` in canonical absolute form, or `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    let segs: Vec<&str> = segments(path).collect();
    if segs.is_empty() {
        return None;
    }
    Some(build(&segs[..segs.len() - 1], true))
}

/// Returns `true` if `path` equals `ancestor` or lies below it.
///
/// The test is segment-aware: `/a/bc` is not under `/a/b`.
pub fn is_under(path: &str, ancestor: &str) -> bool {
    let path = normalize(path);
    let ancestor = normalize(ancestor);
    if ancestor == ROOT {
        return true;
    }
    path == ancestor
        || path
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
}

/// Returns `true` if `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    is_under(path, ancestor) && normalize(path) != normalize(ancestor)
}

/// Rewrite `path` by replacing its `from` prefix with `to`.
///
/// Returns `None` if `path` is not under `from`.
pub fn replace_prefix(path: &str, from: &str, to: &str) -> Option<String> {
    if !is_under(path, from) {
        return None;
    }
    let path = normalize(path);
    let from = normalize(from);
    let rest = if from == ROOT {
        path.as_str()
    } else {
        &path[from.len()..]
    };
    Some(build([to, rest], true))
}

/// Validate a path that addresses an entity.
///
/// Entity paths must be absolute and must not be the root. Empty, `.` and
/// `..` segments are rejected rather than collapsed.
pub fn validate_entity_path(path: &str) -> Result<(), TypeError> {
    if path.is_empty() {
        return Err(TypeError::invalid_path(path, "path is empty"));
    }
    if !path.starts_with(SEPARATOR) {
        return Err(TypeError::invalid_path(path, "path must be absolute"));
    }
    if path == ROOT {
        return Err(TypeError::invalid_path(path, "root cannot hold an entity"));
    }
    for segment in path[1..].split(SEPARATOR) {
        match segment {
            "" => return Err(TypeError::invalid_path(path, "empty path segment")),
            "." | ".." => {
                return Err(TypeError::invalid_path(path, "relative path segment"))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Validate a single path segment (a file or resource name).
pub fn validate_segment(name: &str) -> Result<(), TypeError> {
    match name {
        "" => Err(TypeError::invalid_path(name, "name is empty")),
        "." | ".." => Err(TypeError::invalid_path(name, "relative name")),
        _ if name.contains(SEPARATOR) => {
            Err(TypeError::invalid_path(name, "name contains a separator"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    #[test]
    fn build_collapses_separators() {
        assert_eq!(build(["/a//", "/b/", "c"], true), "/a/b/c");
        assert_eq!(build(["a", "b"], false), "a/b");
    }

    #[test]
    fn build_empty_absolute_is_root() {
        assert_eq!(build(Vec::<&str>::new(), true), "/");
        assert_eq!(build(["", "/"], true), "/");
        assert_eq!(build([""], false), "");
    }

    #[test]
    fn join_root_and_name() {
        assert_eq!(join("/index", "seg0"), "/index/seg0");
        assert_eq!(join("/", "seg0"), "/seg0");
        assert_eq!(join("index/", "/seg0"), "/index/seg0");
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    #[test]
    fn parent_and_name() {
        assert_eq!(parent("/a/b/c").as_deref(), Some("/a/b"));
        assert_eq!(parent("/a").as_deref(), Some("/"));
        assert_eq!(parent("/"), None);
        assert_eq!(name("/a/b/c"), "c");
        assert_eq!(name("/"), "");
    }

    #[test]
    fn depth_counts_segments() {
        assert_eq!(depth("/"), 0);
        assert_eq!(depth("/a"), 1);
        assert_eq!(depth("/a/b/c"), 3);
    }

    #[test]
    fn is_under_is_segment_aware() {
        assert!(is_under("/a/b", "/a"));
        assert!(is_under("/a", "/a"));
        assert!(!is_under("/ab", "/a"));
        assert!(!is_under("/a/bc", "/a/b"));
        assert!(is_under("/anything", "/"));
        assert!(is_descendant("/a/b", "/a"));
        assert!(!is_descendant("/a", "/a"));
    }

    #[test]
    fn replace_prefix_rewrites_subtree() {
        assert_eq!(replace_prefix("/x/a/b", "/x", "/z").as_deref(), Some("/z/a/b"));
        assert_eq!(replace_prefix("/x", "/x", "/z").as_deref(), Some("/z"));
        assert_eq!(replace_prefix("/xa", "/x", "/z"), None);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn entity_path_validation() {
        assert!(validate_entity_path("/site/page").is_ok());
        assert!(validate_entity_path("").is_err());
        assert!(validate_entity_path("/").is_err());
        assert!(validate_entity_path("relative").is_err());
        assert!(validate_entity_path("/a//b").is_err());
        assert!(validate_entity_path("/a/../b").is_err());
        assert!(validate_entity_path("/a/").is_err());
    }

    #[test]
    fn segment_validation() {
        assert!(validate_segment("seg0.cfs").is_ok());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("..").is_err());
    }

    proptest! {
        #[test]
        fn build_is_idempotent(parts in proptest::collection::vec("[a-z/]{0,6}", 0..5)) {
            let once = build(&parts, true);
            prop_assert_eq!(build([once.as_str()], true), once.clone());
            prop_assert!(once.starts_with('/'));
            prop_assert!(!once.contains("//"));
        }

        #[test]
        fn joined_path_is_under_root(root in "(/[a-z]{1,4}){0,3}", leaf in "[a-z]{1,6}") {
            let joined = join(&root, &leaf);
            prop_assert!(is_under(&joined, &root));
            prop_assert_eq!(parent(&joined), Some(normalize(&root)));
            prop_assert_eq!(name(&joined), leaf.as_str());
        }
    }
}

//! Structural helpers for remote slash-separated paths.
//!
//! Paths are never resolved against the storage service here; parents and
//! depths are computed purely from the string.

/// Whether `path` denotes `root`, ignoring trailing slashes.
pub fn is_root(path: &str, root: &str) -> bool {
    path.trim_end_matches('/') == root.trim_end_matches('/')
}

/// Parent of `path`. The root is its own parent.
pub fn parent(path: &str, root: &str) -> String {
    if is_root(path, root) {
        return root.to_string();
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((head, _)) if !head.is_empty() => head.to_string(),
        _ => "/".to_string(),
    }
}

/// Number of segments between `root` and `path`.
///
/// Returns 0 for the root itself and for paths outside the root.
pub fn depth(path: &str, root: &str) -> usize {
    let path = path.trim_matches('/');
    let root = root.trim_matches('/');
    if path == root {
        return 0;
    }
    let rest = if root.is_empty() {
        Some(path)
    } else {
        path.strip_prefix(root).and_then(|rest| rest.strip_prefix('/'))
    };
    match rest {
        Some(rest) if !rest.is_empty() => 1 + rest.matches('/').count(),
        _ => 0,
    }
}

/// Last segment of `path`, used as a menu title.
pub fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/materials";

    #[test]
    fn test_root_is_its_own_parent() {
        assert_eq!(parent(ROOT, ROOT), ROOT);
        assert_eq!(parent("/materials/", ROOT), ROOT);
    }

    #[test]
    fn test_parent_trims_last_segment() {
        assert_eq!(parent("/materials/a", ROOT), "/materials");
        assert_eq!(parent("/materials/a/b", ROOT), "/materials/a");
        assert_eq!(parent("/materials/a/b/", ROOT), "/materials/a");
    }

    #[test]
    fn test_parent_outside_root() {
        assert_eq!(parent("/other", ROOT), "/");
        assert_eq!(parent("/", ROOT), "/");
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(ROOT, ROOT), 0);
        assert_eq!(depth("/materials/", ROOT), 0);
        assert_eq!(depth("/materials/a", ROOT), 1);
        assert_eq!(depth("/materials/a/b/c", ROOT), 3);
        assert_eq!(depth("/materialsX/a", ROOT), 0);
        assert_eq!(depth("/elsewhere", ROOT), 0);
    }

    #[test]
    fn test_depth_with_slash_root() {
        assert_eq!(depth("/", "/"), 0);
        assert_eq!(depth("/a/b", "/"), 2);
    }

    #[test]
    fn test_repeated_parent_reaches_root_in_depth_steps() {
        let paths = [
            "/materials/a",
            "/materials/a/b",
            "/materials/Курс 1/Неделя 2/Лекции",
            "/materials/x/y/z/w/v",
        ];
        for path in paths {
            let expected = depth(path, ROOT);
            let mut current = path.to_string();
            let mut steps = 0;
            while !is_root(&current, ROOT) {
                current = parent(&current, ROOT);
                steps += 1;
                assert!(steps <= expected, "overshot root for {path}");
            }
            assert_eq!(steps, expected, "wrong step count for {path}");
            assert_eq!(parent(&current, ROOT), ROOT);
        }
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("/materials/Docs"), "Docs");
        assert_eq!(last_segment("/materials/Docs/"), "Docs");
        assert_eq!(last_segment("/materials"), "materials");
        assert_eq!(last_segment("plain"), "plain");
    }
}

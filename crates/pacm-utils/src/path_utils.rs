use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir_exists(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Handle scoped package names (`@scope/name`) in file paths.
#[must_use]
pub fn get_scoped_package_path(base_path: &Path, package_name: &str) -> PathBuf {
    if let Some((scope, name)) = package_name.split_once('/') {
        if package_name.starts_with('@') {
            return base_path.join(scope).join(name);
        }
    }
    base_path.join(package_name)
}

/// The root-level lockfile/tree path key for a package name, e.g.
/// `node_modules/lodash` or `node_modules/@types/node`.
#[must_use]
pub fn node_modules_key(name: &str) -> String {
    format!("node_modules/{name}")
}

/// Append one more `node_modules/<name>` segment onto an existing path
/// key, used to build nested lockfile entries.
#[must_use]
pub fn nested_node_modules_key(parent_key: &str, name: &str) -> String {
    if parent_key.is_empty() {
        node_modules_key(name)
    } else {
        format!("{parent_key}/node_modules/{name}")
    }
}

/// Split a lockfile path key into its package-name segments.
///
/// Segment by the literal `"/node_modules/"`, filtering empties,
/// so `"node_modules/@scope/name"` stays a single segment (the scope
/// separator is `/`, not `/node_modules/`).
#[must_use]
pub fn split_lock_path(path: &str) -> Vec<String> {
    path.split("/node_modules/")
        .map(str::trim_matches('/'))
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_start_matches("node_modules/").to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_key_for_plain_name() {
        assert_eq!(node_modules_key("lodash"), "node_modules/lodash");
    }

    #[test]
    fn root_key_for_scoped_name() {
        assert_eq!(node_modules_key("@types/node"), "node_modules/@types/node");
    }

    #[test]
    fn nested_key_builds_on_parent() {
        assert_eq!(
            nested_node_modules_key("node_modules/a", "b"),
            "node_modules/a/node_modules/b"
        );
    }

    #[test]
    fn split_simple_path() {
        assert_eq!(split_lock_path("node_modules/lodash"), vec!["lodash".to_string()]);
    }

    #[test]
    fn split_nested_path() {
        assert_eq!(
            split_lock_path("node_modules/a/node_modules/b"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn split_scoped_nested_path() {
        assert_eq!(
            split_lock_path("node_modules/@scope/a/node_modules/b"),
            vec!["@scope/a".to_string(), "b".to_string()]
        );
    }
}

//! The npm v3 lockfile codec: pure functions over a
//! [`DependencyTree`] — no file IO, that's a host concern.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use pacm_resolver::{DependencyNode, DependencyTree, ResolveStats};
use pacm_utils::{nested_node_modules_key, node_modules_key, split_lock_path};

fn is_false(b: &bool) -> bool {
    !b
}

/// One `packages["..."]` entry. The root (`""`) entry reuses this shape
/// too, populating only `version`/`dependencies`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockFileEntry {
    #[serde(default)]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub integrity: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub dev: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub optional: bool,
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(rename = "peerDependencies", skip_serializing_if = "IndexMap::is_empty", default)]
    pub peer_dependencies: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub engines: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub os: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cpu: Option<Vec<String>>,
    #[serde(rename = "bundleDependencies", skip_serializing_if = "Vec::is_empty", default)]
    pub bundle_dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(rename = "lockfileVersion")]
    pub lockfile_version: u32,
    pub requires: bool,
    pub packages: IndexMap<String, LockFileEntry>,
}

/// Produce a lockfile from a hoisted tree.
#[must_use]
pub fn generate(tree: &DependencyTree) -> LockFile {
    let mut names: Vec<&String> = tree.resolved.keys().collect();
    names.sort();

    let mut root_dependencies = IndexMap::new();
    for name in &names {
        root_dependencies.insert((*name).clone(), tree.resolved[*name].version.to_string());
    }

    let mut packages = IndexMap::new();
    packages.insert(
        String::new(),
        LockFileEntry {
            version: tree.version.as_ref().map_or_else(|| "0.0.0".to_string(), ToString::to_string),
            dependencies: root_dependencies,
            ..LockFileEntry::default()
        },
    );

    for name in &names {
        let key = node_modules_key(name);
        emit_node(&key, &tree.resolved[*name], &mut packages);
    }

    LockFile {
        name: tree.name.clone(),
        version: tree.version.as_ref().map(ToString::to_string),
        lockfile_version: 3,
        requires: true,
        packages,
    }
}

fn emit_node(key: &str, node: &DependencyNode, packages: &mut IndexMap<String, LockFileEntry>) {
    packages.insert(
        key.to_string(),
        LockFileEntry {
            version: node.version.to_string(),
            resolved: node.resolved.clone(),
            integrity: node.integrity.clone(),
            dev: node.dev,
            optional: node.optional,
            dependencies: node.dependencies.clone(),
            peer_dependencies: node.peer_dependencies.clone(),
            engines: node.engines.clone(),
            os: node.os.clone(),
            cpu: node.cpu.clone(),
            bundle_dependencies: node.bundled_dependencies.clone(),
        },
    );

    let mut names: Vec<&String> = node.nested_dependencies.keys().collect();
    names.sort();
    for name in names {
        let child_key = nested_node_modules_key(key, name);
        emit_node(&child_key, &node.nested_dependencies[name], packages);
    }
}

/// Rebuild a [`DependencyTree`] from a lockfile.
#[must_use]
pub fn parse(lockfile: &LockFile) -> DependencyTree {
    let mut resolved: IndexMap<String, DependencyNode> = IndexMap::new();
    let mut nested: Vec<(Vec<String>, &LockFileEntry)> = Vec::new();

    let mut keys: Vec<&String> = lockfile.packages.keys().collect();
    keys.sort();
    for key in keys {
        if key.is_empty() {
            continue;
        }
        let segments = split_lock_path(key);
        if segments.len() == 1 {
            let name = segments.first().cloned().unwrap_or_else(|| "package".to_string());
            resolved.insert(name.clone(), node_from_entry(&name, &lockfile.packages[key]));
        } else if !segments.is_empty() {
            nested.push((segments, &lockfile.packages[key]));
        }
    }

    // Shallower entries first so each one's parent is already placed.
    nested.sort_by_key(|(segments, _)| segments.len());
    for (segments, entry) in nested {
        let name = segments.last().cloned().unwrap_or_else(|| "package".to_string());
        let parent_path = &segments[..segments.len() - 1];
        if let Some(parent) = locate_mut(&mut resolved, parent_path) {
            parent.nested_dependencies.insert(name.clone(), node_from_entry(&name, entry));
        }
    }

    let total_packages = lockfile.packages.len().saturating_sub(1);

    DependencyTree {
        name: lockfile.name.clone(),
        version: lockfile.version.as_deref().and_then(|v| pacm_semver::parse(v).ok()),
        resolved,
        warnings: Vec::new(),
        stats: ResolveStats { total_packages, ..ResolveStats::default() },
    }
}

fn locate_mut<'a>(resolved: &'a mut IndexMap<String, DependencyNode>, path: &[String]) -> Option<&'a mut DependencyNode> {
    let (first, rest) = path.split_first()?;
    let mut node = resolved.get_mut(first)?;
    for segment in rest {
        node = node.nested_dependencies.get_mut(segment)?;
    }
    Some(node)
}

fn node_from_entry(name: &str, entry: &LockFileEntry) -> DependencyNode {
    let version_str = if entry.version.is_empty() { "0.0.0" } else { entry.version.as_str() };
    let version = pacm_semver::parse(version_str)
        .or_else(|_| pacm_semver::parse("0.0.0"))
        .unwrap_or_else(|_| pacm_semver::Version::new(0, 0, 0));

    DependencyNode {
        name: name.to_string(),
        version,
        dependencies: entry.dependencies.clone(),
        dev: entry.dev,
        optional: entry.optional,
        peer_dependencies: entry.peer_dependencies.clone(),
        has_bundled: !entry.bundle_dependencies.is_empty(),
        bundled_dependencies: entry.bundle_dependencies.clone(),
        nested_dependencies: IndexMap::new(),
        circular_to: Vec::new(), // not persisted in the v3 lockfile format
        integrity: entry.integrity.clone(),
        resolved: entry.resolved.clone(),
        os: entry.os.clone(),
        cpu: entry.cpu.clone(),
        engines: entry.engines.clone(),
    }
}

/// Counts backing [`LockDiff::summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockDiffSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// A structural diff over two trees' root-level `resolved` maps, by
/// name — not a deep tree diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<(String, String, String)>,
    pub unchanged: Vec<String>,
    pub summary: LockDiffSummary,
}

#[must_use]
pub fn diff(before: &DependencyTree, after: &DependencyTree) -> LockDiff {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut updated = Vec::new();
    let mut unchanged = Vec::new();

    let mut names: Vec<&String> = before.resolved.keys().chain(after.resolved.keys()).collect();
    names.sort();
    names.dedup();

    for name in names {
        match (before.resolved.get(name), after.resolved.get(name)) {
            (None, Some(_)) => added.push(name.clone()),
            (Some(_), None) => removed.push(name.clone()),
            (Some(b), Some(a)) => {
                if b.version == a.version {
                    unchanged.push(name.clone());
                } else {
                    updated.push((name.clone(), b.version.to_string(), a.version.to_string()));
                }
            }
            (None, None) => {}
        }
    }

    let summary =
        LockDiffSummary { added: added.len(), removed: removed.len(), updated: updated.len(), unchanged: unchanged.len() };

    LockDiff { added, removed, updated, unchanged, summary }
}

/// A non-fatal lockfile issue discovered during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum LockWarning {
    UnexpectedLockfileVersion { found: u32 },
    MissingIntegrity { key: String },
    MissingResolved { key: String },
}

impl std::fmt::Display for LockWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedLockfileVersion { found } => write!(f, "unexpected lockfileVersion: {found}"),
            Self::MissingIntegrity { key } => write!(f, "{key} is missing integrity"),
            Self::MissingResolved { key } => write!(f, "{key} is missing resolved"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockValidation {
    pub warnings: Vec<LockWarning>,
    pub errors: Vec<String>,
}

impl LockValidation {
    /// Always `errors.is_empty()` — the reference behavior this was
    /// grounded on never actually populates `errors`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Warn on an unexpected `lockfileVersion` or a non-root entry missing
/// `integrity`/`resolved`.
#[must_use]
pub fn validate(lockfile: &LockFile) -> LockValidation {
    let mut warnings = Vec::new();

    if lockfile.lockfile_version != 3 {
        warnings.push(LockWarning::UnexpectedLockfileVersion { found: lockfile.lockfile_version });
    }

    let mut keys: Vec<&String> = lockfile.packages.keys().collect();
    keys.sort();
    for key in keys {
        if key.is_empty() {
            continue;
        }
        let entry = &lockfile.packages[key];
        if entry.integrity.is_none() {
            warnings.push(LockWarning::MissingIntegrity { key: key.clone() });
        }
        if entry.resolved.is_none() {
            warnings.push(LockWarning::MissingResolved { key: key.clone() });
        }
    }

    LockValidation { warnings, errors: Vec::new() }
}

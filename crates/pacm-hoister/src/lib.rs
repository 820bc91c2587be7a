//! The hoister: turns a resolver's [`ResolvedGraph`] into the
//! final [`DependencyTree`] that the lockfile codec and extractor read.
//!
//! Per package name, the version chosen by the most requesters wins the
//! root slot (ties broken by higher semver); every other chosen version
//! becomes a nesting decision under its own requesters.  Bundled
//! dependencies force nesting under their declaring parent regardless of
//! the vote.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use pacm_resolver::{DependencyNode, DependencyTree, ResolvedGraph};
use pacm_semver::Version;

/// Hoist a [`ResolvedGraph`] into a [`DependencyTree`].
#[must_use]
pub fn hoist(graph: &ResolvedGraph) -> DependencyTree {
    let root_version = choose_root_versions(graph);
    let mut decisions_by_requester = nesting_decisions(graph, &root_version);
    let bundled_requesters = apply_bundled_overrides(graph, &mut decisions_by_requester);

    let mut memo: HashMap<String, IndexMap<String, DependencyNode>> = HashMap::new();
    let mut resolved: IndexMap<String, DependencyNode> = IndexMap::new();

    let mut names: Vec<&String> = root_version.keys().collect();
    names.sort();
    for name in names {
        // A name whose every requester bundles it is never hoisted to
        // root, no matter which version the vote would have picked.
        if let Some(requesters) = graph.requirements.get(name) {
            if let Some(bundlers) = bundled_requesters.get(name) {
                if requesters.keys().all(|r| bundlers.contains(r)) {
                    continue;
                }
            }
        }
        let version = &root_version[name];
        let identity = format!("{name}@{version}");
        if let Some(node) = graph.nodes.get(&identity) {
            let mut placed = node.clone_without_nested();
            placed.nested_dependencies =
                nested_map_for(&identity, &decisions_by_requester, &graph.nodes, &mut memo, &mut HashSet::new());
            resolved.insert(name.clone(), placed);
        }
    }

    // Names resolved but never recorded as a requirement (declared at
    // root only) are placed verbatim, with no nested subtree of their
    // own — nothing references them as a requester.
    let mut root_only: Vec<&String> = graph.resolved_by_name.keys().collect();
    root_only.sort();
    for name in root_only {
        if resolved.contains_key(name) || graph.requirements.contains_key(name) {
            continue;
        }
        let identity = &graph.resolved_by_name[name];
        if let Some(node) = graph.nodes.get(identity) {
            resolved.insert(name.clone(), node.clone_without_nested());
        }
    }

    DependencyTree {
        name: graph.root_name.clone(),
        version: graph.root_version.clone(),
        resolved,
        warnings: graph.warnings.clone(),
        stats: graph.stats.clone(),
    }
}

/// Per name, the version chosen by the most requesters (ties broken by
/// higher semver) — one decision per package name.
fn choose_root_versions(graph: &ResolvedGraph) -> IndexMap<String, Version> {
    let mut root_version = IndexMap::new();

    let mut names: Vec<&String> = graph.requirements.keys().collect();
    names.sort();
    for name in names {
        let by_version = group_by_version(&graph.requirements[name]);
        let root_v = if by_version.len() == 1 {
            by_version.keys().next().cloned().expect("non-empty group")
        } else {
            by_version
                .iter()
                .map(|(v, requesters)| (requesters.len(), v.clone()))
                .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
                .map(|(_, v)| v)
                .expect("non-empty group")
        };
        root_version.insert(name.clone(), root_v);
    }

    root_version
}

/// Every version any requester chose for `name`, grouped by version,
/// with requester names sorted for determinism.
fn group_by_version(requesters: &IndexMap<String, pacm_resolver::RequirementChoice>) -> IndexMap<Version, Vec<String>> {
    let mut by_version: IndexMap<Version, Vec<String>> = IndexMap::new();
    let mut requester_names: Vec<&String> = requesters.keys().collect();
    requester_names.sort();
    for requester in requester_names {
        let choice = &requesters[requester];
        by_version.entry(choice.version.clone()).or_default().push(requester.clone());
    }
    by_version
}

/// `requester identity -> name -> chosen child identity` for every
/// name/version pair that lost the root vote.
fn nesting_decisions(
    graph: &ResolvedGraph,
    root_version: &IndexMap<String, Version>,
) -> IndexMap<String, IndexMap<String, String>> {
    let mut decisions: IndexMap<String, IndexMap<String, String>> = IndexMap::new();

    let mut names: Vec<&String> = graph.requirements.keys().collect();
    names.sort();
    for name in names {
        let root_v = &root_version[name];
        let by_version = group_by_version(&graph.requirements[name]);
        for (version, requesters) in &by_version {
            if version == root_v {
                continue;
            }
            let identity = format!("{name}@{version}");
            for requester in requesters {
                if requester == "ROOT" {
                    continue;
                }
                decisions.entry(requester.clone()).or_default().insert(name.clone(), identity.clone());
            }
        }
    }

    decisions
}

/// `bundledDependencies` entries force nesting under their declaring
/// parent, overriding whatever the vote decided. Returns,
/// per name, the set of requester identities that bundle it — used to
/// keep a fully-bundled name out of the root hoist entirely.
fn apply_bundled_overrides(
    graph: &ResolvedGraph,
    decisions: &mut IndexMap<String, IndexMap<String, String>>,
) -> HashMap<String, HashSet<String>> {
    let mut bundled_requesters: HashMap<String, HashSet<String>> = HashMap::new();

    let mut identities: Vec<&String> = graph.nodes.keys().collect();
    identities.sort();
    for identity in identities {
        let node = &graph.nodes[identity];
        if node.bundled_dependencies.is_empty() {
            continue;
        }
        for bundled_name in &node.bundled_dependencies {
            let Some(choice) = graph.requirements.get(bundled_name).and_then(|m| m.get(identity)) else {
                continue;
            };
            let child_identity = format!("{bundled_name}@{}", choice.version);
            decisions.entry(identity.clone()).or_default().insert(bundled_name.clone(), child_identity);
            bundled_requesters.entry(bundled_name.clone()).or_default().insert(identity.clone());
        }
    }

    bundled_requesters
}

/// Recursively builds the `nestedDependencies` map owed to `identity`,
/// memoized since every placement of the same identity owes the same
/// subtree (requirements are recorded by identity, not by tree path).
fn nested_map_for(
    identity: &str,
    decisions: &IndexMap<String, IndexMap<String, String>>,
    nodes: &IndexMap<String, DependencyNode>,
    memo: &mut HashMap<String, IndexMap<String, DependencyNode>>,
    visiting: &mut HashSet<String>,
) -> IndexMap<String, DependencyNode> {
    if let Some(cached) = memo.get(identity) {
        return cached.clone();
    }
    if !visiting.insert(identity.to_string()) {
        return IndexMap::new();
    }

    let mut result = IndexMap::new();
    if let Some(children) = decisions.get(identity) {
        let mut names: Vec<&String> = children.keys().collect();
        names.sort();
        for name in names {
            let child_identity = &children[name];
            if let Some(child_node) = nodes.get(child_identity) {
                let mut placed = child_node.clone_without_nested();
                placed.nested_dependencies = nested_map_for(child_identity, decisions, nodes, memo, visiting);
                result.insert(name.clone(), placed);
            }
        }
    }

    visiting.remove(identity);
    memo.insert(identity.to_string(), result.clone());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacm_resolver::{RequirementChoice, ResolveStats, Warning};

    fn v(s: &str) -> Version {
        pacm_semver::parse(s).expect("valid version")
    }

    fn node(name: &str, version: &str) -> DependencyNode {
        DependencyNode {
            name: name.to_string(),
            version: v(version),
            dependencies: IndexMap::new(),
            dev: false,
            optional: false,
            peer_dependencies: IndexMap::new(),
            bundled_dependencies: Vec::new(),
            has_bundled: false,
            nested_dependencies: IndexMap::new(),
            circular_to: Vec::new(),
            integrity: None,
            resolved: None,
            os: None,
            cpu: None,
            engines: IndexMap::new(),
        }
    }

    fn choice(range: &str, version: &str) -> RequirementChoice {
        RequirementChoice { range: range.to_string(), version: v(version) }
    }

    #[test]
    fn single_version_hoists_to_root() {
        let mut nodes = IndexMap::new();
        nodes.insert("a@1.0.0".to_string(), node("a", "1.0.0"));

        let mut requirements = IndexMap::new();
        let mut requesters = IndexMap::new();
        requesters.insert("ROOT".to_string(), choice("^1.0.0", "1.0.0"));
        requirements.insert("a".to_string(), requesters);

        let mut resolved_by_name = IndexMap::new();
        resolved_by_name.insert("a".to_string(), "a@1.0.0".to_string());

        let graph = ResolvedGraph {
            root_name: Some("root".to_string()),
            root_version: Some(v("1.0.0")),
            nodes,
            requirements,
            resolved_by_name,
            warnings: Vec::new(),
            stats: ResolveStats::default(),
        };

        let tree = hoist(&graph);
        assert_eq!(tree.resolved.get("a").map(|n| n.version.to_string()), Some("1.0.0".to_string()));
        assert!(tree.resolved["a"].nested_dependencies.is_empty());
    }

    #[test]
    fn majority_version_wins_root_and_minority_is_nested() {
        let mut nodes = IndexMap::new();
        nodes.insert("p@1.0.0".to_string(), node("p", "1.0.0"));
        nodes.insert("p@2.0.0".to_string(), node("p", "2.0.0"));
        nodes.insert("a@1.0.0".to_string(), node("a", "1.0.0"));
        nodes.insert("b@1.0.0".to_string(), node("b", "1.0.0"));
        nodes.insert("c@1.0.0".to_string(), node("c", "1.0.0"));

        let mut requirements = IndexMap::new();
        let mut p_requesters = IndexMap::new();
        p_requesters.insert("ROOT@ROOT".to_string(), choice("^1.0.0", "1.0.0"));
        p_requesters.insert("a@1.0.0".to_string(), choice("^1.0.0", "1.0.0"));
        p_requesters.insert("b@1.0.0".to_string(), choice("^2.0.0", "2.0.0"));
        requirements.insert("p".to_string(), p_requesters);

        let mut resolved_by_name = IndexMap::new();
        resolved_by_name.insert("p".to_string(), "p@1.0.0".to_string());
        resolved_by_name.insert("a".to_string(), "a@1.0.0".to_string());
        resolved_by_name.insert("b".to_string(), "b@1.0.0".to_string());

        let graph = ResolvedGraph {
            root_name: None,
            root_version: None,
            nodes,
            requirements,
            resolved_by_name,
            warnings: vec![Warning::CircularDependency { cycle: Vec::new() }],
            stats: ResolveStats { total_packages: 5, deduplicated_packages: 2, registry_fetches: 5, resolution_time_ms: None },
        };

        let tree = hoist(&graph);
        assert_eq!(tree.resolved["p"].version.to_string(), "1.0.0");
        assert!(tree.resolved["p"].nested_dependencies.is_empty());
        assert_eq!(tree.resolved["b"].nested_dependencies["p"].version.to_string(), "2.0.0");
        assert!(!tree.resolved.contains_key("c"));
    }

    #[test]
    fn bundled_dependency_forces_nesting_over_root_vote() {
        let mut owner = node("owner", "1.0.0");
        owner.bundled_dependencies = vec!["inner".to_string()];
        owner.has_bundled = true;

        let mut nodes = IndexMap::new();
        nodes.insert("owner@1.0.0".to_string(), owner);
        nodes.insert("inner@1.0.0".to_string(), node("inner", "1.0.0"));

        let mut requirements = IndexMap::new();
        let mut inner_requesters = IndexMap::new();
        inner_requesters.insert("owner@1.0.0".to_string(), choice("^1.0.0", "1.0.0"));
        requirements.insert("inner".to_string(), inner_requesters);

        let mut resolved_by_name = IndexMap::new();
        resolved_by_name.insert("owner".to_string(), "owner@1.0.0".to_string());
        resolved_by_name.insert("inner".to_string(), "inner@1.0.0".to_string());

        let graph = ResolvedGraph {
            root_name: None,
            root_version: None,
            nodes,
            requirements,
            resolved_by_name,
            warnings: Vec::new(),
            stats: ResolveStats::default(),
        };

        let tree = hoist(&graph);
        assert!(!tree.resolved.contains_key("inner"));
        assert_eq!(tree.resolved["owner"].nested_dependencies["inner"].version.to_string(), "1.0.0");
    }
}

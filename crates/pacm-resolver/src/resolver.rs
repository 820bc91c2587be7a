//! The resolution algorithm: turns a root manifest into a
//! [`ResolvedGraph`] by walking the dependency graph against a
//! [`RegistryPort`], bounded to [`pacm_constants::NESTED_RESOLVE_CONCURRENCY`]
//! concurrent fetches. The graph is handed to the hoister, which turns
//! it into the final `DependencyTree`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::try_join_all;
use indexmap::IndexMap;
use tokio::sync::{Mutex, OnceCell, Semaphore};

use pacm_constants::NESTED_RESOLVE_CONCURRENCY;
use pacm_error::{ErrorCode, NpmError};
use pacm_manifest::Manifest;
use pacm_registry::RegistryPort;
use pacm_semver::Version;

use crate::platform::is_platform_compatible_for;
use crate::types::{DependencyNode, RequirementChoice, ResolveStats, ResolvedGraph, Warning};

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub production: bool,
    pub auto_install_peers: bool,
    pub platform: Option<String>,
    pub arch: Option<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            production: false,
            auto_install_peers: false,
            platform: Some(crate::platform::get_current_os()),
            arch: Some(crate::platform::get_current_cpu()),
        }
    }
}

struct State<R: RegistryPort> {
    registry: Arc<R>,
    options: ResolveOptions,
    versions_cache: Mutex<HashMap<String, Arc<OnceCell<Vec<Version>>>>>,
    version_choice: Mutex<HashMap<(String, String), Version>>,
    info_cache: Mutex<HashMap<String, Arc<OnceCell<pacm_registry::ResolvedPackage>>>>,
    nodes: Mutex<HashMap<String, Arc<OnceCell<DependencyNode>>>>,
    requirements: Mutex<IndexMap<String, IndexMap<String, RequirementChoice>>>,
    resolved_by_name: Mutex<IndexMap<String, String>>,
    warnings: Mutex<Vec<Warning>>,
    /// `identity -> names of the other packages in a cycle that touched it`.
    /// The node itself is already cached by the time a cycle closing back
    /// onto it is detected, so this is patched onto the cached nodes once
    /// resolution finishes instead of being set inside `build_node`.
    circular_to: Mutex<HashMap<String, Vec<String>>>,
    fetch_count: AtomicU64,
    semaphore: Arc<Semaphore>,
}

/// Strips the trailing `@version` off a `name@version` identity. Safe
/// even for scoped names (`@scope/name@version`): versions never
/// contain `@`, so the last `@` is always the separator.
fn identity_name(identity: &str) -> &str {
    identity.rsplit_once('@').map_or(identity, |(name, _)| name)
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

impl<R: RegistryPort + 'static> State<R> {
    async fn versions_of(&self, name: &str) -> Result<Vec<Version>, NpmError> {
        let cell = {
            let mut cache = self.versions_cache.lock().await;
            cache.entry(name.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };
        let versions = cell
            .get_or_try_init(|| async {
                self.fetch_count.fetch_add(1, Ordering::Relaxed);
                self.registry.list_versions(name).await
            })
            .await?;
        Ok(versions.clone())
    }

    async fn manifest_of(&self, name: &str, version: &Version) -> Result<pacm_registry::ResolvedPackage, NpmError> {
        let key = format!("{name}@{version}");
        let cell = {
            let mut cache = self.info_cache.lock().await;
            cache.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };
        let info = cell
            .get_or_try_init(|| async {
                self.fetch_count.fetch_add(1, Ordering::Relaxed);
                self.registry.get_manifest(name, version).await
            })
            .await?;
        Ok(info.clone())
    }

    /// Resolve `(name, range)` to a concrete version. npm's exact-match
    /// shortcut: a fully specified version string that is also
    /// published wins over a `maxSatisfying` scan.
    async fn resolve_version(&self, name: &str, range: &str) -> Result<Version, NpmError> {
        let cache_key = (name.to_string(), range.to_string());
        if let Some(v) = self.version_choice.lock().await.get(&cache_key) {
            return Ok(v.clone());
        }

        let versions = self.versions_of(name).await?;

        let chosen = if let Some(exact) = pacm_semver::as_exact_version(range) {
            if versions.contains(&exact) { Some(exact) } else { None }
        } else {
            None
        };
        let chosen = match chosen {
            Some(v) => v,
            None => {
                let parsed_range = pacm_semver::parse_range(range)?;
                pacm_semver::max_satisfying(&versions, &parsed_range)
                    .cloned()
                    .ok_or_else(|| NpmError::resolution(name, range))?
            }
        };

        self.version_choice.lock().await.insert(cache_key, chosen.clone());
        Ok(chosen)
    }

    async fn record_requirement(&self, name: &str, requester: &str, range: &str, version: &Version) {
        let mut requirements = self.requirements.lock().await;
        requirements.entry(name.to_string()).or_default().insert(
            requester.to_string(),
            RequirementChoice { range: range.to_string(), version: version.clone() },
        );
    }

    async fn push_warning(&self, warning: Warning) {
        self.warnings.lock().await.push(warning);
    }

    async fn record_circular_to(&self, identity: &str, names: Vec<String>) {
        let mut map = self.circular_to.lock().await;
        let entry = map.entry(identity.to_string()).or_default();
        for name in names {
            if !entry.contains(&name) {
                entry.push(name);
            }
        }
    }
}

/// Resolve `(name, range)` against `registry` starting from `manifest`,
/// yielding an unhoisted, requirement-annotated [`ResolvedGraph`].
pub async fn resolve<R: RegistryPort + 'static>(
    manifest: &Manifest,
    registry: Arc<R>,
    options: ResolveOptions,
) -> Result<ResolvedGraph, NpmError> {
    let state = Arc::new(State {
        registry,
        options,
        versions_cache: Mutex::new(HashMap::new()),
        version_choice: Mutex::new(HashMap::new()),
        info_cache: Mutex::new(HashMap::new()),
        nodes: Mutex::new(HashMap::new()),
        requirements: Mutex::new(IndexMap::new()),
        resolved_by_name: Mutex::new(IndexMap::new()),
        warnings: Mutex::new(Vec::new()),
        circular_to: Mutex::new(HashMap::new()),
        fetch_count: AtomicU64::new(0),
        semaphore: Arc::new(Semaphore::new(NESTED_RESOLVE_CONCURRENCY)),
    });

    let mut root_entries: Vec<(String, String, bool)> = manifest
        .dependencies
        .iter()
        .map(|(n, r)| (n.clone(), r.clone(), false))
        .collect();
    if !state.options.production {
        root_entries.extend(manifest.dev_dependencies.iter().map(|(n, r)| (n.clone(), r.clone(), true)));
    }
    root_entries.sort_by(|a, b| a.0.cmp(&b.0));

    // Prefetch every root-level name's version list in parallel.
    let prefetch_names: Vec<String> = root_entries.iter().map(|(n, _, _)| n.clone()).collect();
    try_join_all(prefetch_names.iter().map(|name| {
        let state = state.clone();
        let name = name.clone();
        async move { state.versions_of(&name).await }
    }))
    .await?;

    try_join_all(root_entries.iter().map(|(name, range, dev)| {
        let state = state.clone();
        let name = name.clone();
        let range = range.clone();
        let dev = *dev;
        async move { resolve_package(&state, &name, &range, dev, false, "ROOT", Vec::new()).await }
    }))
    .await?;

    if state.options.auto_install_peers {
        install_missing_peers(&state).await?;
    }

    let circular_to = state.circular_to.lock().await.clone();

    let nodes_guard = state.nodes.lock().await;
    let mut nodes = IndexMap::new();
    let mut identities: Vec<&String> = nodes_guard.keys().collect();
    identities.sort();
    for identity in identities {
        if let Some(node) = nodes_guard[identity].get() {
            let mut node = node.clone();
            if let Some(touched_by) = circular_to.get(identity) {
                node.circular_to = touched_by.clone();
            }
            nodes.insert(identity.clone(), node);
        }
    }
    let total_packages = nodes.len();
    drop(nodes_guard);

    let resolved_by_name = state.resolved_by_name.lock().await.clone();

    let requirements = state.requirements.lock().await.clone();
    let deduplicated_packages: usize =
        requirements.values().map(|requesters| requesters.len().saturating_sub(1)).sum();

    let mut warnings = state.warnings.lock().await.clone();
    warnings.sort_by_key(|w| format!("{w:?}"));

    Ok(ResolvedGraph {
        root_name: manifest.name.clone(),
        root_version: manifest.version.as_deref().and_then(|v| pacm_semver::parse(v).ok()),
        nodes,
        requirements,
        resolved_by_name,
        warnings,
        stats: ResolveStats {
            total_packages,
            deduplicated_packages,
            registry_fetches: state.fetch_count.load(Ordering::Relaxed),
            resolution_time_ms: None,
        },
    })
}

#[allow(clippy::too_many_lines)]
fn resolve_package<'a, R: RegistryPort + 'static>(
    state: &'a Arc<State<R>>,
    name: &'a str,
    range: &'a str,
    dev: bool,
    optional: bool,
    requester: &'a str,
    ancestors: Vec<String>,
) -> BoxFuture<'a, Result<(), NpmError>> {
    Box::pin(async move {
        let version = match state.resolve_version(name, range).await {
            Ok(v) => v,
            Err(err) if optional => {
                state
                    .push_warning(Warning::OptionalSkipped {
                        package: name.to_string(),
                        version: range.to_string(),
                        reason: err.message.clone(),
                    })
                    .await;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        state.record_requirement(name, requester, range, &version).await;

        let identity = format!("{name}@{version}");

        if ancestors.contains(&identity) {
            let cycle_start = ancestors.iter().position(|a| a == &identity).unwrap_or(0);
            let cycle_names: Vec<String> =
                ancestors[cycle_start..].iter().map(|id| identity_name(id).to_string()).collect();
            state.push_warning(Warning::CircularDependency { cycle: cycle_names.clone() }).await;
            let circular_to: Vec<String> = cycle_names.into_iter().filter(|n| n != name).collect();
            state.record_circular_to(&identity, circular_to).await;
            return Ok(());
        }

        let cell = {
            let mut nodes = state.nodes.lock().await;
            nodes.entry(identity.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let already_built = cell.initialized();

        let _permit = state
            .semaphore
            .acquire()
            .await
            .map_err(|e| NpmError::new(ErrorCode::Install, format!("resolver semaphore closed: {e}")))?;

        let mut child_ancestors = ancestors.clone();
        child_ancestors.push(identity.clone());

        let build_result = cell
            .get_or_try_init(|| build_node(state, name, &version, dev, optional, requester))
            .await;

        let node = match build_result {
            Ok(node) => node.clone(),
            Err(err) if optional => {
                state
                    .push_warning(Warning::OptionalSkipped {
                        package: name.to_string(),
                        version: version.to_string(),
                        reason: err.message.clone(),
                    })
                    .await;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        state.resolved_by_name.lock().await.insert(name.to_string(), identity.clone());

        if already_built {
            return Ok(());
        }

        let bundled: std::collections::HashSet<&str> =
            node.bundled_dependencies.iter().map(String::as_str).collect();

        let mut children: Vec<(String, String, bool, bool)> = node
            .dependencies
            .iter()
            .filter(|(dep_name, _)| !bundled.contains(dep_name.as_str()))
            .map(|(dep_name, dep_range)| (dep_name.clone(), dep_range.clone(), node.dev, false))
            .collect();

        // The registry-shaped manifest (cached, so this is free) carries
        // `optionalDependencies` separately from `dependencies` — those
        // names resolve with `optional=true` instead of aborting the
        // whole subtree on failure.
        let info = state.manifest_of(name, &version).await?;
        for (dep_name, dep_range) in &info.optional_dependencies {
            if !bundled.contains(dep_name.as_str()) {
                children.push((dep_name.clone(), dep_range.clone(), node.dev, true));
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        try_join_all(children.iter().map(|(dep_name, dep_range, dep_dev, dep_optional)| {
            resolve_package(state, dep_name, dep_range, *dep_dev, *dep_optional, &identity, child_ancestors.clone())
        }))
        .await?;

        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
async fn build_node<R: RegistryPort + 'static>(
    state: &Arc<State<R>>,
    name: &str,
    version: &Version,
    dev: bool,
    optional: bool,
    requester: &str,
) -> Result<DependencyNode, NpmError> {
    let info = state.manifest_of(name, version).await?;

    if optional {
        if let Some(os_list) = &info.os {
            let platform = state.options.platform.as_deref().unwrap_or("linux");
            let arch = state.options.arch.as_deref().unwrap_or("x64");
            if !is_platform_compatible_for(&Some(os_list.clone()), &None, platform, arch) {
                return Err(NpmError::new(
                    ErrorCode::Validation,
                    format!("{name}@{version} is incompatible with platform {platform}"),
                ));
            }
        }
    }

    if let Some(deprecated) = &info.deprecated {
        state
            .push_warning(Warning::Deprecated {
                package: name.to_string(),
                version: version.to_string(),
                message: deprecated.clone(),
            })
            .await;
    }

    for (peer_name, peer_range) in &info.peer_dependencies {
        let known_version = {
            let requirements = state.requirements.lock().await;
            requirements.get(peer_name).and_then(|requesters| requesters.values().next().map(|r| r.version.clone()))
        };
        match known_version {
            None => {
                state
                    .push_warning(Warning::PeerMissing {
                        package: format!("{name}@{version}"),
                        peer: peer_name.clone(),
                        required: peer_range.clone(),
                    })
                    .await;
            }
            Some(found) => {
                let satisfies = pacm_semver::parse_range(peer_range)
                    .map(|r| pacm_semver::satisfies(&found, &r))
                    .unwrap_or(false);
                if !satisfies {
                    state
                        .push_warning(Warning::PeerIncompatible {
                            package: format!("{name}@{version}"),
                            peer: peer_name.clone(),
                            required: peer_range.clone(),
                            found: found.to_string(),
                        })
                        .await;
                }
            }
        }
    }

    let _ = requester;

    let has_bundled = !info.bundled_dependencies.is_empty();
    let mut dependencies: IndexMap<String, String> = info.dependencies.into_iter().collect();
    if dev {
        dependencies.extend(info.dev_dependencies);
    }

    Ok(DependencyNode {
        name: name.to_string(),
        version: version.clone(),
        dependencies,
        dev,
        optional,
        peer_dependencies: info.peer_dependencies.into_iter().collect(),
        bundled_dependencies: info.bundled_dependencies,
        has_bundled,
        nested_dependencies: IndexMap::new(),
        // Patched onto the cached node in `resolve()` once a cycle back
        // onto this identity is found; unknown at build time.
        circular_to: Vec::new(),
        integrity: info.dist.integrity,
        resolved: info.dist.tarball,
        os: info.os,
        cpu: info.cpu,
        engines: info.engines.into_iter().collect(),
    })
}

async fn install_missing_peers<R: RegistryPort + 'static>(state: &Arc<State<R>>) -> Result<(), NpmError> {
    let missing: Vec<(String, String, String)> = {
        let warnings = state.warnings.lock().await;
        warnings
            .iter()
            .filter_map(|w| match w {
                Warning::PeerMissing { package, peer, required } => {
                    Some((package.clone(), peer.clone(), required.clone()))
                }
                _ => None,
            })
            .collect()
    };

    for (package, peer, required) in missing {
        if resolve_package(state, &peer, &required, false, true, &package, Vec::new()).await.is_ok() {
            state.warnings.lock().await.retain(|w| {
                !matches!(w, Warning::PeerMissing { peer: p, .. } if p == &peer)
            });
        }
    }

    Ok(())
}

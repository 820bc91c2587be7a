//! The abstract registry port the resolver depends on: three
//! operations, safe to call concurrently. No concrete HTTP transport
//! lives here — that's an external collaborator the host supplies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use pacm_error::{ErrorCode, NpmError};
use pacm_semver::Version;

/// Dist metadata for a published version: where to fetch it and how to
/// verify it.
#[derive(Debug, Clone, Default)]
pub struct Dist {
    pub tarball: Option<String>,
    pub shasum: Option<String>,
    pub integrity: Option<String>,
}

/// A registry-shaped record for one `name@version`.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Version,
    pub dependencies: HashMap<String, String>,
    pub dev_dependencies: HashMap<String, String>,
    pub peer_dependencies: HashMap<String, String>,
    pub optional_dependencies: HashMap<String, String>,
    pub bundled_dependencies: Vec<String>,
    pub os: Option<Vec<String>>,
    pub cpu: Option<Vec<String>>,
    pub engines: HashMap<String, String>,
    pub deprecated: Option<String>,
    pub dist: Dist,
}

impl ResolvedPackage {
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies: HashMap::new(),
            dev_dependencies: HashMap::new(),
            peer_dependencies: HashMap::new(),
            optional_dependencies: HashMap::new(),
            bundled_dependencies: Vec::new(),
            os: None,
            cpu: None,
            engines: HashMap::new(),
            deprecated: None,
            dist: Dist::default(),
        }
    }
}

/// The resolver's sole dependency on the outside world. Implementations
/// must tolerate concurrent calls for the same name/version — the
/// resolver dedups in-flight fetches on its side, but a naive
/// implementation (e.g. a plain HTTP client) is still safe to call this
/// way.
pub trait RegistryPort: Send + Sync {
    /// All published versions, order irrelevant. `ENOTFOUND` if the
    /// name doesn't exist, `EFETCH` on transport failure.
    fn list_versions(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Version>, NpmError>> + Send;

    /// The registry-shaped manifest for one exact version.
    fn get_manifest(
        &self,
        name: &str,
        version: &Version,
    ) -> impl std::future::Future<Output = Result<ResolvedPackage, NpmError>> + Send;

    /// The tarball bytes for one exact version. Only needed for
    /// extraction, not for resolution itself.
    fn get_tarball(
        &self,
        name: &str,
        version: &Version,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, NpmError>> + Send;
}

/// Is `name` a syntactically valid package name: no `..`, no `%`, and
/// scoped names (`@scope/name`) have exactly one slash?
#[must_use]
pub fn is_valid_package_name(name: &str) -> bool {
    if name.is_empty() || name.contains("..") || name.contains('%') {
        return false;
    }
    if let Some(rest) = name.strip_prefix('@') {
        let Some((scope, pkg)) = rest.split_once('/') else {
            return false;
        };
        !scope.is_empty() && !pkg.is_empty() && !pkg.contains('/')
    } else {
        !name.contains('/')
    }
}

#[derive(Debug, Clone, Default)]
struct PackageRecord {
    versions: HashMap<Version, ResolvedPackage>,
    tarballs: HashMap<Version, Vec<u8>>,
}

/// An in-memory reference [`RegistryPort`], used by tests and by any
/// caller that wants a fully offline resolution.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    packages: Arc<RwLock<HashMap<String, PackageRecord>>>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish one version, making it visible to subsequent port calls.
    pub async fn publish(&self, package: ResolvedPackage, tarball: Option<Vec<u8>>) {
        let mut packages = self.packages.write().await;
        let record = packages.entry(package.name.clone()).or_default();
        if let Some(bytes) = tarball {
            record.tarballs.insert(package.version.clone(), bytes);
        }
        record.versions.insert(package.version.clone(), package);
    }
}

impl RegistryPort for MemoryRegistry {
    async fn list_versions(&self, name: &str) -> Result<Vec<Version>, NpmError> {
        if !is_valid_package_name(name) {
            return Err(NpmError::new(ErrorCode::Parse, format!("invalid package name '{name}'")));
        }
        let packages = self.packages.read().await;
        match packages.get(name) {
            Some(record) => Ok(record.versions.keys().cloned().collect()),
            None => Err(NpmError::not_found(name)),
        }
    }

    async fn get_manifest(&self, name: &str, version: &Version) -> Result<ResolvedPackage, NpmError> {
        let packages = self.packages.read().await;
        packages
            .get(name)
            .and_then(|record| record.versions.get(version))
            .cloned()
            .ok_or_else(|| NpmError::not_found(name).with_context("version", version.to_string()))
    }

    async fn get_tarball(&self, name: &str, version: &Version) -> Result<Vec<u8>, NpmError> {
        let packages = self.packages.read().await;
        packages
            .get(name)
            .and_then(|record| record.tarballs.get(version))
            .cloned()
            .ok_or_else(|| NpmError::not_found(name).with_context("version", version.to_string()))
    }
}

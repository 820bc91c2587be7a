//! Package manifest validation and normalization.
//!
//! This is a pure validated core type: no filesystem IO. Parsing a
//! `package.json` buffer and checking it are separate steps so callers
//! can reuse the validator against manifests built in memory.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use pacm_error::NpmError;
use pacm_semver::Range;

/// `bin` is either a single string (package name implies the command
/// name) or a map of command name to script path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bin {
    Single(String),
    Map(IndexMap<String, String>),
}

/// The `type` field governs whether `.js` files are treated as ESM or
/// CommonJS. Any other value is a normalization warning, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Commonjs,
    Module,
}

/// The raw, untyped-at-the-edges manifest shape: dynamically shaped
/// entries modeled as tagged records with optional fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, String>,
    #[serde(rename = "devDependencies", default, skip_serializing_if = "IndexMap::is_empty")]
    pub dev_dependencies: IndexMap<String, String>,
    #[serde(rename = "peerDependencies", default, skip_serializing_if = "IndexMap::is_empty")]
    pub peer_dependencies: IndexMap<String, String>,
    #[serde(rename = "optionalDependencies", default, skip_serializing_if = "IndexMap::is_empty")]
    pub optional_dependencies: IndexMap<String, String>,
    #[serde(rename = "bundledDependencies", default, skip_serializing_if = "Vec::is_empty")]
    pub bundled_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub engines: IndexMap<String, String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<Bin>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub scripts: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(flatten)]
    pub other: IndexMap<String, serde_json::Value>,
}

impl Manifest {
    /// Parse a `package.json` buffer into a manifest, deferring
    /// semantic checks to [`validate`].
    pub fn from_json(bytes: &[u8]) -> Result<Self, NpmError> {
        serde_json::from_slice(bytes).map_err(|e| NpmError::parse(format!("malformed manifest: {e}")))
    }

    pub fn to_json_pretty(&self) -> Result<String, NpmError> {
        serde_json::to_string_pretty(self).map_err(|e| NpmError::parse(format!("cannot serialize manifest: {e}")))
    }

    /// All runtime + dev dependency ranges, runtime ones winning on a
    /// name collision (mirrors npm's own resolution precedence).
    #[must_use]
    pub fn all_dependencies(&self) -> IndexMap<String, String> {
        let mut all = self.dev_dependencies.clone();
        all.extend(self.dependencies.clone());
        all
    }
}

/// A non-fatal manifest issue discovered during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestWarning {
    UnknownModuleType { value: String },
    InvalidEngineRange { engine: String, range: String },
    InvalidDependencyRange { name: String, range: String },
}

impl std::fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModuleType { value } => write!(f, "unknown \"type\" field: {value}"),
            Self::InvalidEngineRange { engine, range } => {
                write!(f, "invalid engines.{engine} range: {range}")
            }
            Self::InvalidDependencyRange { name, range } => {
                write!(f, "invalid dependency range for {name}: {range}")
            }
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 214 || name.contains("..") || name.contains('%') {
        return false;
    }
    if let Some(rest) = name.strip_prefix('@') {
        match rest.split_once('/') {
            Some((scope, pkg)) => !scope.is_empty() && !pkg.is_empty() && !pkg.contains('/'),
            None => false,
        }
    } else {
        !name.starts_with('.') && !name.starts_with('_') && !name.contains('/') && name.chars().all(|c| !c.is_whitespace() && !c.is_uppercase())
    }
}

/// Validate and normalize a manifest. Fails `EVALIDATION` when `name`
/// or `version` is missing or malformed; everything else that's
/// off-spec becomes a discoverable warning instead of a hard failure.
pub fn validate(manifest: &Manifest) -> Result<Vec<ManifestWarning>, NpmError> {
    let name = manifest
        .name
        .as_deref()
        .ok_or_else(|| NpmError::new(pacm_error::ErrorCode::Validation, "manifest is missing \"name\""))?;
    if !is_valid_name(name) {
        return Err(NpmError::new(pacm_error::ErrorCode::Validation, format!("invalid package name: {name}"))
            .with_context("package", name));
    }

    let version = manifest
        .version
        .as_deref()
        .ok_or_else(|| NpmError::new(pacm_error::ErrorCode::Validation, "manifest is missing \"version\""))?;
    pacm_semver::parse(version).map_err(|_| {
        NpmError::new(pacm_error::ErrorCode::Validation, format!("invalid version: {version}"))
            .with_context("package", name)
            .with_context("version", version)
    })?;

    let mut warnings = Vec::new();

    if let Some(ty) = &manifest.module_type {
        if ty != "commonjs" && ty != "module" {
            warnings.push(ManifestWarning::UnknownModuleType { value: ty.clone() });
        }
    }

    for (engine, range) in &manifest.engines {
        if pacm_semver::parse_range(range).is_err() {
            warnings.push(ManifestWarning::InvalidEngineRange {
                engine: engine.clone(),
                range: range.clone(),
            });
        }
    }

    for (dep_name, range) in manifest
        .dependencies
        .iter()
        .chain(manifest.dev_dependencies.iter())
        .chain(manifest.peer_dependencies.iter())
        .chain(manifest.optional_dependencies.iter())
    {
        if is_exact_or_range(range).is_none() {
            warnings.push(ManifestWarning::InvalidDependencyRange {
                name: dep_name.clone(),
                range: range.clone(),
            });
        }
    }

    Ok(warnings)
}

fn is_exact_or_range(spec: &str) -> Option<Range> {
    // Dependency specs can be git/tag/file references too; we only
    // flag ones that look like semver ranges and fail to parse as one.
    if spec.contains(':') || spec.starts_with('.') || spec.starts_with('/') {
        return None;
    }
    pacm_semver::parse_range(spec).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str, version: &str) -> Manifest {
        Manifest {
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            ..Manifest::default()
        }
    }

    #[test]
    fn rejects_missing_name() {
        let m = Manifest { version: Some("1.0.0".to_string()), ..Manifest::default() };
        assert!(validate(&m).is_err());
    }

    #[test]
    fn rejects_missing_version() {
        let m = Manifest { name: Some("demo".to_string()), ..Manifest::default() };
        assert!(validate(&m).is_err());
    }

    #[test]
    fn accepts_minimal_valid_manifest() {
        let m = manifest("demo", "1.0.0");
        assert_eq!(validate(&m).expect("valid"), vec![]);
    }

    #[test]
    fn accepts_scoped_name() {
        let m = manifest("@scope/demo", "1.0.0");
        assert!(validate(&m).is_ok());
    }

    #[test]
    fn rejects_invalid_version() {
        let m = manifest("demo", "not-a-version");
        assert!(validate(&m).is_err());
    }

    #[test]
    fn warns_on_unknown_module_type() {
        let mut m = manifest("demo", "1.0.0");
        m.module_type = Some("weird".to_string());
        let warnings = validate(&m).expect("valid");
        assert_eq!(warnings, vec![ManifestWarning::UnknownModuleType { value: "weird".to_string() }]);
    }

    #[test]
    fn warns_on_invalid_engine_range() {
        let mut m = manifest("demo", "1.0.0");
        m.engines.insert("node".to_string(), "not a range".to_string());
        let warnings = validate(&m).expect("valid");
        assert!(matches!(warnings[0], ManifestWarning::InvalidEngineRange { .. }));
    }

    #[test]
    fn warns_on_invalid_dependency_range() {
        let mut m = manifest("demo", "1.0.0");
        m.dependencies.insert("lodash".to_string(), "not a range".to_string());
        let warnings = validate(&m).expect("valid");
        assert!(matches!(warnings[0], ManifestWarning::InvalidDependencyRange { .. }));
    }

    #[test]
    fn allows_non_semver_dependency_specs() {
        let mut m = manifest("demo", "1.0.0");
        m.dependencies.insert("local".to_string(), "file:../local".to_string());
        assert_eq!(validate(&m).expect("valid"), vec![]);
    }

    #[test]
    fn all_dependencies_prefers_runtime_on_collision() {
        let mut m = manifest("demo", "1.0.0");
        m.dev_dependencies.insert("shared".to_string(), "^1.0.0".to_string());
        m.dependencies.insert("shared".to_string(), "^2.0.0".to_string());
        let all = m.all_dependencies();
        assert_eq!(all.get("shared").map(String::as_str), Some("^2.0.0"));
    }
}

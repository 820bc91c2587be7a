//! Core resolved record types: `DependencyNode`/`DependencyTree`.
//! These are also the types the hoister fills in and the lockfile codec
//! serializes — the one data shape every downstream consumer reads.

use indexmap::IndexMap;

use pacm_semver::Version;

/// A resolved package. Identity is `name@version`; two nodes with the
/// same identity are structurally identical for hoisting purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyNode {
    pub name: String,
    pub version: Version,
    pub dependencies: IndexMap<String, String>,
    pub dev: bool,
    pub optional: bool,
    pub peer_dependencies: IndexMap<String, String>,
    pub bundled_dependencies: Vec<String>,
    pub has_bundled: bool,
    /// Populated only after hoisting; empty on the resolver's raw output.
    pub nested_dependencies: IndexMap<String, DependencyNode>,
    pub circular_to: Vec<String>,
    pub integrity: Option<String>,
    pub resolved: Option<String>,
    pub os: Option<Vec<String>>,
    pub cpu: Option<Vec<String>>,
    pub engines: IndexMap<String, String>,
}

impl DependencyNode {
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// A shallow clone that drops `nested_dependencies` — used when
    /// placing a node at a new spot in the hoisted tree.
    #[must_use]
    pub fn clone_without_nested(&self) -> Self {
        Self { nested_dependencies: IndexMap::new(), ..self.clone() }
    }
}

/// A non-fatal condition surfaced during resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    PeerMissing { package: String, peer: String, required: String },
    PeerIncompatible { package: String, peer: String, required: String, found: String },
    OptionalSkipped { package: String, version: String, reason: String },
    CircularDependency { cycle: Vec<String> },
    Deprecated { package: String, version: String, message: String },
    UnsupportedEngine { package: String, engine: String, required: String, actual: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub total_packages: usize,
    pub deduplicated_packages: usize,
    pub registry_fetches: u64,
    pub resolution_time_ms: Option<u64>,
}

/// One requester's pinned choice for a given package name — the
/// hoister's raw material for majority-vote root selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementChoice {
    pub range: String,
    pub version: Version,
}

/// The resolver's raw output: every resolved node by identity, plus
/// who required which version of what — handed to the hoister, which
/// turns it into the per-name winners and nesting decisions below.
/// This is *not* yet the hoisted tree — nesting decisions haven't been
/// made.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub root_name: Option<String>,
    pub root_version: Option<Version>,
    /// Every resolved node, keyed by `name@version` identity.
    pub nodes: IndexMap<String, DependencyNode>,
    /// `name -> requester -> {range, version}`.
    pub requirements: IndexMap<String, IndexMap<String, RequirementChoice>>,
    /// Each name's last-resolved identity — the hoister's fallback for
    /// root-only names absent from `requirements`.
    pub resolved_by_name: IndexMap<String, String>,
    pub warnings: Vec<Warning>,
    pub stats: ResolveStats,
}

/// The hoisted tree: the data shape every downstream consumer (the
/// lockfile codec, the extractor) reads. `resolved` holds at most
/// one entry per package name; alternate versions live in some
/// ancestor's `nested_dependencies`.
#[derive(Debug, Clone, Default)]
pub struct DependencyTree {
    pub name: Option<String>,
    pub version: Option<Version>,
    pub resolved: IndexMap<String, DependencyNode>,
    pub warnings: Vec<Warning>,
    pub stats: ResolveStats,
}

//! Execution-tier classifier: a side oracle the host
//! consults to decide whether a package's code can run in an isolate,
//! needs polyfilled built-ins, or needs the real runtime.

use std::collections::HashMap;

use pacm_manifest::Manifest;
use tokio::sync::Mutex;

/// How much of the host runtime a package's code needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// Pure cross-platform code, no host-runtime built-ins needed.
    One = 1,
    /// Needs polyfillable built-ins from a fixed allow-set.
    Two = 2,
    /// Needs unpolyfillable built-ins or ships native bindings.
    Three = 3,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub tier: Tier,
    pub reason: String,
    pub can_run_in_isolate: bool,
    pub required_builtins: Vec<String>,
    pub requires_native: bool,
    pub confidence: f64,
}

/// Known cross-platform packages that need no host built-ins at all.
const KNOWN_TIER_1: &[&str] = &["lodash", "chalk", "semver", "yargs-parser", "is-core-module", "picocolors"];

/// Packages known to ship native bindings or unpolyfillable built-in use.
const KNOWN_TIER_3: &[&str] =
    &["bcrypt", "sqlite3", "fsevents", "node-sass", "sharp", "better-sqlite3", "canvas", "grpc"];

/// `devDependencies` that signal a native-addon build toolchain.
const NATIVE_TOOLING_DEPS: &[&str] = &["node-gyp", "node-addon-api", "prebuild-install", "node-pre-gyp", "cmake-js"];

/// Substrings of an npm script body that signal a native build step.
const NATIVE_BUILD_SCRIPT_PATTERNS: &[&str] = &["node-gyp rebuild", "prebuild-install", "node-pre-gyp", "cmake-js"];

/// Built-ins with a well-known userland polyfill.
const POLYFILLABLE_BUILTINS: &[&str] =
    &["fs", "path", "crypto", "http", "https", "events", "stream", "buffer", "util", "os", "url", "querystring"];

/// Built-ins with no sandboxable equivalent.
const UNPOLYFILLABLE_BUILTINS: &[&str] = &["child_process", "vm", "net", "tls", "worker_threads", "dgram", "cluster", "dns"];

fn has_native_signals(manifest: &Manifest) -> bool {
    if manifest.other.get("gypfile").and_then(serde_json::Value::as_bool) == Some(true) {
        return true;
    }
    let files_has_binding_gyp = manifest
        .other
        .get("files")
        .and_then(serde_json::Value::as_array)
        .is_some_and(|files| files.iter().any(|f| f.as_str() == Some("binding.gyp")));
    if files_has_binding_gyp {
        return true;
    }
    let has_native_dep = manifest
        .dependencies
        .keys()
        .chain(manifest.dev_dependencies.keys())
        .any(|dep| NATIVE_TOOLING_DEPS.contains(&dep.as_str()));
    if has_native_dep {
        return true;
    }
    manifest
        .scripts
        .values()
        .any(|script| NATIVE_BUILD_SCRIPT_PATTERNS.iter().any(|pattern| script.contains(pattern)))
}

fn scan_builtins<'a>(manifest: &'a Manifest, allow_set: &'static [&'static str]) -> Vec<&'a str> {
    let mut found: Vec<&str> = allow_set
        .iter()
        .filter(|builtin| manifest.dependencies.contains_key(**builtin) || manifest.scripts.values().any(|s| s.contains(*builtin)))
        .copied()
        .collect();
    found.sort_unstable();
    found
}

fn classify_from_manifest(name: &str, manifest: &Manifest) -> Classification {
    if has_native_signals(manifest) {
        return Classification {
            tier: Tier::Three,
            reason: format!("{name} carries native-addon build signals"),
            can_run_in_isolate: false,
            required_builtins: Vec::new(),
            requires_native: true,
            confidence: 0.8,
        };
    }

    let unpolyfillable = scan_builtins(manifest, UNPOLYFILLABLE_BUILTINS);
    if !unpolyfillable.is_empty() {
        return Classification {
            tier: Tier::Three,
            reason: format!("{name} references unpolyfillable built-ins"),
            can_run_in_isolate: false,
            required_builtins: unpolyfillable.into_iter().map(str::to_string).collect(),
            requires_native: false,
            confidence: 0.7,
        };
    }

    let polyfillable = scan_builtins(manifest, POLYFILLABLE_BUILTINS);
    if !polyfillable.is_empty() {
        return Classification {
            tier: Tier::Two,
            reason: format!("{name} references polyfillable built-ins"),
            can_run_in_isolate: true,
            required_builtins: polyfillable.into_iter().map(str::to_string).collect(),
            requires_native: false,
            confidence: 0.6,
        };
    }

    Classification {
        tier: Tier::One,
        reason: format!("{name} shows no native or built-in signals in its manifest"),
        can_run_in_isolate: true,
        required_builtins: Vec::new(),
        requires_native: false,
        confidence: 0.5,
    }
}

fn classify_uncached(name: &str, manifest: Option<&Manifest>) -> Classification {
    let lower = name.to_ascii_lowercase();

    if KNOWN_TIER_3.contains(&lower.as_str()) {
        return Classification {
            tier: Tier::Three,
            reason: format!("{name} is a known native-binding package"),
            can_run_in_isolate: false,
            required_builtins: Vec::new(),
            requires_native: true,
            confidence: 0.95,
        };
    }

    if KNOWN_TIER_1.contains(&lower.as_str()) {
        return Classification {
            tier: Tier::One,
            reason: format!("{name} is a known pure cross-platform package"),
            can_run_in_isolate: true,
            required_builtins: Vec::new(),
            requires_native: false,
            confidence: 0.95,
        };
    }

    match manifest {
        Some(manifest) => classify_from_manifest(name, manifest),
        None => Classification {
            tier: Tier::Three,
            reason: format!("no manifest available for {name}; defaulting to the conservative tier"),
            can_run_in_isolate: false,
            required_builtins: Vec::new(),
            requires_native: false,
            confidence: 0.2,
        },
    }
}

fn memo_key(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{name}@{version}"),
        None => name.to_string(),
    }
}

/// Memoizes classifications by `name@version` (or bare `name`).
#[derive(Debug, Default)]
pub struct Classifier {
    cache: Mutex<HashMap<String, Classification>>,
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self { cache: Mutex::new(HashMap::new()) }
    }

    pub async fn classify(&self, name: &str, version: Option<&str>, manifest: Option<&Manifest>) -> Classification {
        let key = memo_key(name, version);
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(&key) {
            return cached.clone();
        }
        let result = classify_uncached(name, manifest);
        cache.insert(key, result.clone());
        result
    }
}

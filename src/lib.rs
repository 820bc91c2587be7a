//! Facade crate: re-exports the public surface of the workspace so a
//! caller can depend on `pacm` alone instead of each `pacm-*` crate.

pub use pacm_classifier::{Classification, Classifier, Tier};
pub use pacm_codec::{
    Algorithm, EntryType, ExtractOptions, PackEntry, SriComponent, TarEntry, gzip_compress, gzip_decompress,
    integrity_calculate, integrity_verify, is_gzip, pack_tarball, tar_extract, tar_pack, unpack_tarball,
};
pub use pacm_error::{ContextValue, ErrorCode, NpmError, is_npm_error, wrap};
pub use pacm_extract::{ExtractInput, FileStat, MemoryFs, VirtualFs, extract, pack_contents, pack_vfs};
pub use pacm_hoister::hoist;
pub use pacm_lock::{
    LockDiff, LockDiffSummary, LockFile, LockFileEntry, LockValidation, LockWarning, diff, generate, parse as parse_lock,
    validate,
};
pub use pacm_manifest::{Bin, Manifest, ManifestWarning, ModuleType, validate as validate_manifest};
pub use pacm_registry::{Dist, MemoryRegistry, RegistryPort, ResolvedPackage, is_valid_package_name};
pub use pacm_resolver::{
    DependencyNode, DependencyTree, RequirementChoice, ResolveOptions, ResolveStats, ResolvedGraph, Warning,
    get_current_cpu, get_current_os, is_platform_compatible, is_platform_compatible_for, resolve,
};
pub use pacm_semver::{Clause, Comparator, Range, Version, as_exact_version, compare, max_satisfying, min_satisfying, parse, parse_range, satisfies};

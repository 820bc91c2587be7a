pub const USER_AGENT: &str = "pacm/0.1.0";
pub const MAX_ATTEMPTS: u32 = 4;

/// Bounded fan-out for a single package's nested dependency resolution
/// (target: 16). Root-level dependencies resolve with
/// unbounded parallelism and are not gated by this constant.
pub const NESTED_RESOLVE_CONCURRENCY: usize = 16;

/// 512-byte tar block size (USTAR / GNU / PAX all share it).
pub const TAR_BLOCK_SIZE: usize = 512;

/// Largest size representable in a 12-byte octal tar `size` field
/// without falling back to GNU base-256 encoding: `8^11 - 1`.
pub const TAR_MAX_OCTAL_SIZE: u64 = 8_589_934_591;

pub const POPULAR_PACKAGES: &[&str] = &[
    "react",
    "vue",
    "angular",
    "express",
    "lodash",
    "axios",
    "typescript",
    "webpack",
    "babel-core",
    "eslint",
    "prettier",
    "jest",
    "mocha",
    "chai",
    "moment",
    "dotenv",
    "cors",
    "helmet",
    "bcrypt",
    "jsonwebtoken",
];

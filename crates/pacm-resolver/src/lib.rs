mod platform;
mod resolver;
mod types;

pub use platform::{get_current_cpu, get_current_os, is_platform_compatible, is_platform_compatible_for};
pub use resolver::{ResolveOptions, resolve};
pub use types::{
    DependencyNode, DependencyTree, RequirementChoice, ResolveStats, ResolvedGraph, Warning,
};

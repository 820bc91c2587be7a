pub mod path_utils;
pub mod version_utils;

pub use path_utils::*;
pub use version_utils::*;

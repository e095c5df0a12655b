mod expand_and_resolve_path;
mod find_in_subdir;

pub use expand_and_resolve_path::expand_and_resolve_path;
pub use find_in_subdir::find_in_subdir;

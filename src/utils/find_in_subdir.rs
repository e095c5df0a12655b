use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::runtime::Error;

/// Find a file matching `<root>/*<dir_suffix>/*<file_infix>*`.
/// The first match in sorted order is returned
pub fn find_in_subdir<P: AsRef<Path>>(
    root: P,
    dir_suffix: &str,
    file_infix: &str,
) -> Result<PathBuf, Error> {
    let root = root.as_ref();
    let pattern = format!("{}/*{}/*{}*", root.display(), dir_suffix, file_infix);

    if !root.is_dir() {
        return Err(Error::file_not_found(root));
    }

    let mut hits: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let parent_matches = e
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().ends_with(dir_suffix))
                .unwrap_or(false);
            parent_matches && e.file_name().to_string_lossy().contains(file_infix)
        })
        .map(|e| e.into_path())
        .collect();

    if hits.is_empty() {
        return Err(Error::file_not_found_with_suggestion(
            pattern.clone(),
            format!("make sure a file matching {} exists", pattern),
        ));
    }
    hits.sort();
    Ok(hits.swap_remove(0))
}

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

/// Absolute location of `path`, following symlinks where the file or its
/// directory already exists. Paths that do not exist yet are made absolute
/// against the working directory with `.` components dropped.
pub fn resolve_location(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    if let Some(name) = path.file_name() {
        if let Ok(dir) = fs::canonicalize(parent_dir(path)) {
            return dir.join(name);
        }
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

pub fn same_location(a: &Path, b: &Path) -> bool {
    resolve_location(a) == resolve_location(b)
}

/// Directory containing `path`; `.` for a bare file name.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

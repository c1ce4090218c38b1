//! Service path arithmetic for the working directory.
//!
//! All paths handled here are absolute service paths. Directory paths always
//! end with `/`; `..` never climbs above the root.

/// Collapse `.`, `..` and empty segments.
fn segments(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Normalize a directory path: leading and trailing `/`, no dot segments.
pub fn normalize_dir(path: &str) -> String {
    let segments = segments(path);
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

/// Resolve `path` against `cwd`: absolute paths replace it, relative ones extend it.
pub fn resolve_dir(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        normalize_dir(path)
    } else {
        normalize_dir(&format!("{cwd}/{path}"))
    }
}

/// Path of the entry `name` inside directory `dir`.
///
/// An absolute `name` ignores `dir`. An empty name yields `dir` itself.
pub fn join(dir: &str, name: &str) -> String {
    let combined = if name.starts_with('/') {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    };
    let segments = segments(&combined);
    if segments.is_empty() {
        "/".to_string()
    } else if name.is_empty() || name.ends_with('/') {
        format!("/{}/", segments.join("/"))
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Directory-form path of the entry `name` inside `dir` (trailing `/`).
pub fn join_dir(dir: &str, name: &str) -> String {
    let path = join(dir, name);
    if path.ends_with('/') {
        path
    } else {
        format!("{path}/")
    }
}

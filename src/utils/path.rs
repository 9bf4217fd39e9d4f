// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Path manipulation on the `/`-separated names used in build descriptions.
//!
//! Paths are never resolved against the filesystem; these helpers only
//! split and join strings.

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Join two path fragments, dropping empty and `.` components.
pub fn join_path(dir: &str, name: &str) -> String {
    if is_absolute(name) {
        return name.to_string();
    }
    let rooted = is_absolute(dir);
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches("./");
    match (dir, name) {
        ("", "" | ".") if rooted => "/".to_string(),
        ("", _) if rooted => format!("/{name}"),
        ("" | ".", _) => name.to_string(),
        (_, "" | ".") => dir.to_string(),
        _ => format!("{dir}/{name}"),
    }
}

pub fn join_all<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .fold(String::new(), |acc, part| join_path(&acc, part))
}

/// Everything before the last `/`, or the empty string.
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Everything after the last `/`.
pub fn filename_component(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Filename without its extension.
pub fn basename(path: &str) -> &str {
    let name = filename_component(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Extension without the leading `.`, or the empty string.
pub fn extension(path: &str) -> &str {
    let name = filename_component(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx + 1..],
    }
}

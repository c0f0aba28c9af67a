//! Lexical path resolution
//!
//! Project files are authored on Windows, so both `\` and `/` count as
//! separators on every platform. Resolution never touches the filesystem and
//! never consults the current working directory. Output uses the platform
//! separator unless rendered through [`with_separators_of`].

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

const SEPARATORS: [char; 2] = ['\\', '/'];

/// Check if a path is absolute (rooted, drive-qualified or UNC)
#[must_use]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATORS) || has_drive(path)
}

fn has_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Resolve `path` against `base`
///
/// An absolute `path` ignores `base`. `base` is expected to be absolute;
/// with an absolute base the result is absolute and resolving it again is a
/// no-op.
#[must_use]
pub fn resolve(base: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref().to_string_lossy();
    if is_absolute(&path) {
        return normalize(&*path);
    }
    let base = base.as_ref().to_string_lossy();
    if base.is_empty() {
        return normalize(&*path);
    }
    let base = base.trim_end_matches(SEPARATORS);
    normalize(format!("{base}{MAIN_SEPARATOR}{path}"))
}

/// Lexically normalize a path
///
/// Drops empty and `.` segments, folds `..` (clamped at the root) and trims
/// trailing separators.
#[must_use]
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let raw = path.as_ref().to_string_lossy();
    let (root, rest) = split_root(&raw);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split(SEPARATORS) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if root.is_some() => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut out = root.unwrap_or_default();
    out.push_str(&segments.join(&MAIN_SEPARATOR.to_string()));
    PathBuf::from(out)
}

/// Split the root (rendered with platform separators) from the remainder
fn split_root(raw: &str) -> (Option<String>, &str) {
    let sep = MAIN_SEPARATOR;

    if has_drive(raw) {
        let drive = &raw[..2];
        return (Some(format!("{drive}{sep}")), &raw[2..]);
    }

    let mut chars = raw.chars();
    let first = chars.next();
    let second = chars.next();
    let third = chars.next();
    match (first, second, third) {
        (Some(a), Some(b), Some(c))
            if SEPARATORS.contains(&a) && SEPARATORS.contains(&b) && !SEPARATORS.contains(&c) =>
        {
            // UNC: \\server\share
            let rest = &raw[2..];
            let mut parts = rest.splitn(3, SEPARATORS);
            let server = parts.next().unwrap_or_default();
            match parts.next() {
                Some(share) if !share.is_empty() => (
                    Some(format!("{sep}{sep}{server}{sep}{share}{sep}")),
                    parts.next().unwrap_or_default(),
                ),
                _ => (Some(format!("{sep}{sep}{server}{sep}")), ""),
            }
        }
        (Some(a), ..) if SEPARATORS.contains(&a) => (Some(sep.to_string()), raw),
        _ => (None, raw),
    }
}

/// Render `path` with the separator style used in `like`
///
/// A `like` that uses only `\` or only `/` decides the style; otherwise the
/// platform separator is kept.
#[must_use]
pub fn with_separators_of(path: impl AsRef<Path>, like: &str) -> String {
    let rendered = path.as_ref().to_string_lossy().into_owned();
    match (like.contains('\\'), like.contains('/')) {
        (true, false) => rendered.replace('/', "\\"),
        (false, true) => rendered.replace('\\', "/"),
        _ => rendered,
    }
}

/// Strip leading separators from a relative name
#[inline]
#[must_use]
pub fn trim_leading_separators(name: &str) -> &str {
    name.trim_start_matches(SEPARATORS)
}

/// Case-insensitive comparison of two normalized paths
#[must_use]
pub fn eq_ignore_case(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    comparable(a.as_ref()) == comparable(b.as_ref())
}

/// Case-insensitive suffix check, treating either separator as equal
#[must_use]
pub fn ends_with_ignore_case(path: impl AsRef<Path>, suffix: &str) -> bool {
    let suffix = unify(suffix);
    !suffix.is_empty() && comparable(path.as_ref()).ends_with(&suffix)
}

fn comparable(path: &Path) -> String {
    unify(&normalize(path).to_string_lossy())
}

fn unify(s: &str) -> String {
    s.replace('\\', "/").to_lowercase()
}

//! Repository-relative path handling.
//!
//! Paths inside a repository are always forward-slash separated and relative
//! to the repository root. Anything that could escape the root is rejected.

use crate::error::{CoreError, Result};

/// Characters that are not allowed in newly indexed filenames.
///
/// These are reserved on at least one platform an archive may be copied to.
pub const RESERVED_FILENAME_CHARS: [char; 6] = [':', '?', '<', '>', '*', '|'];

/// Normalize a repository path.
///
/// Backslashes become forward slashes and `.` segments are dropped. Empty
/// paths, absolute paths, `..` segments and empty segments are rejected.
pub fn normalize_path(path: &str) -> Result<String> {
    let invalid = |reason| CoreError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    let unified = path.replace('\\', "/");
    if unified.is_empty() {
        return Err(invalid("empty path"));
    }
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(invalid("absolute path"));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "." => continue,
            ".." => return Err(invalid("parent directory segment")),
            "" => return Err(invalid("empty segment")),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(segments.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// First reserved character found in `path`, if any.
pub fn find_reserved_char(path: &str) -> Option<char> {
    path.chars().find(|c| RESERVED_FILENAME_CHARS.contains(c))
}

/// Render a single-path rename compactly, e.g. `photos/{old -> new}-dir/a.jpg`.
///
/// Directory parts are diffed by their common prefix and suffix. The file
/// name is compared whole. `highlight` wraps each changed span, braces
/// included; pass `str::to_string` for plain output.
pub fn path_diff(old: &str, new: &str, highlight: impl Fn(&str) -> String) -> String {
    let (old_dir, old_name) = split_dir(old);
    let (new_dir, new_name) = split_dir(new);
    let mut out = String::new();

    if old_dir == new_dir {
        out.push_str(old_dir);
    } else {
        let prefix = common_prefix_len(old_dir, new_dir);
        let (old_rest, new_rest) = (&old_dir[prefix..], &new_dir[prefix..]);
        let suffix = common_suffix_len(old_rest, new_rest);

        out.push_str(&old_dir[..prefix]);
        out.push_str(&highlight(&format!(
            "{{{} -> {}}}",
            &old_rest[..old_rest.len() - suffix],
            &new_rest[..new_rest.len() - suffix],
        )));
        out.push_str(&old_rest[old_rest.len() - suffix..]);
    }

    if old_name == new_name {
        out.push_str(old_name);
    } else if old_dir.is_empty() && new_dir.is_empty() {
        out.push_str(&highlight(&format!("{old_name} -> {new_name}")));
    } else {
        out.push_str(&highlight(&format!("{{{old_name} -> {new_name}}}")));
    }

    out
}

/// Directory part (with trailing `/`) and file name.
fn split_dir(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or(a.len().min(b.len()), |((i, _), _)| i)
}

fn common_suffix_len(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

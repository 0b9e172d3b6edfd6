//! Conversion between absolute file paths and the keys used in the sidecar
//! file. Keys are relative to the project root, use `/` on every platform and
//! start with `./`. Files outside the root keep their full path (with `/`
//! separators) as their key.

use std::path::{Component, Path, PathBuf};

const KEY_PREFIX: &str = "./";

pub fn relative_key(root: &Path, file: &Path) -> String {
    let root = normalize_lexically(root);
    let file = if file.is_absolute() {
        normalize_lexically(file)
    } else {
        normalize_lexically(&root.join(file))
    };

    match file.strip_prefix(&root) {
        Ok(relative) => {
            let joined = relative
                .components()
                .filter_map(|component| match component {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            normalize_key(&joined)
        }
        Err(_) => to_forward_slashes(&file.to_string_lossy()),
    }
}

/// Canonical form of a key read from disk or typed by a user.
pub fn normalize_key(key: &str) -> String {
    let slashed = to_forward_slashes(key.trim());
    if is_absolute_key(&slashed) {
        return slashed;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    format!("{}{}", KEY_PREFIX, segments.join("/"))
}

pub fn absolute_path(root: &Path, key: &str) -> PathBuf {
    let normalized = normalize_key(key);
    if is_absolute_key(&normalized) {
        return PathBuf::from(normalized);
    }
    let mut path = root.to_path_buf();
    for segment in normalized.trim_start_matches(KEY_PREFIX).split('/') {
        if !segment.is_empty() {
            path.push(segment);
        }
    }
    normalize_lexically(&path)
}

pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_) | Component::ParentDir)
                );
                if at_root {
                    if !out.has_root() {
                        out.push("..");
                    }
                } else {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_forward_slashes(value: &str) -> String {
    value.replace('\\', "/")
}

fn is_absolute_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    key.starts_with('/') || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

use std::path::{Component, Path, PathBuf};

/// Renders a path with forward slashes regardless of host conventions.
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(&part.to_string_lossy());
            }
            Component::RootDir => out.push('/'),
            Component::CurDir => {}
            other => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

/// Resolves symlinks where possible. Delete and move-source events arrive
/// after the file is gone, so a failed canonicalize falls back to the
/// canonical parent joined with the file name, then to the path as given.
pub fn canonicalize_lenient(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(real_parent) = parent.canonicalize() {
            return real_parent.join(name);
        }
    }

    path.to_path_buf()
}

/// Folder key for grouping pending changes: the root's display name at top
/// level, else `<root>/<relative subfolder>` with forward slashes.
pub fn folder_key(root_label: &str, relative_dir: &Path) -> String {
    let sub = to_slash(relative_dir);
    if sub.is_empty() {
        root_label.to_string()
    } else {
        format!("{root_label}/{sub}")
    }
}

const TRANSIENT_SUFFIXES: &[&str] = &[".swp", ".tmp", "~"];

/// Editor scratch files are never indexed or reported.
pub fn has_transient_suffix(path: &Path) -> bool {
    let text = path.to_string_lossy();
    TRANSIENT_SUFFIXES.iter().any(|s| text.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_slash_joins_components() {
        assert_eq!(to_slash(Path::new("a/b/c.png")), "a/b/c.png");
        assert_eq!(to_slash(Path::new("c.png")), "c.png");
        assert_eq!(to_slash(Path::new("")), "");
    }

    #[test]
    fn folder_key_top_level_is_root_label() {
        assert_eq!(folder_key("out", Path::new("")), "out");
    }

    #[test]
    fn folder_key_joins_subfolder() {
        assert_eq!(folder_key("out", Path::new("sub")), "out/sub");
        assert_eq!(folder_key("out", Path::new("a/b")), "out/a/b");
    }

    #[test]
    fn canonicalize_lenient_survives_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.png");
        let resolved = canonicalize_lenient(&missing);
        assert_eq!(resolved.file_name().unwrap(), "gone.png");
        assert_eq!(
            resolved.parent().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn canonicalize_lenient_passes_through_unresolvable() {
        let odd = Path::new("/definitely/not/a/real/dir/x.png");
        assert_eq!(canonicalize_lenient(odd), odd.to_path_buf());
    }

    #[test]
    fn transient_suffixes_detected() {
        assert!(has_transient_suffix(Path::new("/out/a.png.tmp")));
        assert!(has_transient_suffix(Path::new("/out/.a.png.swp")));
        assert!(has_transient_suffix(Path::new("/out/a.png~")));
        assert!(!has_transient_suffix(Path::new("/out/a.png")));
    }
}

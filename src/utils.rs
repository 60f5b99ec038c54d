//! Shared path helpers

use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory without resolving
/// symlinks. `.` components are dropped.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}

/// Snapshot key for a file path.
///
/// UTF-8 paths are used as-is. On unix a path that is not valid UTF-8 is
/// escaped instead of decoded lossily, so distinct names keep distinct keys.
pub fn path_key(path: &Path) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        if path.to_str().is_none() {
            return escape_bytes(path.as_os_str().as_bytes());
        }
    }
    display_path(path)
}

/// Valid UTF-8 runs are kept with `\` doubled; each invalid byte becomes `\xNN`.
#[cfg(unix)]
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 8);
    for chunk in bytes.utf8_chunks() {
        out.push_str(&chunk.valid().replace('\\', "\\\\"));
        for byte in chunk.invalid() {
            out.push_str(&format!("\\x{:02x}", byte));
        }
    }
    out
}

/// Normalize a path for display (strip Windows long-path prefixes).
pub fn display_path(path: &Path) -> String {
    let path_str = path.to_string_lossy().to_string();
    #[cfg(windows)]
    {
        if let Some(stripped) = path_str.strip_prefix(r"\\?\UNC\") {
            return format!(r"\\{}", stripped);
        }
        if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }
    path_str
}

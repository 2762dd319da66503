use std::path::{Component, Path};

use crate::pipeline::error::{FileError, InvalidReason};

/// Prefixes that point at network shares rather than local storage.
const NETWORK_PREFIXES: [&str; 5] = ["\\\\", "//", "smb://", "nfs://", "file://"];

/// Reject traversal sequences, NUL bytes and network-share prefixes.
///
/// Pure string inspection: runs before the filesystem is touched.
pub fn check_path_safety(path: &Path) -> Result<(), FileError> {
    let raw = path.to_string_lossy();

    if raw.contains('\0') {
        return Err(FileError::new(
            InvalidReason::UnsafePath,
            "Path contains a null byte",
        ));
    }

    let lower = raw.to_lowercase();
    if let Some(prefix) = NETWORK_PREFIXES.iter().find(|p| lower.starts_with(*p)) {
        return Err(FileError::new(
            InvalidReason::UnsafePath,
            format!("Network paths are not accepted (prefix '{prefix}')"),
        ));
    }

    // `..\` is not a separator on unix, so check the raw text too.
    let has_parent = path.components().any(|c| matches!(c, Component::ParentDir))
        || raw.contains("../")
        || raw.contains("..\\");
    if has_parent {
        return Err(FileError::new(
            InvalidReason::UnsafePath,
            "Path contains a parent-directory traversal",
        ));
    }

    Ok(())
}

/// The path must resolve to an existing regular file. Returns its size.
pub fn check_regular_file(path: &Path) -> Result<u64, FileError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        FileError::new(
            InvalidReason::NotFound,
            format!("File not found: {} ({e})", path.display()),
        )
    })?;

    if !metadata.is_file() {
        return Err(FileError::new(
            InvalidReason::NotFound,
            format!("Not a regular file: {}", path.display()),
        ));
    }

    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_absolute_path_is_safe() {
        assert!(check_path_safety(Path::new("/data/scans/chest.png")).is_ok());
        assert!(check_path_safety(Path::new("relative/ok..name.png")).is_ok());
    }

    #[test]
    fn traversal_rejected() {
        for p in ["/data/../etc/passwd.png", "../up.png", "a/..\\b.png"] {
            let err = check_path_safety(Path::new(p)).unwrap_err();
            assert_eq!(err.reason, InvalidReason::UnsafePath, "{p}");
        }
    }

    #[test]
    fn null_byte_rejected() {
        let err = check_path_safety(Path::new("/data/scan\0.png")).unwrap_err();
        assert_eq!(err.reason, InvalidReason::UnsafePath);
    }

    #[test]
    fn network_shares_rejected() {
        for p in ["\\\\server\\share\\a.png", "//server/share/a.png", "SMB://nas/a.png"] {
            let err = check_path_safety(Path::new(p)).unwrap_err();
            assert_eq!(err.reason, InvalidReason::UnsafePath, "{p}");
        }
    }

    #[test]
    fn missing_file_not_found() {
        let err = check_regular_file(Path::new("/definitely/not/here.png")).unwrap_err();
        assert_eq!(err.reason, InvalidReason::NotFound);
    }

    #[test]
    fn directory_not_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_regular_file(dir.path()).unwrap_err();
        assert_eq!(err.reason, InvalidReason::NotFound);
    }

    #[test]
    fn regular_file_returns_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        assert_eq!(check_regular_file(&path).unwrap(), 3);
    }
}

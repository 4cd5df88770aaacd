use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub fn write_atomic<F>(path: &Path, write_fn: F) -> Result<(), String>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), String>,
{
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|err| format!("Failed to create temp file in {parent:?}: {err}"))?;
    write_fn(&mut temp)?;
    temp.flush()
        .map_err(|err| format!("Failed to flush {}: {err}", path.display()))?;
    temp.persist(path)
        .map_err(|err| format!("Failed to persist {}: {err}", path.display()))?;
    Ok(())
}

pub fn write_atomic_bytes(path: &Path, bytes: &[u8]) -> Result<(), String> {
    write_atomic(path, |file| {
        file.write_all(bytes)
            .map_err(|err| format!("Failed to write {}: {err}", path.display()))
    })
}

pub fn ensure_parent_dir(path: &Path) -> Result<Option<PathBuf>, String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("Failed to create directory {parent:?}: {err}"))?;
            return Ok(Some(parent.to_path_buf()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn write_atomic_bytes_creates_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.bin");
        write_atomic_bytes(&path, b"hello").expect("atomic write");
        assert_eq!(fs::read(&path).expect("read back"), b"hello");
    }

    #[test]
    fn write_atomic_bytes_replaces_existing_content() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.bin");
        write_atomic_bytes(&path, b"first").expect("atomic write");
        write_atomic_bytes(&path, b"second").expect("atomic rewrite");
        assert_eq!(fs::read(&path).expect("read back"), b"second");
    }

    #[test]
    fn ensure_parent_dir_creates_missing_dirs() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("a/b/c.json");
        let parent = ensure_parent_dir(&path).expect("ensure parent");
        assert_eq!(parent, Some(dir.path().join("a/b")));
        assert!(dir.path().join("a/b").is_dir());
    }
}

//! Atomic file operations
//!
//! Every write goes to a temporary file in the target directory, is fsynced,
//! then renamed over the destination so readers see either the old content
//! or the new content, never a partial file.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::{self, Write};

use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Bytes written to the destination
    pub bytes_written: u64,
}

/// Atomically write content to a file using temp file + fsync + rename.
///
/// Parent directories are created as needed. Content is written as-is; the
/// artifacts handled here are user code and must round-trip byte for byte.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    let temp_file = stage_temp_file(path, content)?;

    temp_file
        .persist(path.as_std_path())
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to atomically write file: {path}"))?;

    Ok(AtomicWriteResult {
        bytes_written: content.len() as u64,
    })
}

/// Atomically create a file only if it does not already exist.
///
/// Returns `Ok(false)` without touching the destination when another writer
/// got there first. Used for get-or-create by unique name.
pub fn create_file_atomic(path: &Utf8Path, content: &str) -> Result<bool> {
    let temp_file = stage_temp_file(path, content)?;

    match temp_file.persist_noclobber(path.as_std_path()) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => {
            Err(e.error).with_context(|| format!("Failed to atomically create file: {path}"))
        }
    }
}

fn stage_temp_file(path: &Utf8Path, content: &str) -> Result<NamedTempFile> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let parent = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };

    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {parent}"))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent}"))?;

    temp_file
        .write_all(content.as_bytes())
        .with_context(|| "Failed to write content to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    Ok(temp_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_write_creates_parents_and_content() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("a/b/model.py");

        let result = write_file_atomic(&path, "x=1\n").unwrap();

        assert_eq!(result.bytes_written, 4);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x=1\n");
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("model.py");
        fs::write(&path, "old").unwrap();

        write_file_atomic(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_write_preserves_crlf() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("model.py");

        write_file_atomic(&path, "a\r\nb").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"a\r\nb");
    }

    #[test]
    fn test_create_does_not_clobber() {
        let dir = TempDir::new().unwrap();
        let path = utf8_dir(&dir).join("conn.json");

        assert!(create_file_atomic(&path, "first").unwrap());
        assert!(!create_file_atomic(&path, "second").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);
        let path = root.join("conn.json");

        create_file_atomic(&path, "first").unwrap();
        create_file_atomic(&path, "second").unwrap();
        write_file_atomic(&path, "third").unwrap();

        let entries: Vec<_> = fs::read_dir(&root).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}

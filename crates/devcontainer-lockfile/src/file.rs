//! Atomic, exclusively-locked lockfile reads and writes: temp file + rename
//! under an `flock`, so a crash mid-write never leaves a torn lockfile and
//! two concurrent writers never interleave.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use devcontainer_types::{CoreError, CoreResult, Lockfile};
use fs2::FileExt;

/// Missing or empty file is `Ok(None)`; malformed JSON is `BadLockfile`.
pub fn read(path: &Path) -> CoreResult<Option<Lockfile>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CoreError::bad_lockfile(format!(
                "reading {}: {e}",
                path.display()
            )))
        }
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| CoreError::bad_lockfile(format!("parsing {}: {e}", path.display())))
}

/// Acquires an exclusive lock on a sibling `.lock` file, writes `lockfile`
/// to a temp file in the same directory, then renames it into place.
pub fn write_atomic(path: &Path, lockfile: &Lockfile) -> CoreResult<()> {
    let lock_path = path.with_extension("lock");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CoreError::bad_lockfile(format!("creating {}: {e}", parent.display())))?;
    }
    let guard = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| CoreError::bad_lockfile(format!("opening {}: {e}", lock_path.display())))?;
    guard
        .lock_exclusive()
        .map_err(|e| CoreError::bad_lockfile(format!("locking {}: {e}", lock_path.display())))?;

    let json = serde_json::to_string_pretty(lockfile)
        .map_err(|e| CoreError::bad_lockfile(format!("serializing lockfile: {e}")))?;

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)
            .map_err(|e| CoreError::bad_lockfile(format!("creating {}: {e}", tmp_path.display())))?;
        file.write_all(json.as_bytes())
            .map_err(|e| CoreError::bad_lockfile(format!("writing {}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| CoreError::bad_lockfile(format!("syncing {}: {e}", tmp_path.display())))?;
    }
    fs::rename(&tmp_path, path)
        .map_err(|e| CoreError::bad_lockfile(format!("renaming into {}: {e}", path.display())))?;

    FileExt::unlock(&guard)
        .map_err(|e| CoreError::bad_lockfile(format!("unlocking {}: {e}", lock_path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcontainer_types::LockEntry;

    #[test]
    fn read_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("devcontainer-lock.json");
        assert_eq!(read(&path).unwrap(), None);
    }

    #[test]
    fn read_empty_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("devcontainer-lock.json");
        fs::write(&path, "").unwrap();
        assert_eq!(read(&path).unwrap(), None);
    }

    #[test]
    fn read_malformed_json_is_bad_lockfile() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("devcontainer-lock.json");
        fs::write(&path, "{not json").unwrap();
        let err = read(&path).unwrap_err();
        assert_eq!(err.kind(), devcontainer_types::ErrorKind::BadLockfile);
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("devcontainer-lock.json");
        let mut lock = Lockfile::empty();
        lock.features.insert(
            "ruby".to_string(),
            LockEntry {
                version: "1.2.3".into(),
                resolved: "ghcr.io/devcontainers/ruby:1".into(),
                integrity: "sha256:aaaa".into(),
                depends_on: vec![],
            },
        );
        write_atomic(&path, &lock).unwrap();
        assert_eq!(read(&path).unwrap(), Some(lock));
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("devcontainer-lock.json");
        write_atomic(&path, &Lockfile::empty()).unwrap();
        assert!(!path.with_extension("tmp").exists());
    }
}

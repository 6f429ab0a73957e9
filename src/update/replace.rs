//! Atomic executable replacement.
//!
//! Stages the downloaded binary in a temp file beside the target so the
//! final move stays on one filesystem, then swaps it into place. A failed
//! attempt never leaves the target missing or non-executable, and never
//! leaves the temp file behind.

use crate::error::{Result, WardenError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Replace the executable at `target` with `bytes`.
///
/// The swap renames the current binary to `<target>.old`, moves the
/// staged file into place, and removes the backup. On POSIX the running
/// image stays valid throughout because open file descriptors follow the
/// old inode; on Windows the running image cannot be deleted, so a
/// leftover `.old` is tolerated and swept on the next run. If installing
/// the staged file fails, the backup is renamed back so the service is
/// never left without an executable.
///
/// # Errors
///
/// Returns `Replace` when staging or swapping fails. The pre-existing
/// binary is intact in every error case.
pub fn replace_binary(target: &Path, bytes: &[u8]) -> Result<()> {
    let staged = stage_new_binary(target, bytes)?;

    if let Err(e) = swap_into_place(&staged, target) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }

    tracing::info!("binary replaced at {}", target.display());
    Ok(())
}

/// Remove stale `.old` backups and orphaned staging files beside `target`
/// left behind by an interrupted earlier attempt.
pub fn clean_stale_artifacts(target: &Path) {
    let Some(dir) = target.parent() else {
        return;
    };
    let Some(name) = target.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return;
    };

    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let entry_name = entry.file_name().to_string_lossy().into_owned();
        let stale = entry_name == format!("{name}.old")
            || entry_name.starts_with(&format!("{name}.new."));
        if stale && std::fs::remove_file(entry.path()).is_ok() {
            tracing::debug!("removed stale update artifact {entry_name}");
        }
    }
}

/// Write `bytes` to a temp file in the target's directory and mark it
/// executable. The temp file is removed on any failure.
fn stage_new_binary(target: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let dir = target.parent().ok_or_else(|| {
        WardenError::Replace(format!("target {} has no parent directory", target.display()))
    })?;
    let name = target.file_name().ok_or_else(|| {
        WardenError::Replace(format!("target {} has no file name", target.display()))
    })?;

    let mut staged_name = name.to_os_string();
    staged_name.push(format!(".new.{}", std::process::id()));
    let staged = dir.join(staged_name);

    if let Err(e) = std::fs::write(&staged, bytes) {
        let _ = std::fs::remove_file(&staged);
        return Err(WardenError::Replace(format!(
            "cannot write staged binary {}: {e}",
            staged.display()
        )));
    }

    if let Err(e) = set_executable(&staged) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }

    Ok(staged)
}

/// Move the staged file over the target, keeping the old binary
/// recoverable at `<target>.old` until the swap has succeeded.
fn swap_into_place(staged: &Path, target: &Path) -> Result<()> {
    let backup = backup_path(target);

    if target.exists() {
        std::fs::rename(target, &backup).map_err(|e| {
            WardenError::Replace(format!(
                "cannot move current binary {} aside: {e}",
                target.display()
            ))
        })?;
    }

    if let Err(e) = rename_or_copy(staged, target) {
        // Put the old binary back so the target is never left absent.
        if backup.exists() {
            let _ = std::fs::rename(&backup, target);
        }
        return Err(WardenError::Replace(format!(
            "cannot install new binary to {}: {e}",
            target.display()
        )));
    }

    remove_backup(&backup);
    Ok(())
}

/// Rename, falling back to copy-and-delete across filesystem boundaries.
fn rename_or_copy(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// `<target>.old`, appended to the full filename so `warden.exe` becomes
/// `warden.exe.old`.
fn backup_path(target: &Path) -> PathBuf {
    let mut name: OsString = target.file_name().unwrap_or_default().to_os_string();
    name.push(".old");
    target.with_file_name(name)
}

#[cfg(not(windows))]
fn remove_backup(backup: &Path) {
    // Open file descriptors keep the unlinked old image alive, so a
    // still-running copy is unaffected until it exits.
    let _ = std::fs::remove_file(backup);
}

#[cfg(windows)]
fn remove_backup(backup: &Path) {
    // The running image holds a lock on its own file; deletion fails
    // until the process exits. The leftover is swept on the next run.
    if std::fs::remove_file(backup).is_err() {
        tracing::debug!("old binary {} still locked, deferring cleanup", backup.display());
    }
}

/// Set executable permission on Unix platforms.
fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            WardenError::Replace(format!(
                "cannot set executable permission on {}: {e}",
                path.display()
            ))
        })?;
    }
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn assert_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111, "{} is not executable", path.display());
    }

    #[cfg(not(unix))]
    fn assert_executable(_path: &Path) {}

    #[test]
    fn replaces_existing_binary_with_new_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("warden");
        std::fs::write(&target, b"old-binary").unwrap();

        replace_binary(&target, b"new-binary").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new-binary");
        assert_executable(&target);
        // Neither the backup nor the staging file survives a success.
        assert!(!backup_path(&target).exists());
        assert_eq!(leftover_count(dir.path(), "warden.new."), 0);
    }

    #[test]
    fn installs_when_target_does_not_exist_yet() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("warden");

        replace_binary(&target, b"fresh").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"fresh");
        assert_executable(&target);
    }

    #[test]
    fn failed_swap_restores_old_binary_via_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("warden");
        std::fs::write(&target, b"old-binary").unwrap();

        // Simulate an interrupted rename: the staged file vanished before
        // the swap, so installing it fails after the target moved aside.
        let missing_staged = dir.path().join("warden.new.0");
        let err = swap_into_place(&missing_staged, &target).unwrap_err();
        assert!(matches!(err, WardenError::Replace(_)), "got {err}");

        // The old binary is back in place, never absent.
        assert_eq!(std::fs::read(&target).unwrap(), b"old-binary");
    }

    #[test]
    fn failed_stage_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        // A target whose parent is a file, not a directory.
        let bogus_parent = dir.path().join("not-a-dir");
        std::fs::write(&bogus_parent, b"file").unwrap();
        let target = bogus_parent.join("warden");

        assert!(replace_binary(&target, b"bytes").is_err());
        assert_eq!(leftover_count(dir.path(), "warden.new."), 0);
    }

    #[test]
    fn backup_path_appends_to_full_filename() {
        assert_eq!(
            backup_path(Path::new("/opt/warden/warden.exe")),
            PathBuf::from("/opt/warden/warden.exe.old")
        );
        assert_eq!(
            backup_path(Path::new("/opt/warden/warden")),
            PathBuf::from("/opt/warden/warden.old")
        );
    }

    #[test]
    fn clean_stale_artifacts_removes_leftovers_only() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("warden");
        std::fs::write(&target, b"current").unwrap();
        std::fs::write(dir.path().join("warden.old"), b"stale").unwrap();
        std::fs::write(dir.path().join("warden.new.1234"), b"orphan").unwrap();
        std::fs::write(dir.path().join("unrelated"), b"keep").unwrap();

        clean_stale_artifacts(&target);

        assert!(target.exists());
        assert!(dir.path().join("unrelated").exists());
        assert!(!dir.path().join("warden.old").exists());
        assert!(!dir.path().join("warden.new.1234").exists());
    }

    #[test]
    fn rename_or_copy_renames_within_directory() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        std::fs::write(&from, b"payload").unwrap();

        rename_or_copy(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"payload");
    }

    fn leftover_count(dir: &Path, prefix: &str) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
            .count()
    }
}

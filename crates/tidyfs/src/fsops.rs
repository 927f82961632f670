//! OS filesystem primitives used by the mutation layer.
//!
//! Everything here is a thin wrapper over `std::fs` that never touches the
//! cache. Callers perform these first and update in-memory state only once
//! they succeed.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read size when streaming a file through the hasher.
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Moves `from` to `to`, falling back to copy-then-delete when a plain
/// rename fails (for example across devices).
///
/// On fallback failure the partial copy is removed and the source is left
/// as it was.
pub fn rename_or_copy(from: &Path, to: &Path) -> io::Result<()> {
    let rename_error = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(error) => error,
    };
    if !exists(from) {
        return Err(rename_error);
    }
    tracing::debug!(
        "rename {} -> {} failed ({rename_error}), copying instead",
        from.display(),
        to.display()
    );

    if let Err(error) = copy_recursive(from, to) {
        if exists(to) {
            let _ = remove_entry(to);
        }
        return Err(error);
    }
    if let Err(error) = remove_entry(from) {
        // Keep exactly one copy on disk.
        let _ = remove_entry(to);
        return Err(error);
    }
    Ok(())
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(from)?;
    if metadata.is_dir() {
        fs::create_dir(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
        fs::set_permissions(to, metadata.permissions())
    } else {
        fs::copy(from, to).map(|_| ())
    }
}

/// Removes a file, or a directory with everything under it.
pub fn remove_entry(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

pub fn create_dir(path: &Path) -> io::Result<()> {
    fs::create_dir(path)
}

/// Applies a unix permission mode. Elsewhere only the write bits matter:
/// no write bit means read-only.
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }
    #[cfg(not(unix))]
    {
        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_readonly(mode & 0o222 == 0);
        fs::set_permissions(path, permissions)
    }
}

/// Hex SHA-256 of a file's full contents, read in fixed-size chunks.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Existence check that does not follow symlinks.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

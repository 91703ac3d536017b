//! Scoped per-invocation workspace.
//!
//! A [`Workspace`] is a private temporary directory that lives exactly as long
//! as one CLI invocation. It holds transient artifacts (captured stdout,
//! response headers, request bodies) and secret material staged for a single
//! use. The directory is removed by [`Workspace::release`] or, on any other
//! exit path, when the value is dropped.

use crate::error::AdminError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const PREFIX: &str = "adminkit-";

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates a fresh, uniquely named directory under the system temp location.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Workspace`] when no writable temp location exists.
    pub fn acquire() -> Result<Self, AdminError> {
        Self::acquire_in(std::env::temp_dir())
    }

    /// Creates the workspace under an explicit parent directory.
    pub fn acquire_in(parent: impl AsRef<Path>) -> Result<Self, AdminError> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(parent)
            .map_err(AdminError::Workspace)?;
        restrict(dir.path(), 0o700).map_err(AdminError::Workspace)?;
        debug!("Acquired workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes owner-readable secret material and returns its path.
    ///
    /// The file is created exclusively, so staging the same name twice fails.
    pub fn stage_secret(&self, name: &str, contents: &str) -> Result<PathBuf, AdminError> {
        let path = self.dir.path().join(name);
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path).map_err(AdminError::Workspace)?;
        file.write_all(contents.as_bytes())
            .map_err(AdminError::Workspace)?;
        Ok(path)
    }

    /// Stores a transient artifact such as a captured body or header dump.
    pub fn write_artifact(&self, name: &str, contents: &[u8]) -> Result<PathBuf, AdminError> {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).map_err(AdminError::Workspace)?;
        Ok(path)
    }

    /// Removes the workspace and everything in it.
    pub fn release(self) -> Result<(), AdminError> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!("Released workspace {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove workspace {}: {}", path.display(), e);
                Err(AdminError::Workspace(e))
            }
        }
    }
}

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

//! Working directory for a transcoding engine.
//!
//! A [`WorkingDir`] is a flat namespace of named files inside a temporary
//! directory. The engine reads its inputs from and writes its outputs to this
//! namespace, and the whole directory is removed when the `WorkingDir` is
//! dropped.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary, flat, name-addressed file namespace.
///
/// # Example
///
/// ```no_run
/// use mm_av::WorkingDir;
///
/// let dir = WorkingDir::new().unwrap();
/// let frame = dir.path_for("frame-0000.png").unwrap();
/// assert!(frame.starts_with(dir.root()));
/// ```
#[derive(Debug)]
pub struct WorkingDir {
    temp_dir: TempDir,
}

impl WorkingDir {
    /// Create a fresh temporary directory.
    pub fn new() -> mm_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("mediamorph-")
            .tempdir()
            .map_err(|e| mm_core::Error::tool("workspace", format!("failed to create temp dir: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// Path to the directory itself.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Resolve a resource name to a path inside the directory.
    ///
    /// Names are flat: anything containing a path separator, or a bare `.`
    /// or `..`, is rejected so nothing escapes the namespace.
    pub fn path_for(&self, name: &str) -> mm_core::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.temp_dir.path().join(name))
    }

    /// Names of the files currently present, sorted.
    pub fn names(&self) -> mm_core::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.temp_dir.path())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> mm_core::Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(mm_core::Error::Validation(format!(
            "invalid working file name: {name:?}"
        )));
    }
    Ok(())
}

//! Scoped filesystem helpers used by every stage.
//!
//! [`atomic_output`] guarantees a target path is either absent or fully
//! written; [`TempFiles`] removes intermediate files whenever the scope that
//! owns it ends, on success and on failure alike.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, ScribeError};

/// Run `write` against a temporary path next to `target`, then rename the
/// temporary file onto `target`.
///
/// The temporary file lives in the target's directory so the final rename
/// stays on one filesystem. It keeps the target's extension, which lets tools
/// such as ffmpeg pick the container from the file name. If `write` fails the
/// temporary file is removed before the error is returned, and `target` is
/// left untouched.
pub fn atomic_output<T, F>(target: &Path, write: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = target.file_name().ok_or_else(|| {
        ScribeError::Config(format!("Invalid output path: {}", target.display()))
    })?;
    let suffix = target
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name.to_string_lossy()))
        .suffix(&suffix)
        .tempfile_in(dir)?
        .into_temp_path();

    debug!("Writing {} via {}", target.display(), temp.display());

    // Dropping `temp` on the error path deletes it.
    let value = write(&temp)?;

    temp.persist(target).map_err(|e| ScribeError::Io(e.error))?;
    Ok(value)
}

/// Atomically replace `target` with `contents`
pub fn write_atomic(target: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    atomic_output(target, |tmp| {
        std::fs::write(tmp, contents.as_ref())?;
        Ok(())
    })
}

/// Intermediate files that must not outlive the current scope.
///
/// Paths are not created here; callers (usually an external tool) create
/// them. On drop every tracked path that exists is removed.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Track another path and hand it back for use
    pub fn track<P: Into<PathBuf>>(&mut self, path: P) -> PathBuf {
        let path = path.into();
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed intermediate file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove intermediate file {}: {}", path.display(), e),
            }
        }
    }
}

/// Sibling path for an intermediate artifact: `<dir>/<stem>._tmp_<tag>.<ext>`
pub fn intermediate_path(source: &Path, tag: &str, ext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}._tmp_{}.{}", stem, tag, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_atomic_output_renames_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.srt");

        let seen = atomic_output(&target, |tmp| {
            assert_eq!(tmp.parent(), Some(dir.path()));
            assert_eq!(tmp.extension().and_then(|e| e.to_str()), Some("srt"));
            assert!(!target.exists());
            fs::write(tmp, "payload")?;
            Ok(tmp.to_path_buf())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "payload");
        assert!(!seen.exists());
        assert_eq!(entries(dir.path()), vec!["out.srt".to_string()]);
    }

    #[test]
    fn test_atomic_output_removes_temp_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.m4a");

        let result: Result<()> = atomic_output(&target, |tmp| {
            fs::write(tmp, "partial")?;
            Err(ScribeError::Media("encoder crashed".to_string()))
        });

        assert!(matches!(result, Err(ScribeError::Media(_))));
        assert!(!target.exists());
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_atomic_output_keeps_previous_target_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ledger.json");
        fs::write(&target, "old").unwrap();

        let result: Result<()> = atomic_output(&target, |tmp| {
            fs::write(tmp, "new but broken")?;
            Err(ScribeError::Config("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("notes.txt");
        fs::write(&target, "first").unwrap();

        write_atomic(&target, "second").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
        assert_eq!(entries(dir.path()), vec!["notes.txt".to_string()]);
    }

    #[test]
    fn test_temp_files_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        let never_created = dir.path().join("c.wav");

        {
            let mut temps = TempFiles::new([&a]);
            let b = temps.track(&b);
            temps.track(&never_created);
            fs::write(&a, "a").unwrap();
            fs::write(&b, "b").unwrap();
            assert_eq!(temps.paths().len(), 3);
        }

        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_temp_files_removed_on_error_path() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.wav");

        let run = || -> Result<()> {
            let _temps = TempFiles::new([&raw]);
            fs::write(&raw, "decoded")?;
            Err(ScribeError::Media("normalize failed".to_string()))
        };

        assert!(run().is_err());
        assert!(!raw.exists());
    }

    #[test]
    fn test_intermediate_path() {
        let path = intermediate_path(Path::new("/media/talk.mp4"), "raw", "wav");
        assert_eq!(path, PathBuf::from("/media/talk._tmp_raw.wav"));
    }
}

//! Scratch storage owned by a single operation.
//!
//! Every [`TempResource`] is a private directory under the configured temp
//! root. It is removed by [`TempResource::release`] or, failing that, when
//! the value is dropped, so no exit path can leave files behind.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A scratch directory holding at most one payload file.
#[derive(Debug)]
pub struct TempResource {
    dir: TempDir,
    file: Option<PathBuf>,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl TempResource {
    /// Creates a fresh scratch directory under `root`, creating `root` if needed.
    pub fn create_in(root: &Path, label: &str) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("mediaflow-{label}-"))
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created temp resource");

        Ok(Self {
            dir,
            file: None,
            size_bytes: 0,
            created_at: Utc::now(),
        })
    }

    /// The scratch directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the payload file, once one exists.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Payload file name.
    pub fn filename(&self) -> Option<String> {
        self.file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    /// Payload size in bytes (0 until a file is written or adopted).
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// When the scratch directory was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Writes `bytes` as the payload, keeping only the final path component of `name`.
    pub async fn write_file(&mut self, name: &str, bytes: &[u8]) -> io::Result<&Path> {
        let safe = Path::new(name)
            .file_name()
            .map_or_else(|| "upload.bin".into(), |n| n.to_os_string());
        let path = self.dir.path().join(safe);
        tokio::fs::write(&path, bytes).await?;

        self.size_bytes = bytes.len() as u64;
        Ok(self.file.insert(path).as_path())
    }

    /// Records a file some other writer produced inside the scratch directory.
    pub fn adopt(&mut self, path: impl Into<PathBuf>) -> io::Result<u64> {
        let path = path.into();
        let canonical = path.canonicalize()?;
        if !canonical.starts_with(self.dir.path().canonicalize()?) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is outside the scratch directory", path.display()),
            ));
        }

        self.size_bytes = std::fs::metadata(&canonical)?.len();
        self.file = Some(canonical);
        Ok(self.size_bytes)
    }

    /// Reads the whole payload.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        match &self.file {
            Some(path) => tokio::fs::read(path).await,
            None => Err(io::Error::new(io::ErrorKind::NotFound, "temp resource has no file")),
        }
    }

    /// Deletes the scratch directory and everything in it.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Released temp resource"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to release temp resource"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).map(Iterator::count).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_write_and_release() {
        let root = tempfile::tempdir().unwrap();
        let mut res = TempResource::create_in(root.path(), "test").unwrap();

        let path = res.write_file("clip.mp4", b"12345").await.unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(res.size_bytes(), 5);
        assert_eq!(res.filename().as_deref(), Some("clip.mp4"));
        assert_eq!(res.read().await.unwrap(), b"12345");

        res.release();
        assert!(!path.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_write_strips_directories() {
        let root = tempfile::tempdir().unwrap();
        let mut res = TempResource::create_in(root.path(), "test").unwrap();

        let path = res.write_file("../../etc/passwd", b"x").await.unwrap().to_path_buf();
        assert!(path.starts_with(res.dir()));
        assert_eq!(res.filename().as_deref(), Some("passwd"));
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        {
            let res = TempResource::create_in(root.path(), "test").unwrap();
            std::fs::write(res.dir().join("partial.part"), b"abc").unwrap();
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_adopt_rejects_outside_paths() {
        let root = tempfile::tempdir().unwrap();
        let mut res = TempResource::create_in(root.path(), "test").unwrap();

        let outside = root.path().join("outside.bin");
        std::fs::write(&outside, b"abc").unwrap();
        assert!(res.adopt(&outside).is_err());

        let inside = res.dir().join("inside.bin");
        std::fs::write(&inside, b"abcd").unwrap();
        assert_eq!(res.adopt(&inside).unwrap(), 4);
        assert_eq!(res.size_bytes(), 4);
    }
}

//! Storage of generated artifacts under the configured media root.

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// Directory holding sticker images, relative to the media root
pub const STICKER_DIR: &str = "stickers";

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the media directories if they are missing
    pub async fn ensure_dirs(&self) -> Result<(), ServiceError> {
        fs::create_dir_all(self.root.join(STICKER_DIR)).await?;
        Ok(())
    }

    /// Absolute path of a stored file
    pub fn path(&self, relative: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return Err(ServiceError::StorageError(format!(
                "invalid media path: {}",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }

    pub async fn write(&self, relative: &str, bytes: &[u8]) -> Result<(), ServiceError> {
        let path = self.path(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored media file");
        Ok(())
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.path(relative)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServiceError::NotFound(
                format!("media file {relative} not found"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a file; a missing file is not an error. Returns whether something was removed.
    pub async fn remove(&self, relative: &str) -> Result<bool, ServiceError> {
        let path = self.path(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Media file already gone");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Relative paths of the regular files directly inside `dir`
    pub async fn list(&self, dir: &str) -> Result<Vec<String>, ServiceError> {
        let path = self.path(dir)?;
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    files.push(format!("{dir}/{name}"));
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_paths_leaving_the_root() {
        let store = MediaStore::new("/srv/media");
        assert!(store.path("../etc/passwd").is_err());
        assert!(store.path("/etc/passwd").is_err());
        assert!(store.path("").is_err());
        assert_eq!(
            store.path("stickers/QR-1.png").unwrap(),
            PathBuf::from("/srv/media/stickers/QR-1.png")
        );
    }

    #[tokio::test]
    async fn write_read_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        store.ensure_dirs().await.unwrap();

        store.write("stickers/QR-A.png", b"png").await.unwrap();
        assert_eq!(store.read("stickers/QR-A.png").await.unwrap(), b"png");
        assert_eq!(
            store.list(STICKER_DIR).await.unwrap(),
            vec!["stickers/QR-A.png".to_string()]
        );

        assert!(store.remove("stickers/QR-A.png").await.unwrap());
        assert!(!store.remove("stickers/QR-A.png").await.unwrap());
        assert!(store.read("stickers/QR-A.png").await.is_err());
    }
}

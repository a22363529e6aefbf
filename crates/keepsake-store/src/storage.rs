use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// On-disk blob storage.
///
/// Each object lives at `{dir}/{bucket}/{path}`. Objects are write-once.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    /// Resolve an object path, refusing anything that could escape the
    /// bucket directory.
    pub fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let mut resolved = self.dir.clone();
        for part in [bucket, path] {
            let relative = Path::new(part);
            if part.is_empty() || part.contains('\\') {
                bail!("Invalid object path: {}/{}", bucket, path);
            }
            for component in relative.components() {
                match component {
                    Component::Normal(segment) => resolved.push(segment),
                    _ => bail!("Invalid object path: {}/{}", bucket, path),
                }
            }
        }
        Ok(resolved)
    }

    /// Write a new object. Fails with `AlreadyExists` if the name is taken.
    pub async fn put_object(&self, bucket: &str, path: &str, data: &[u8]) -> Result<PathBuf> {
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(target)
    }
}

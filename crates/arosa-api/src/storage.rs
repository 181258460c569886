use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Object store for uploaded images, backed by a local directory that the
/// router serves under `/media`.
///
/// Keys are relative slash-separated paths such as `posts/12_0.jpg`.
pub struct MediaStore {
    dir: PathBuf,
    public_base: String,
}

impl MediaStore {
    pub async fn new(dir: PathBuf, public_url: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: format!("{}/media/", public_url.trim_end_matches('/')),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.public_base, key)
    }

    /// Inverse of [`MediaStore::public_url`]; `None` for URLs we did not issue.
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_base.as_str())
    }

    /// Stores `data` under `key`, replacing any previous object, and returns
    /// its public URL.
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(self.public_url(key))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media object {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media object {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of objects referenced by public URLs.
    pub async fn delete_urls<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        for url in urls {
            let Some(key) = self.key_for_url(url) else {
                warn!("Not deleting foreign media URL {}", url);
                continue;
            };
            if let Err(e) = self.delete(key).await {
                warn!("Failed to delete media object {}: {}", key, e);
            }
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            bail!("Invalid media key: {:?}", key);
        }
        Ok(self.dir.join(relative))
    }
}

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Local-directory store for uploaded receipt documents. Files are written
/// under a generated name and exposed read-only at `{base_url}/uploads/`.
#[derive(Clone)]
pub struct FileStore {
    uploads_dir: PathBuf,
    base_url: String,
}

impl FileStore {
    pub fn new(uploads_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let uploads_dir = uploads_dir.into();
        std::fs::create_dir_all(&uploads_dir)
            .map_err(|e| anyhow::anyhow!("creating uploads dir {}: {}", uploads_dir.display(), e))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(FileStore {
            uploads_dir,
            base_url,
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Writes the full byte slice under a collision-resistant generated name
    /// that preserves the original extension, and returns the stored name.
    pub async fn save(&self, data: &[u8], original_name: &str) -> anyhow::Result<String> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let stored_name = format!("{}{}", Uuid::new_v4(), ext);

        let path = self.uploads_dir.join(&stored_name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| anyhow::anyhow!("saving {}: {}", path.display(), e))?;

        Ok(stored_name)
    }

    /// Idempotent: deleting a name that no longer exists succeeds silently.
    /// Names carrying path separators are rejected so callers cannot reach
    /// outside the uploads directory.
    pub async fn delete(&self, stored_name: &str) -> anyhow::Result<()> {
        if stored_name.is_empty()
            || stored_name.contains('/')
            || stored_name.contains('\\')
            || stored_name.contains("..")
        {
            anyhow::bail!("invalid stored name: {}", stored_name);
        }

        let path = self.uploads_dir.join(stored_name);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| anyhow::anyhow!("deleting {}: {}", path.display(), e))?;
        }

        Ok(())
    }

    /// Public URL for a stored name; pure string concatenation, no I/O.
    pub fn file_url(&self, stored_name: &str) -> String {
        format!("{}/uploads/{}", self.base_url, stored_name)
    }
}

//! Publishing of finished report artifacts to the output directory.

use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory of published reports. A file only appears under its final name
/// once all of its bytes are on disk.
#[derive(Debug, Clone)]
pub struct ReportStore {
    base_path: PathBuf,
}

impl ReportStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write `bytes` to a temporary sibling, flush it, then rename it to
    /// `file_name`. An existing report with the same name is replaced.
    pub async fn publish(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "invalid report file name: {}",
                file_name
            )));
        }

        fs::create_dir_all(&self.base_path).await?;

        let final_path = self.base_path.join(file_name);
        let temp_path = self
            .base_path
            .join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        if let Err(e) = write_fully(&temp_path, bytes).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temporary report");
            }
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(path = %final_path.display(), bytes = bytes.len(), "Report published");
        Ok(final_path)
    }
}

async fn write_fully(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

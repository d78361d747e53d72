use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

use crate::{ports::HistoryRecorder, Result};

/// Appends one line per message to a text file.
///
/// Appends from concurrent dispatch tasks are serialized so lines never
/// interleave.
pub struct FileHistoryRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileHistoryRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryRecorder for FileHistoryRecorder {
    async fn append(&self, text: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        f.write_all(format!("{text}\n").as_bytes()).await?;
        f.flush().await?;
        Ok(())
    }
}

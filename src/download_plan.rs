use crate::catalog::GranuleDescriptor;
use crate::granule::ensure_downloaded;
use crate::transport::Transport;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub granule: GranuleDescriptor,
    pub output: PathBuf,
}

impl DownloadTask {
    pub fn new(granule: GranuleDescriptor, download_directory: &Path) -> Self {
        let output = download_directory.join(granule.file_name());
        DownloadTask { granule, output }
    }

    pub fn is_cached(self: &Self) -> bool {
        self.output.exists()
    }

    fn directory(self: &Self) -> Result<&Path> {
        self.output
            .parent()
            .ok_or(anyhow!("Task output {} has no parent", self.output.display()))
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct DownloadPlan {
    tasks: Vec<DownloadTask>,
}

impl DownloadPlan {
    pub fn new(granules: Vec<GranuleDescriptor>, download_directory: &Path) -> Self {
        let tasks = granules
            .into_iter()
            .map(|granule| DownloadTask::new(granule, download_directory))
            .collect();
        Self { tasks }
    }

    pub fn tasks(self: &Self) -> &[DownloadTask] {
        &self.tasks
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&content)?;
        Ok(plan)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Downloads every task not already on disk, one after another.
    pub async fn execute(self: &Self, transport: &impl Transport) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.tasks.len());
        for (i, task) in self.tasks.iter().enumerate() {
            info!(
                "Task {}/{}: {}",
                i + 1,
                self.tasks.len(),
                task.granule.native_id
            );
            let path = ensure_downloaded(transport, &task.granule, task.directory()?).await?;
            paths.push(path);
        }
        Ok(paths)
    }
}

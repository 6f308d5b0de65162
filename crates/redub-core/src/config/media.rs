//! Media filesystem configuration.

use serde::{Deserialize, Serialize};

/// Filesystem layout and backpressure settings.
///
/// Every job owns `{root}/incomplete/{job_id}/` while in flight; final
/// outputs land under `{root}/complete/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory for all job artifacts.
    #[serde(default = "default_root")]
    pub root: String,
    /// Job creation is rejected when free space drops below this many GiB.
    #[serde(default = "default_min_free_space_gb")]
    pub min_free_space_gb: u64,
}

impl MediaConfig {
    /// Work-in-progress directory for a job.
    pub fn incomplete_dir(&self, job_id: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.root).join("incomplete").join(job_id)
    }

    /// Directory for finished outputs.
    pub fn complete_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.root).join("complete")
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            min_free_space_gb: default_min_free_space_gb(),
        }
    }
}

fn default_root() -> String {
    "data/media".to_string()
}

fn default_min_free_space_gb() -> u64 {
    5
}

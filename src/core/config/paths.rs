use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::PipelineError;

const DB_FILE: &str = "qa_pipeline.db";

/// Filesystem locations used by the pipeline: where `config.yml` is looked up,
/// where the row database and logs live.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    /// Discover locations from the process environment and create the data dirs.
    pub fn new() -> Result<Self, PipelineError> {
        Self::discover(|key| env::var(key).ok())
    }

    /// `QA_PIPELINE_ROOT` and `QA_PIPELINE_DATA_DIR` override the defaults.
    pub fn discover<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_root = lookup("QA_PIPELINE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(default_project_root);
        let user_data_dir = match lookup("QA_PIPELINE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None if cfg!(debug_assertions) => project_root.join(".qa_pipeline"),
            None => platform_data_dir(&lookup),
        };
        Self::with_data_dir(project_root, user_data_dir)
    }

    /// Build paths rooted at explicit directories, creating the data and log dirs.
    pub fn with_data_dir(
        project_root: PathBuf,
        user_data_dir: PathBuf,
    ) -> Result<Self, PipelineError> {
        let log_dir = user_data_dir.join("logs");
        for dir in [&user_data_dir, &log_dir] {
            fs::create_dir_all(dir).map_err(|err| {
                PipelineError::Config(format!("Failed to create {}: {err}", dir.display()))
            })?;
        }

        Ok(AppPaths {
            db_path: user_data_dir.join(DB_FILE),
            project_root,
            user_data_dir,
            log_dir,
        })
    }

    /// Resolve a user-supplied path: absolute and cwd-relative paths that exist
    /// are kept, anything else is taken relative to the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        self.project_root.join(path)
    }
}

fn default_project_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }
    env::current_dir().unwrap_or(manifest_dir)
}

fn platform_data_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let home = lookup("HOME")
        .or_else(|| lookup("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    lookup("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".local").join("share"))
        .join("qa-pipeline")
}

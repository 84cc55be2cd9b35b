//! # Executor Module
//!
//! Hands a cached image to the user's wallpaper script.
//!
//! The script receives the image path as its only argument. A non-zero exit
//! is an error; the cache state is left for the caller to decide on.

use crate::error::ExecutorError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Applies an image as the desktop wallpaper
pub trait Executor: Send + Sync {
    fn run(&self, image: &Path) -> Result<(), ExecutorError>;
}

/// Runs an external script with the image path as its argument
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    script: PathBuf,
}

impl ScriptExecutor {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

impl Executor for ScriptExecutor {
    fn run(&self, image: &Path) -> Result<(), ExecutorError> {
        if !self.script.is_file() {
            return Err(ExecutorError::ScriptNotFound {
                path: self.script.clone(),
            });
        }

        debug!(
            script = %self.script.display(),
            image = %image.display(),
            "Running wallpaper script"
        );
        let status = Command::new(&self.script)
            .arg(image)
            .status()
            .map_err(|source| ExecutorError::Spawn {
                path: self.script.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ExecutorError::Failed {
                path: self.script.clone(),
                status: status.to_string(),
            });
        }
        info!(image = %image.display(), "Wallpaper applied");
        Ok(())
    }
}

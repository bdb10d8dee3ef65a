//! Checkpoint manager for automatic rotation and best model tracking.

use std::fs;
use std::path::{Path, PathBuf};

use super::io::{load_checkpoint, save_checkpoint};
use super::state::{ModelState, OptimizerState};
use crate::compress::CompressionScheduler;
use crate::Result;

/// Configuration for checkpoint management.
#[derive(Clone, Debug)]
pub struct CheckpointConfig {
    /// Directory to store checkpoints
    pub checkpoint_dir: PathBuf,
    /// Save a checkpoint every N epochs
    pub save_every: u64,
    /// Keep only the last N epoch-tagged checkpoints (0 = keep all)
    pub keep_last: usize,
    /// Also maintain a "best" checkpoint based on top-1 accuracy
    pub save_best: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoints"),
            save_every: 10,
            keep_last: 5,
            save_best: true,
        }
    }
}

impl CheckpointConfig {
    /// Create a new config with the given directory.
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    /// Set save frequency.
    pub fn save_every(mut self, epochs: u64) -> Self {
        self.save_every = epochs;
        self
    }

    /// Set number of checkpoints to keep.
    pub fn keep_last(mut self, n: usize) -> Self {
        self.keep_last = n;
        self
    }

    /// Enable/disable best checkpoint tracking.
    pub fn save_best(mut self, enabled: bool) -> Self {
        self.save_best = enabled;
        self
    }
}

/// Manages checkpoint lifecycle.
///
/// Handles epoch-tagged saving, loading, rotation, and best checkpoint
/// tracking on top of `save_checkpoint` / `load_checkpoint`.
///
/// # Example
///
/// ```ignore
/// let config = CheckpointConfig::new("./checkpoints")
///     .save_every(10)
///     .keep_last(3)
///     .save_best(true);
///
/// let mut manager = CheckpointManager::new(config);
///
/// // In the training loop:
/// manager.maybe_save(epoch, "resnet18", &model, &optimizer, Some(&scheduler), Some(top1))?;
///
/// // To resume:
/// if let Some((scheduler, start_epoch)) = manager.load_latest(&mut model, None)? {
///     println!("Resuming at epoch {}", start_epoch);
/// }
/// ```
pub struct CheckpointManager {
    config: CheckpointConfig,
    best_top1: f64,
}

impl CheckpointManager {
    /// Create a new checkpoint manager.
    pub fn new(config: CheckpointConfig) -> Self {
        if let Err(e) = fs::create_dir_all(&config.checkpoint_dir) {
            tracing::warn!("Failed to create checkpoint directory: {}", e);
        }

        Self {
            config,
            best_top1: f64::NEG_INFINITY,
        }
    }

    /// Get the checkpoint directory path.
    pub fn checkpoint_dir(&self) -> &Path {
        &self.config.checkpoint_dir
    }

    /// Save a checkpoint if conditions are met (epoch divisible by save_every).
    ///
    /// Returns the path to the saved checkpoint, or None if no save was
    /// performed.
    pub fn maybe_save<M, O>(
        &mut self,
        epoch: u64,
        arch: &str,
        model: &M,
        optimizer: &O,
        scheduler: Option<&CompressionScheduler>,
        top1: Option<f64>,
    ) -> Result<Option<PathBuf>>
    where
        M: ModelState,
        O: OptimizerState,
    {
        if epoch == 0 || epoch % self.config.save_every != 0 {
            return Ok(None);
        }

        self.save(epoch, arch, model, optimizer, scheduler, top1)
            .map(Some)
    }

    /// Force save a checkpoint regardless of epoch.
    pub fn save<M, O>(
        &mut self,
        epoch: u64,
        arch: &str,
        model: &M,
        optimizer: &O,
        scheduler: Option<&CompressionScheduler>,
        top1: Option<f64>,
    ) -> Result<PathBuf>
    where
        M: ModelState,
        O: OptimizerState,
    {
        let prefix = self.config.checkpoint_dir.join(format!("epoch_{:06}", epoch));
        let name = prefix.to_string_lossy().into_owned();

        save_checkpoint(epoch, arch, model, optimizer, scheduler, top1, false, Some(&name))?;

        let path = PathBuf::from(format!("{}_checkpoint.pth.tar", name));
        tracing::info!(path = %path.display(), epoch, "Saved checkpoint");

        if let Some(top1) = top1 {
            if self.config.save_best && top1 > self.best_top1 {
                self.best_top1 = top1;
                let best_path = self.config.checkpoint_dir.join("best.pth.tar");
                fs::copy(&path, &best_path)?;
                tracing::info!(top1, "New best checkpoint!");
            }
        }

        if self.config.keep_last > 0 {
            self.cleanup_old_checkpoints()?;
        }

        Ok(path)
    }

    /// Load the latest epoch-tagged checkpoint.
    ///
    /// Returns the reconstructed scheduler and start epoch, or None if no
    /// checkpoints exist.
    pub fn load_latest<M: ModelState>(
        &self,
        model: &mut M,
        optimizer: Option<&mut dyn OptimizerState>,
    ) -> Result<Option<(Option<CompressionScheduler>, u64)>> {
        match self.find_latest_checkpoint()? {
            Some(path) => {
                let epoch = Self::extract_epoch_from_path(&path);
                tracing::debug!(path = %path.display(), epoch, "Resuming from latest checkpoint");
                load_checkpoint(model, &path, optimizer).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Load the best checkpoint.
    ///
    /// Returns the load result, or None if no best checkpoint exists.
    pub fn load_best<M: ModelState>(
        &self,
        model: &mut M,
        optimizer: Option<&mut dyn OptimizerState>,
    ) -> Result<Option<(Option<CompressionScheduler>, u64)>> {
        let best_path = self.config.checkpoint_dir.join("best.pth.tar");
        if best_path.is_file() {
            load_checkpoint(model, &best_path, optimizer).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Find the latest epoch-tagged checkpoint file.
    fn find_latest_checkpoint(&self) -> Result<Option<PathBuf>> {
        let mut checkpoints = self.list_checkpoints()?;
        Ok(checkpoints.pop())
    }

    /// List all epoch-tagged checkpoint files in epoch order.
    pub fn list_checkpoints(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.config.checkpoint_dir) {
            Ok(e) => e,
            Err(_) => return Ok(Vec::new()),
        };

        let mut checkpoints: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("epoch_") && n.ends_with("_checkpoint.pth.tar"))
                    .unwrap_or(false)
            })
            .collect();

        checkpoints.sort();
        Ok(checkpoints)
    }

    /// Remove old checkpoints, keeping only the last N.
    fn cleanup_old_checkpoints(&self) -> Result<()> {
        let mut checkpoints = self.list_checkpoints()?;

        while checkpoints.len() > self.config.keep_last {
            let old = checkpoints.remove(0);
            if let Err(e) = fs::remove_file(&old) {
                tracing::warn!(path = %old.display(), "Failed to remove old checkpoint: {}", e);
            } else {
                tracing::debug!(path = %old.display(), "Removed old checkpoint");
            }
        }

        Ok(())
    }

    /// Extract the epoch number from an epoch-tagged checkpoint filename.
    fn extract_epoch_from_path(path: &Path) -> u64 {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix("_checkpoint.pth.tar"))
            .and_then(|n| n.strip_prefix("epoch_"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

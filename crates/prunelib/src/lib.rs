//! # Prunelib
//!
//! Compression-aware training checkpoints in Rust.
//!
//! ## Overview
//!
//! Prunelib provides:
//! - `save_checkpoint` / `load_checkpoint` for persisting and resuming training state
//! - Capability traits (`ModelState`, `OptimizerState`) for pluggable models and optimizers
//! - A `CompressionScheduler` whose pruning masks ride along in checkpoints
//! - Thinning recipes that physically remove pruned structure on resume
//! - `CheckpointManager` for checkpoint rotation and best-model tracking
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prunelib::prelude::*;
//!
//! // At the end of an epoch:
//! save_checkpoint(epoch, "resnet18", &model, &optimizer, Some(&scheduler),
//!                 Some(top1), is_best, Some("run1"))?;
//!
//! // To resume:
//! let (scheduler, start_epoch) =
//!     load_checkpoint(&mut model, "run1_checkpoint.pth.tar", Some(&mut optimizer))?;
//! ```

pub mod checkpoint;
pub mod compress;
pub mod log;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{
        load_checkpoint, save_checkpoint, CheckpointConfig, CheckpointManager, CheckpointRecord,
        ModelState, OptimizerState, StateDict,
    };
    pub use crate::compress::{
        execute_thinning_recipe, magnitude_mask, CompressionScheduler, SchedulerState,
        ThinningDirective, ThinningRecipe,
    };
}

use std::path::PathBuf;

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum PruneError {
    #[error("No checkpoint found at {0}")]
    CheckpointNotFound(PathBuf),

    #[error("Missing parameter in state dict: {0}")]
    MissingParameter(String),

    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Thinning recipe error: {0}")]
    RecipeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializeError(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, PruneError>;

//! Save and load functions for training checkpoints.
//!
//! Carrying the schedule information in the checkpoint makes it possible to
//! resume a pruning session, or to query the pruning schedule of a sparse
//! model.

use std::fs;
use std::path::{Path, PathBuf};

use super::record::CheckpointRecord;
use super::state::{ModelState, OptimizerState};
use crate::compress::{execute_thinning_recipe, CompressionScheduler};
use crate::{PruneError, Result};

/// Primary and best filenames for a checkpoint name prefix.
fn checkpoint_filenames(name: Option<&str>) -> (PathBuf, PathBuf) {
    match name {
        Some(n) => (
            PathBuf::from(format!("{}_checkpoint.pth.tar", n)),
            PathBuf::from(format!("{}_best.pth.tar", n)),
        ),
        None => (
            PathBuf::from("checkpoint.pth.tar"),
            PathBuf::from("best.pth.tar"),
        ),
    }
}

/// Save a training checkpoint.
///
/// # Arguments
///
/// * `epoch` - current epoch
/// * `arch` - name of the network architecture/topology
/// * `model` - the model being trained
/// * `optimizer` - the optimizer used in the training session
/// * `scheduler` - the `CompressionScheduler` used for training, if any
/// * `best_top1` - the best top-1 score seen so far
/// * `is_best` - true if this is the best (top-1 accuracy) model so far
/// * `name` - filename prefix for the checkpoint files
///
/// Writes `{name}_checkpoint.pth.tar` (or `checkpoint.pth.tar` with no name)
/// and, when `is_best`, a byte-identical copy under `{name}_best.pth.tar`.
#[allow(clippy::too_many_arguments)]
pub fn save_checkpoint<M, O>(
    epoch: u64,
    arch: &str,
    model: &M,
    optimizer: &O,
    scheduler: Option<&CompressionScheduler>,
    best_top1: Option<f64>,
    is_best: bool,
    name: Option<&str>,
) -> Result<()>
where
    M: ModelState,
    O: OptimizerState,
{
    tracing::info!("Saving checkpoint");
    let (filename, filename_best) = checkpoint_filenames(name);

    let mut record =
        CheckpointRecord::new(epoch, arch, model.export_state(), optimizer.export_state());
    if let Some(best) = best_top1 {
        record = record.with_best_top1(best);
    }
    if let Some(sched) = scheduler {
        record = record.with_compression_sched(sched.state());
    }
    // The recipe rides along whenever the model carries one, schedule or not.
    if let Some(recipe) = model.thinning_recipe() {
        record = record.with_thinning_recipe(recipe.clone());
    }

    fs::write(&filename, record.encode()?)?;
    if is_best {
        fs::copy(&filename, &filename_best)?;
    }
    Ok(())
}

/// Load a training checkpoint.
///
/// Restores the model parameters in place. If the record carries a
/// compression schedule, a fresh scheduler is reconstructed and its state
/// restored; a thinning recipe in the record is then executed against the
/// model before the parameter values are loaded, so the saved shapes fit.
/// A recipe is only executed when a schedule was restored; its mask-table
/// side-input does not exist otherwise.
///
/// When an optimizer is passed, its serialized state is restored as well.
///
/// Returns the reconstructed scheduler (or `None`) and the epoch to resume
/// from, which is the saved epoch plus one.
pub fn load_checkpoint<M>(
    model: &mut M,
    chkpt_file: impl AsRef<Path>,
    optimizer: Option<&mut dyn OptimizerState>,
) -> Result<(Option<CompressionScheduler>, u64)>
where
    M: ModelState,
{
    let path = chkpt_file.as_ref();
    if !path.is_file() {
        tracing::error!("no checkpoint found at {}", path.display());
        return Err(PruneError::CheckpointNotFound(path.to_path_buf()));
    }

    tracing::info!("=> loading checkpoint {}", path.display());
    let bytes = fs::read(path)?;
    let record = CheckpointRecord::decode(&bytes)?;
    let start_epoch = record.epoch + 1;

    if let Some(best) = record.best_top1 {
        tracing::info!("   best top@1: {:.3}", best);
    }

    let scheduler = match record.compression_sched {
        Some(sched_state) => {
            let mut scheduler = CompressionScheduler::new(model);
            scheduler.load_state(sched_state);
            tracing::info!(
                "Loaded compression schedule from checkpoint (epoch {})",
                record.epoch
            );

            if let Some(recipe) = &record.thinning_recipe {
                tracing::info!("Loaded a thinning recipe from the checkpoint");
                execute_thinning_recipe(model, scheduler.zero_masks_mut(), recipe)?;
            }
            Some(scheduler)
        }
        None => {
            tracing::warn!("compression schedule data does not exist in the checkpoint");
            tracing::info!(
                "=> loaded checkpoint '{}' (epoch {})",
                path.display(),
                record.epoch
            );
            None
        }
    };

    model.load_state(&record.state_dict)?;

    if let Some(opt) = optimizer {
        opt.load_state(&record.optimizer)?;
        tracing::info!("Restored optimizer state from checkpoint");
    }

    Ok((scheduler, start_epoch))
}

//! On-disk checkpoint record.

use serde::{Deserialize, Serialize};

use super::state::StateDict;
use crate::compress::{SchedulerState, ThinningRecipe};
use crate::Result;

/// Complete training checkpoint record.
///
/// This struct contains everything needed to resume a training session,
/// including the pruning schedule of a sparse model. It exists only for the
/// duration of a save or load call.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CheckpointRecord {
    /// Training epoch at capture time
    pub epoch: u64,
    /// Name of the network architecture/topology
    pub arch: String,
    /// Model parameter values
    pub state_dict: StateDict,
    /// Best top-1 validation accuracy seen so far
    pub best_top1: Option<f64>,
    /// Optimizer internal state
    pub optimizer: StateDict,
    /// Serialized pruning-compression schedule, if one was in use
    pub compression_sched: Option<SchedulerState>,
    /// Instructions for removing pruned structure, if the model was thinned
    pub thinning_recipe: Option<ThinningRecipe>,
}

impl CheckpointRecord {
    /// Create a new record with the required fields.
    pub fn new(
        epoch: u64,
        arch: impl Into<String>,
        state_dict: StateDict,
        optimizer: StateDict,
    ) -> Self {
        Self {
            epoch,
            arch: arch.into(),
            state_dict,
            best_top1: None,
            optimizer,
            compression_sched: None,
            thinning_recipe: None,
        }
    }

    /// Set the best top-1 accuracy.
    pub fn with_best_top1(mut self, best_top1: f64) -> Self {
        self.best_top1 = Some(best_top1);
        self
    }

    /// Set the compression schedule state.
    pub fn with_compression_sched(mut self, sched: SchedulerState) -> Self {
        self.compression_sched = Some(sched);
        self
    }

    /// Set the thinning recipe.
    pub fn with_thinning_recipe(mut self, recipe: ThinningRecipe) -> Self {
        self.thinning_recipe = Some(recipe);
        self
    }

    /// Serialize the record to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a record from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

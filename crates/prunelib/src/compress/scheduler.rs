//! Compression scheduler and its zero-mask table.

use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{ModelState, StateDict};
use crate::{PruneError, Result};

/// Serialized scheduler state, as stored in a checkpoint record.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SchedulerState {
    /// Zero-mask per parameter name
    pub masks: StateDict,
}

/// Tracks the zero-masks of a pruning session.
///
/// The scheduler is bound to a model at construction: every exported
/// parameter starts with an all-ones mask. Pruning decisions replace masks
/// via `set_mask`, and `apply_masks` multiplies each parameter by its mask.
/// The mask table is the side-input to thinning recipe execution.
#[derive(Debug)]
pub struct CompressionScheduler {
    masks: StateDict,
}

impl CompressionScheduler {
    /// Create a scheduler bound to `model`, with identity masks.
    pub fn new<M: ModelState>(model: &M) -> Self {
        let masks = model
            .export_state()
            .into_iter()
            .map(|(name, param)| (name, ArrayD::ones(param.raw_dim())))
            .collect();
        Self { masks }
    }

    /// Export the scheduler's internal state.
    pub fn state(&self) -> SchedulerState {
        SchedulerState {
            masks: self.masks.clone(),
        }
    }

    /// Restore the scheduler's internal state.
    pub fn load_state(&mut self, state: SchedulerState) {
        self.masks = state.masks;
    }

    /// Install a mask for a parameter.
    pub fn set_mask(&mut self, name: impl Into<String>, mask: ArrayD<f32>) {
        self.masks.insert(name.into(), mask);
    }

    /// The mask for a parameter, if one is tracked.
    pub fn mask(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.masks.get(name)
    }

    /// The zero-mask table.
    pub fn zero_masks(&self) -> &StateDict {
        &self.masks
    }

    /// Mutable access to the zero-mask table.
    pub fn zero_masks_mut(&mut self) -> &mut StateDict {
        &mut self.masks
    }

    /// Multiply every masked parameter by its mask, in place.
    ///
    /// Parameters without a tracked mask are left untouched. A mask whose
    /// shape no longer matches its parameter is an error.
    pub fn apply_masks<M: ModelState>(&self, model: &mut M) -> Result<()> {
        let mut state = model.export_state();
        for (name, param) in state.iter_mut() {
            if let Some(mask) = self.masks.get(name) {
                if mask.shape() != param.shape() {
                    return Err(PruneError::ShapeMismatch {
                        name: name.clone(),
                        expected: param.shape().to_vec(),
                        actual: mask.shape().to_vec(),
                    });
                }
                Zip::from(param).and(mask).for_each(|p, &m| *p *= m);
            }
        }
        model.load_state(&state)
    }
}

/// Mask that zeroes the smallest-magnitude `sparsity` fraction of `param`.
///
/// `sparsity` is clamped to `[0, 1]`; ties at the threshold magnitude are
/// all zeroed.
pub fn magnitude_mask(param: &ArrayD<f32>, sparsity: f64) -> ArrayD<f32> {
    let count = (param.len() as f64 * sparsity).floor() as usize;
    if count == 0 {
        return ArrayD::ones(param.raw_dim());
    }

    let mut magnitudes: Vec<f32> = param.iter().map(|v| v.abs()).collect();
    magnitudes.sort_by(|a, b| a.total_cmp(b));
    let threshold = magnitudes[count.min(magnitudes.len()) - 1];

    param.mapv(|v| if v.abs() <= threshold { 0.0 } else { 1.0 })
}

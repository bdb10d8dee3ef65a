//! Thinning recipes: physical removal of pruned structure.

use std::collections::HashMap;

use ndarray::{ArrayD, Axis};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{ModelState, StateDict};
use crate::{PruneError, Result};

/// Which slices of a parameter survive thinning.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ThinningDirective {
    /// Axis the structure is removed along
    pub axis: usize,
    /// Indices retained along that axis, in order
    pub keep: Vec<usize>,
}

/// Instructions for removing pruned structure from a model.
///
/// A recipe is produced when a pruning session physically shrinks a model;
/// it is saved in the checkpoint so that resuming into a freshly built
/// (unthinned) model can reproduce the same shapes before loading weights.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ThinningRecipe {
    /// Directive per parameter name
    pub parameters: HashMap<String, ThinningDirective>,
}

impl ThinningRecipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive retaining `keep` indices of `name` along `axis`.
    pub fn retain(mut self, name: impl Into<String>, axis: usize, keep: Vec<usize>) -> Self {
        self.parameters
            .insert(name.into(), ThinningDirective { axis, keep });
        self
    }
}

/// Select the retained indices of `array` along the directive's axis.
fn thin_array(name: &str, array: &ArrayD<f32>, directive: &ThinningDirective) -> Result<ArrayD<f32>> {
    if directive.axis >= array.ndim() {
        return Err(PruneError::RecipeError(format!(
            "axis {} out of bounds for {} with {} dims",
            directive.axis,
            name,
            array.ndim()
        )));
    }
    let len = array.shape()[directive.axis];
    if let Some(&bad) = directive.keep.iter().find(|&&i| i >= len) {
        return Err(PruneError::RecipeError(format!(
            "index {} out of bounds for {} along axis {} (len {})",
            bad, name, directive.axis, len
        )));
    }
    Ok(array
        .select(Axis(directive.axis), &directive.keep)
        .as_standard_layout()
        .to_owned())
}

/// Execute a thinning recipe against `model`, mutating its structure.
///
/// Every directive shrinks the named parameter to its retained indices. The
/// matching entry in `zeros_mask` is shrunk the same way, but only while its
/// shape still matches the pre-thinned parameter; a mask restored from an
/// already-thinned session is left as is.
pub fn execute_thinning_recipe<M: ModelState>(
    model: &mut M,
    zeros_mask: &mut StateDict,
    recipe: &ThinningRecipe,
) -> Result<()> {
    let mut state = model.export_state();
    for (name, directive) in &recipe.parameters {
        let param = state
            .get(name)
            .ok_or_else(|| PruneError::MissingParameter(name.clone()))?;
        let original_shape = param.shape().to_vec();
        let thinned = thin_array(name, param, directive)?;

        if let Some(mask) = zeros_mask.get(name) {
            if mask.shape() == original_shape.as_slice() {
                let thinned_mask = thin_array(name, mask, directive)?;
                zeros_mask.insert(name.clone(), thinned_mask);
            }
        }

        tracing::debug!(
            "Thinned {} along axis {} to {} indices",
            name,
            directive.axis,
            directive.keep.len()
        );
        state.insert(name.clone(), thinned);
    }
    model.load_state(&state)
}

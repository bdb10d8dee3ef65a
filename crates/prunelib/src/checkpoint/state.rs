//! State-export traits for checkpointable components.

use std::collections::HashMap;

use ndarray::ArrayD;

use crate::compress::ThinningRecipe;
use crate::Result;

/// Named parameter tensors, the unit of state exchanged with checkpoints.
///
/// Scalar state (step counters and the like) is representable as 0-d arrays.
pub type StateDict = HashMap<String, ArrayD<f32>>;

/// Trait for models whose parameter state can be exported and restored.
///
/// # Example
///
/// ```ignore
/// impl ModelState for MyNet {
///     fn export_state(&self) -> StateDict {
///         let mut state = StateDict::new();
///         state.insert("fc.weight".into(), self.weight.clone());
///         state
///     }
///
///     fn load_state(&mut self, state: &StateDict) -> Result<()> {
///         self.weight = state
///             .get("fc.weight")
///             .cloned()
///             .ok_or_else(|| PruneError::MissingParameter("fc.weight".into()))?;
///         Ok(())
///     }
/// }
/// ```
pub trait ModelState {
    /// Export the model's parameters as a state dict.
    fn export_state(&self) -> StateDict;

    /// Restore the model's parameters from a state dict, in place.
    fn load_state(&mut self, state: &StateDict) -> Result<()>;

    /// The thinning recipe this model carries, if pruned structure has been
    /// physically removed from it.
    fn thinning_recipe(&self) -> Option<&ThinningRecipe> {
        None
    }
}

/// Trait for optimizers whose internal state can be exported and restored.
pub trait OptimizerState {
    /// Export the optimizer's internal state as a state dict.
    fn export_state(&self) -> StateDict;

    /// Restore the optimizer's internal state from a state dict, in place.
    fn load_state(&mut self, state: &StateDict) -> Result<()>;
}

//! Pruning-compression schedule state and thinning recipes.

mod scheduler;
mod thinning;

pub use scheduler::{magnitude_mask, CompressionScheduler, SchedulerState};
pub use thinning::{execute_thinning_recipe, ThinningDirective, ThinningRecipe};

//! End-to-end save/load tests against real files.

use std::fs;

use ndarray::{ArrayD, IxDyn};
use tempfile::tempdir;

use prunelib::prelude::*;
use prunelib::{PruneError, Result};

/// Two-parameter model with an optional thinning recipe attached.
struct ToyModel {
    weight: ArrayD<f32>,
    bias: ArrayD<f32>,
    recipe: Option<ThinningRecipe>,
}

impl ToyModel {
    fn new(weight: ArrayD<f32>, bias: ArrayD<f32>) -> Self {
        Self {
            weight,
            bias,
            recipe: None,
        }
    }

    fn fresh(rows: usize, cols: usize) -> Self {
        Self::new(
            ArrayD::zeros(IxDyn(&[rows, cols])),
            ArrayD::zeros(IxDyn(&[rows])),
        )
    }
}

impl ModelState for ToyModel {
    fn export_state(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("fc.weight".to_string(), self.weight.clone());
        state.insert("fc.bias".to_string(), self.bias.clone());
        state
    }

    fn load_state(&mut self, state: &StateDict) -> Result<()> {
        self.weight = state
            .get("fc.weight")
            .cloned()
            .ok_or_else(|| PruneError::MissingParameter("fc.weight".to_string()))?;
        self.bias = state
            .get("fc.bias")
            .cloned()
            .ok_or_else(|| PruneError::MissingParameter("fc.bias".to_string()))?;
        Ok(())
    }

    fn thinning_recipe(&self) -> Option<&ThinningRecipe> {
        self.recipe.as_ref()
    }
}

/// Momentum-style optimizer: one velocity tensor per parameter plus a 0-d
/// step counter.
struct ToyOptimizer {
    velocity: ArrayD<f32>,
    step: f32,
}

impl OptimizerState for ToyOptimizer {
    fn export_state(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("fc.weight.velocity".to_string(), self.velocity.clone());
        state.insert(
            "step".to_string(),
            ArrayD::from_elem(IxDyn(&[]), self.step),
        );
        state
    }

    fn load_state(&mut self, state: &StateDict) -> Result<()> {
        self.velocity = state
            .get("fc.weight.velocity")
            .cloned()
            .ok_or_else(|| PruneError::MissingParameter("fc.weight.velocity".to_string()))?;
        self.step = state
            .get("step")
            .ok_or_else(|| PruneError::MissingParameter("step".to_string()))?
            .iter()
            .copied()
            .next()
            .unwrap_or(0.0);
        Ok(())
    }
}

fn trained_model() -> ToyModel {
    ToyModel::new(
        ArrayD::from_shape_vec(
            IxDyn(&[2, 3]),
            vec![0.5, -1.25, 3.75, 0.0625, -0.001, 42.0],
        )
        .unwrap(),
        ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.125, -7.5]).unwrap(),
    )
}

fn trained_optimizer() -> ToyOptimizer {
    ToyOptimizer {
        velocity: ArrayD::from_shape_vec(
            IxDyn(&[2, 3]),
            vec![0.01, -0.02, 0.03, -0.04, 0.05, -0.06],
        )
        .unwrap(),
        step: 1234.0,
    }
}

fn read_record(path: impl AsRef<std::path::Path>) -> CheckpointRecord {
    CheckpointRecord::decode(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn round_trip_restores_state_dict_bitwise() {
    prunelib::log::init_logging();
    let dir = tempdir().unwrap();
    let name = dir.path().join("trip").to_string_lossy().into_owned();

    let model = trained_model();
    let optim = trained_optimizer();
    save_checkpoint(3, "resnet18", &model, &optim, None, None, false, Some(&name)).unwrap();

    let mut restored = ToyModel::fresh(2, 3);
    let (scheduler, start_epoch) = load_checkpoint(
        &mut restored,
        format!("{}_checkpoint.pth.tar", name),
        None,
    )
    .unwrap();

    assert!(scheduler.is_none());
    assert_eq!(start_epoch, 4);
    assert_eq!(restored.weight, model.weight);
    assert_eq!(restored.bias, model.bias);
}

#[test]
fn start_epoch_is_saved_epoch_plus_one() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("epochs").to_string_lossy().into_owned();
    let optim = trained_optimizer();

    for epoch in [0u64, 1, 99] {
        let model = trained_model();
        save_checkpoint(epoch, "mlp", &model, &optim, None, None, false, Some(&name)).unwrap();

        let mut restored = ToyModel::fresh(2, 3);
        let (_, start_epoch) =
            load_checkpoint(&mut restored, format!("{}_checkpoint.pth.tar", name), None).unwrap();
        assert_eq!(start_epoch, epoch + 1);
    }
}

#[test]
fn no_scheduler_means_no_schedule_in_record() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("nosched").to_string_lossy().into_owned();

    let model = trained_model();
    let optim = trained_optimizer();
    save_checkpoint(7, "mlp", &model, &optim, None, None, false, Some(&name)).unwrap();

    let record = read_record(format!("{}_checkpoint.pth.tar", name));
    assert!(record.compression_sched.is_none());

    let mut restored = ToyModel::fresh(2, 3);
    let (scheduler, _) =
        load_checkpoint(&mut restored, format!("{}_checkpoint.pth.tar", name), None).unwrap();
    assert!(scheduler.is_none());
}

#[test]
fn best_file_is_byte_identical_to_primary() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("champion").to_string_lossy().into_owned();

    let model = trained_model();
    let optim = trained_optimizer();
    save_checkpoint(12, "vgg16", &model, &optim, None, Some(74.1), true, Some(&name)).unwrap();

    let primary = fs::read(format!("{}_checkpoint.pth.tar", name)).unwrap();
    let best = fs::read(format!("{}_best.pth.tar", name)).unwrap();
    assert_eq!(primary, best);
}

#[test]
fn missing_file_is_a_typed_error_and_leaves_model_unmodified() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nothing_checkpoint.pth.tar");

    let mut model = trained_model();
    let before_weight = model.weight.clone();
    let before_bias = model.bias.clone();

    let err = load_checkpoint(&mut model, &missing, None).unwrap_err();
    assert!(matches!(err, PruneError::CheckpointNotFound(ref p) if p == &missing));
    assert_eq!(model.weight, before_weight);
    assert_eq!(model.bias, before_bias);
}

#[test]
fn recipe_is_saved_even_without_a_scheduler() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("recipe_only").to_string_lossy().into_owned();

    let mut model = trained_model();
    model.recipe = Some(ThinningRecipe::new().retain("fc.weight", 1, vec![0, 2]));
    let optim = trained_optimizer();

    save_checkpoint(2, "mlp", &model, &optim, None, None, false, Some(&name)).unwrap();

    let record = read_record(format!("{}_checkpoint.pth.tar", name));
    assert!(record.compression_sched.is_none());
    assert_eq!(record.thinning_recipe, model.recipe);
}

#[test]
fn run1_scenario_writes_both_files_with_expected_fields() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("run1").to_string_lossy().into_owned();

    let model = trained_model();
    let optim = trained_optimizer();
    save_checkpoint(5, "resnet18", &model, &optim, None, Some(71.2), true, Some(&name)).unwrap();

    for path in [
        format!("{}_checkpoint.pth.tar", name),
        format!("{}_best.pth.tar", name),
    ] {
        let record = read_record(&path);
        assert_eq!(record.epoch, 5);
        assert_eq!(record.arch, "resnet18");
        assert_eq!(record.best_top1, Some(71.2));
        assert!(record.compression_sched.is_none());
    }
}

#[test]
fn optimizer_state_round_trips() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("optim").to_string_lossy().into_owned();

    let model = trained_model();
    let optim = trained_optimizer();
    save_checkpoint(8, "mlp", &model, &optim, None, None, false, Some(&name)).unwrap();

    let mut restored_model = ToyModel::fresh(2, 3);
    let mut restored_optim = ToyOptimizer {
        velocity: ArrayD::zeros(IxDyn(&[2, 3])),
        step: 0.0,
    };
    load_checkpoint(
        &mut restored_model,
        format!("{}_checkpoint.pth.tar", name),
        Some(&mut restored_optim),
    )
    .unwrap();

    assert_eq!(restored_optim.velocity, optim.velocity);
    assert_eq!(restored_optim.step, 1234.0);
}

#[test]
fn schedule_round_trips_through_checkpoint() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("sched").to_string_lossy().into_owned();

    let model = trained_model();
    let optim = trained_optimizer();
    let mut scheduler = CompressionScheduler::new(&model);
    scheduler.set_mask("fc.weight", magnitude_mask(&model.weight, 0.5));

    save_checkpoint(4, "mlp", &model, &optim, Some(&scheduler), None, false, Some(&name)).unwrap();

    let mut restored = ToyModel::fresh(2, 3);
    let (restored_scheduler, start_epoch) =
        load_checkpoint(&mut restored, format!("{}_checkpoint.pth.tar", name), None).unwrap();

    let restored_scheduler = restored_scheduler.unwrap();
    assert_eq!(start_epoch, 5);
    assert_eq!(
        restored_scheduler.mask("fc.weight"),
        scheduler.mask("fc.weight")
    );
}

#[test]
fn thinning_recipe_is_applied_when_schedule_is_present() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("thinned").to_string_lossy().into_owned();

    // A session that already thinned fc.weight from 2x3 down to columns 0 and 2.
    let mut thinned_model = ToyModel::new(
        ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.5, 3.75, 0.0625, 42.0]).unwrap(),
        ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.125, -7.5]).unwrap(),
    );
    thinned_model.recipe = Some(ThinningRecipe::new().retain("fc.weight", 1, vec![0, 2]));
    let scheduler = CompressionScheduler::new(&thinned_model);
    let optim = trained_optimizer();

    save_checkpoint(
        9,
        "mlp",
        &thinned_model,
        &optim,
        Some(&scheduler),
        None,
        false,
        Some(&name),
    )
    .unwrap();

    // Resuming into a freshly built, unthinned model reproduces the shapes.
    let mut fresh = ToyModel::fresh(2, 3);
    let (restored_scheduler, _) =
        load_checkpoint(&mut fresh, format!("{}_checkpoint.pth.tar", name), None).unwrap();

    assert_eq!(fresh.weight.shape(), &[2, 2]);
    assert_eq!(fresh.weight, thinned_model.weight);

    let restored_scheduler = restored_scheduler.unwrap();
    assert_eq!(restored_scheduler.mask("fc.weight").unwrap().shape(), &[2, 2]);
}

#[test]
fn recipe_without_schedule_loads_weights_without_thinning() {
    let dir = tempdir().unwrap();
    let name = dir.path().join("dormant").to_string_lossy().into_owned();

    let mut model = trained_model();
    model.recipe = Some(ThinningRecipe::new().retain("fc.weight", 1, vec![0, 2]));
    let optim = trained_optimizer();

    save_checkpoint(6, "mlp", &model, &optim, None, None, false, Some(&name)).unwrap();

    let mut restored = ToyModel::fresh(2, 3);
    let (scheduler, _) =
        load_checkpoint(&mut restored, format!("{}_checkpoint.pth.tar", name), None).unwrap();

    // No schedule in the record: the recipe stays dormant and the weights
    // come back at their saved shape.
    assert!(scheduler.is_none());
    assert_eq!(restored.weight.shape(), &[2, 3]);
    assert_eq!(restored.weight, model.weight);
}

#[test]
fn default_name_uses_fixed_filenames() {
    let dir = tempdir().unwrap();
    let cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let model = trained_model();
    let optim = trained_optimizer();
    let saved = save_checkpoint(1, "mlp", &model, &optim, None, None, true, None);

    let primary_exists = dir.path().join("checkpoint.pth.tar").is_file();
    let best_exists = dir.path().join("best.pth.tar").is_file();
    std::env::set_current_dir(cwd).unwrap();

    saved.unwrap();
    assert!(primary_exists);
    assert!(best_exists);
}

//! Batch stages: corpus preprocessing, training, single-clip inference.

use crate::classifier::ZoneClassifier;
use crate::clip::{read_hit_frame, ClipProcessor};
use crate::config::PipelineConfig;
use crate::court::{Zone, ZONE_COLUMNS, ZONE_COUNT, ZONE_ROWS};
use crate::dataset::{self, Samples};
use crate::error::{Error, Result};
use crate::features::FEATURE_DIM;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};

/// Size and seed of the stand-in corpus used when no clips are available.
pub const SYNTHETIC_SAMPLES: usize = 100;
pub const SYNTHETIC_SEED: u64 = 0;

pub const TRAIN_SPLIT: &str = "train";
pub const VAL_SPLIT: &str = "val";

fn save_splits(samples: &Samples, out_dir: &Path, train_fraction: f64) -> Result<(usize, usize)> {
    let (train, val) = samples.split(train_fraction);

    train.save(out_dir, TRAIN_SPLIT)?;
    val.save(out_dir, VAL_SPLIT)?;

    Ok((train.len(), val.len()))
}

/// Extracts features from every clip under `raw_dir` and writes the train/val
/// arrays to `out_dir`. With no clips a synthetic corpus is written instead.
pub fn run_preprocess(raw_dir: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<(usize, usize)> {
    let processor = ClipProcessor::new(config);
    let mut samples = dataset::build_corpus(raw_dir, &processor, config.on_clip_error)?;

    if samples.is_empty() {
        tracing::warn!(
            raw = %raw_dir.display(),
            "no clips found, writing a synthetic dataset of {} samples",
            SYNTHETIC_SAMPLES
        );

        samples = Samples::synthetic(SYNTHETIC_SAMPLES, SYNTHETIC_SEED);
    }

    let (n_train, n_val) = save_splits(&samples, out_dir, config.training.train_fraction)?;
    tracing::info!(train = n_train, val = n_val, out = %out_dir.display(), "dataset written");

    Ok((n_train, n_val))
}

/// Fits the classifier on `data_dir`'s train split, reports accuracy on the
/// val split and persists the model. Returns the validation accuracy.
pub fn run_training(data_dir: &Path, model_path: &Path, config: &PipelineConfig) -> Result<f64> {
    if !Samples::exists(data_dir, TRAIN_SPLIT) {
        tracing::warn!(data = %data_dir.display(), "no training data, generating a synthetic set");

        let samples = Samples::synthetic(SYNTHETIC_SAMPLES, SYNTHETIC_SEED);
        save_splits(&samples, data_dir, config.training.train_fraction)?;
    }

    let train = Samples::load(data_dir, TRAIN_SPLIT)?;
    let val = Samples::load(data_dir, VAL_SPLIT)?;

    let model = ZoneClassifier::fit(train.features.view(), &train.zones()?, &config.training)?;
    let accuracy = model.score(val.features.view(), &val.zones()?)?;

    tracing::info!("val accuracy: {:.3}", accuracy);

    model.save(model_path)?;

    Ok(accuracy)
}

/// Zone probabilities laid out like the court: `cells[row][col]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatGrid {
    pub cells: [[f64; ZONE_COLUMNS as usize]; ZONE_ROWS as usize],
}

impl HeatGrid {
    pub fn from_probabilities(probs: &[f64; ZONE_COUNT]) -> Self {
        let mut cells = [[0.0; ZONE_COLUMNS as usize]; ZONE_ROWS as usize];
        for zone in Zone::all() {
            cells[zone.row() as usize][zone.col() as usize] = probs[zone.id() as usize];
        }

        Self { cells }
    }
}

// far row on top, like looking down the court from the near baseline
impl fmt::Display for HeatGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.cells.iter().enumerate().rev() {
            write!(f, "row {} |", row)?;
            for p in cells {
                write!(f, " {:.3}", p)?;
            }

            if row > 0 {
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Inference {
    pub clip: PathBuf,
    pub hit_frame: usize,
    /// One entry per class the model knows, in the model's class order.
    pub probabilities: Vec<(Zone, f64)>,
    /// Arg-max of `probabilities`.
    pub predicted: Zone,
    /// Zone of the projected ball position, independent of the model.
    pub geometric: Zone,
}

impl Inference {
    /// Probability for every zone id; zones the model never saw get 0.
    pub fn zone_probabilities(&self) -> [f64; ZONE_COUNT] {
        let mut out = [0.0; ZONE_COUNT];
        for &(zone, p) in &self.probabilities {
            out[zone.id() as usize] = p;
        }

        out
    }

    pub fn heat_grid(&self) -> HeatGrid {
        HeatGrid::from_probabilities(&self.zone_probabilities())
    }
}

/// Runs the clip pipeline on one clip and classifies it with a persisted model.
///
/// The hit frame comes from the clip's label file unless `hit_frame` is given.
pub fn infer_clip(
    model_path: &Path,
    clip: &Path,
    hit_frame: Option<usize>,
    config: &PipelineConfig,
) -> Result<Inference> {
    let model = ZoneClassifier::load(model_path)?;

    let hit_frame = match hit_frame {
        Some(f) => f,
        None => read_hit_frame(&dataset::label_path(clip))?,
    };

    let sample = ClipProcessor::new(config).process_at(clip, hit_frame)?;

    let x = Array2::from_shape_vec((1, FEATURE_DIM), sample.features.as_slice().to_vec())?;
    let probs = model.predict_proba(x.view())?;

    let probabilities: Vec<(Zone, f64)> = model
        .classes()
        .iter()
        .copied()
        .zip(probs.row(0).iter().copied())
        .collect();

    let predicted = model
        .predict(x.view())?
        .first()
        .copied()
        .ok_or_else(|| Error::ShapeMismatch("empty prediction".into()))?;

    tracing::info!(
        clip = %clip.display(),
        hit_frame,
        %predicted,
        geometric = %sample.zone,
        "clip classified"
    );

    Ok(Inference {
        clip: clip.to_path_buf(),
        hit_frame,
        probabilities,
        predicted,
        geometric: sample.zone,
    })
}

/// Uniformly random clip from `dir`.
pub fn pick_random_clip<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Result<PathBuf> {
    let clips = dataset::list_clips(dir)?;

    clips
        .choose(rng)
        .cloned()
        .ok_or_else(|| Error::NoClips(dir.to_path_buf()))
}

pub fn run_demo(data_dir: &Path, model_path: &Path, config: &PipelineConfig) -> Result<Inference> {
    let clip = pick_random_clip(data_dir, &mut rand::thread_rng())?;
    tracing::info!("analyzing {}", clip.display());

    infer_clip(model_path, &clip, None, config)
}

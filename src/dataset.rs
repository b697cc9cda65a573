use crate::clip::{ClipProcessor, ClipSample};
use crate::config::ClipErrorPolicy;
use crate::court::{Zone, ZONE_COUNT};
use crate::detector::Detector;
use crate::error::{Error, Result};
use crate::features::FEATURE_DIM;
use ndarray::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::path::{Path, PathBuf};

pub const CLIP_EXTENSION: &str = "mp4";

/// Clips in `dir` (not recursive), sorted by path. The order is significant:
/// it decides which clips land in the training split.
pub fn list_clips(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut clips = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == CLIP_EXTENSION) {
            clips.push(path);
        }
    }

    clips.sort();

    Ok(clips)
}

/// Same-stem JSON label next to a clip.
#[inline]
pub fn label_path(clip: &Path) -> PathBuf {
    clip.with_extension("json")
}

/// Feature rows `(N, 10)` and zone labels `(N,)`, row-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    pub features: Array2<f32>,
    pub labels: Array1<i64>,
}

impl Samples {
    pub fn new(features: Array2<f32>, labels: Array1<i64>) -> Result<Self> {
        if features.nrows() != labels.len() || features.ncols() != FEATURE_DIM {
            return Err(Error::ShapeMismatch(format!(
                "features {:?} vs labels ({},)",
                features.dim(),
                labels.len()
            )));
        }

        Ok(Self { features, labels })
    }

    pub fn from_clips(samples: &[ClipSample]) -> Result<Self> {
        let mut flat = Vec::with_capacity(samples.len() * FEATURE_DIM);
        for s in samples {
            flat.extend_from_slice(s.features.as_slice());
        }

        let features = Array2::from_shape_vec((samples.len(), FEATURE_DIM), flat)?;
        let labels = samples.iter().map(|s| s.zone.id() as i64).collect();

        Self::new(features, labels)
    }

    /// Standard-normal features with uniformly random zones, reproducible by seed.
    pub fn synthetic(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let features = Array2::from_shape_fn((n, FEATURE_DIM), |_| {
            rng.sample::<f32, _>(StandardNormal)
        });
        let labels = (0..n).map(|_| rng.gen_range(0..ZONE_COUNT as i64)).collect();

        Self { features, labels }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn zones(&self) -> Result<Vec<Zone>> {
        self.labels.iter().map(|&z| Zone::new(z)).collect()
    }

    /// Positional split: the first `floor(fraction * N)` rows train, the rest
    /// validate. Rows are not shuffled or stratified.
    pub fn split(&self, fraction: f64) -> (Samples, Samples) {
        let n = ((fraction * self.len() as f64).floor().max(0.0) as usize).min(self.len());

        (
            Samples {
                features: self.features.slice(s![..n, ..]).to_owned(),
                labels: self.labels.slice(s![..n]).to_owned(),
            },
            Samples {
                features: self.features.slice(s![n.., ..]).to_owned(),
                labels: self.labels.slice(s![n..]).to_owned(),
            },
        )
    }

    fn paths(dir: &Path, split: &str) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{}.json", split)),
            dir.join(format!("{}_labels.json", split)),
        )
    }

    pub fn exists(dir: &Path, split: &str) -> bool {
        let (features, labels) = Self::paths(dir, split);
        features.exists() && labels.exists()
    }

    /// Writes `<split>.json` and `<split>_labels.json` into `dir`.
    pub fn save(&self, dir: &Path, split: &str) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let (features, labels) = Self::paths(dir, split);

        let file = std::fs::File::create(features)?;
        serde_json::to_writer(std::io::BufWriter::new(file), &self.features)?;

        let file = std::fs::File::create(labels)?;
        serde_json::to_writer(std::io::BufWriter::new(file), &self.labels)?;

        Ok(())
    }

    pub fn load(dir: &Path, split: &str) -> Result<Self> {
        let (features, labels) = Self::paths(dir, split);

        let file = std::fs::File::open(features)?;
        let features: Array2<f32> = serde_json::from_reader(std::io::BufReader::new(file))?;

        let file = std::fs::File::open(labels)?;
        let labels: Array1<i64> = serde_json::from_reader(std::io::BufReader::new(file))?;

        Self::new(features, labels)
    }
}

/// Runs the clip processor over every clip in `raw_dir`, keeping listing order.
pub fn build_corpus<D: Detector>(
    raw_dir: &Path,
    processor: &ClipProcessor<D>,
    policy: ClipErrorPolicy,
) -> Result<Samples> {
    let clips = list_clips(raw_dir)?;
    let mut samples = Vec::with_capacity(clips.len());

    for (idx, clip) in clips.iter().enumerate() {
        tracing::info!("processing clip {}/{}: {}", idx + 1, clips.len(), clip.display());

        match processor.process(clip, &label_path(clip)) {
            Ok(sample) => samples.push(sample),
            Err(err) if policy == ClipErrorPolicy::Skip => {
                tracing::warn!(clip = %clip.display(), error = %err, "skipping clip");
            }
            Err(err) => return Err(err),
        }
    }

    Samples::from_clips(&samples)
}

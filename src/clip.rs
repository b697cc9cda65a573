use crate::config::PipelineConfig;
use crate::court::{zone_of, CourtGeometry, Homography, Zone};
use crate::detector::{CentroidDetector, Detector};
use crate::error::{Error, Result};
use crate::features::{self, FeatureVector};
use crate::frame::Frame;
use crate::spline::interpolate;
use crate::track::{DenseTrack, Observation, Track};
use nalgebra as na;
use opencv::{core::Mat, prelude::*, videoio};
use serde_derive::Deserialize;
use std::path::Path;

/// Decodes every frame of a clip into memory, in order.
///
/// A file that cannot be opened decodes to zero frames and is reported as
/// [`Error::EmptyVideo`].
pub fn decode_video(path: &Path) -> Result<Vec<Frame>> {
    let mut cap = videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
    let mut frames = Vec::new();

    if cap.is_opened()? {
        loop {
            let mut mat = Mat::default();
            if !cap.read(&mut mat)? || mat.empty() {
                break;
            }

            frames.push(Frame::new(frames.len(), mat));
        }

        cap.release()?;
    }

    if frames.is_empty() {
        return Err(Error::EmptyVideo(path.to_path_buf()));
    }

    tracing::debug!(path = %path.display(), frames = frames.len(), "clip decoded");

    Ok(frames)
}

#[derive(Deserialize)]
struct Label {
    #[serde(default)]
    hit_frame: serde_json::Value,
}

/// Reads `hit_frame` from a clip's label file. A missing file or a missing
/// field both mean frame 0. Integral floats such as `12.0` are accepted.
pub fn read_hit_frame(label_path: &Path) -> Result<usize> {
    if !label_path.exists() {
        return Ok(0);
    }

    let file = std::fs::File::open(label_path)?;
    let label: Label = serde_json::from_reader(std::io::BufReader::new(file))?;

    let invalid = |reason: String| Error::InvalidLabel {
        path: label_path.to_path_buf(),
        reason,
    };

    let frame = match &label.hit_frame {
        serde_json::Value::Null => return Ok(0),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(f), _) => f,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
            _ => return Err(invalid(format!("hit_frame {} is not an integer", n))),
        },
        other => return Err(invalid(format!("hit_frame {} is not a number", other))),
    };

    if frame < 0 {
        return Err(invalid(format!("negative hit_frame {}", frame)));
    }

    Ok(frame as usize)
}

/// Everything extracted from one clip.
#[derive(Debug, Clone)]
pub struct ClipSample {
    pub features: FeatureVector,
    /// Zone of the ball position at the hit frame, through the homography.
    pub zone: Zone,
    pub hit_frame: usize,
    pub court_point: na::Point2<f64>,
    pub homography: Homography,
    pub residual_error: f64,
}

pub struct ClipProcessor<D: Detector = CentroidDetector> {
    court: CourtGeometry,
    detector: D,
}

impl ClipProcessor<CentroidDetector> {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_detector(CourtGeometry::from_config(config), CentroidDetector::default())
    }
}

impl<D: Detector> ClipProcessor<D> {
    pub fn with_detector(court: CourtGeometry, detector: D) -> Self {
        Self { court, detector }
    }

    /// Decodes `video`, reads its label and extracts the (features, zone) pair.
    pub fn process(&self, video: &Path, label_path: &Path) -> Result<ClipSample> {
        let hit_frame = read_hit_frame(label_path)?;
        self.process_at(video, hit_frame)
    }

    pub fn process_at(&self, video: &Path, hit_frame: usize) -> Result<ClipSample> {
        let frames = decode_video(video)?;
        self.process_frames(&frames, hit_frame)
    }

    pub fn process_frames(&self, frames: &[Frame], hit_frame: usize) -> Result<ClipSample> {
        let first = frames.first().ok_or_else(|| Error::EmptyVideo(Default::default()))?;

        // static camera: one homography per clip
        let (homography, residual_error) = self.court.estimate_homography(&first.image)?;

        let mut ball_obs = Vec::with_capacity(frames.len());
        let mut p1 = Vec::with_capacity(frames.len());
        let mut p2 = Vec::with_capacity(frames.len());

        for frame in frames {
            let dets = self.detector.detect(frame)?;
            if let Some(b) = dets.ball {
                ball_obs.push(Observation::new(frame.index as i64, b.x, b.y));
            }

            p1.push(dets.players.0);
            p2.push(dets.players.1);
        }

        let first_frame = first.index as i64;
        let ball = interpolate(&Track::new(ball_obs)?)?;
        let p1 = DenseTrack::new(first_frame, p1)?;
        let p2 = DenseTrack::new(first_frame, p2)?;

        // align the player tracks to the frames the ball track covers
        let (start, end) = (ball.first_frame(), ball.last_frame());
        let p1 = p1.window(start, end)?;
        let p2 = p2.window(start, end)?;

        let hit = hit_frame as i64;
        if hit < start || hit > end {
            return Err(Error::IndexOutOfBounds {
                idx: hit_frame,
                len: ball.len(),
            });
        }
        let idx = (hit - start) as usize;

        let features = features::build(&p1, &p2, &ball, idx)?;
        let court_point = homography.project(ball.get(idx)?);
        let zone = zone_of(court_point);

        tracing::debug!(
            hit_frame,
            residual = residual_error,
            x = court_point.x,
            y = court_point.y,
            %zone,
            "clip processed"
        );

        Ok(ClipSample {
            features,
            zone,
            hit_frame,
            court_point,
            homography,
            residual_error,
        })
    }
}

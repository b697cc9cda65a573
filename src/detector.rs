use crate::error::Result;
use crate::frame::Frame;
use nalgebra as na;
use opencv::imgproc;

/// Everything a detector reports for one frame, in image px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDetections {
    /// `None` leaves a gap that the trajectory interpolation fills.
    pub ball: Option<na::Point2<f64>>,
    pub players: (na::Point2<f64>, na::Point2<f64>),
}

/// Source of ball and player positions. Swapping the implementation leaves
/// court geometry, interpolation and feature construction untouched.
pub trait Detector {
    fn detect(&self, frame: &Frame) -> Result<FrameDetections>;
}

impl<D: Detector + ?Sized> Detector for &D {
    #[inline]
    fn detect(&self, frame: &Frame) -> Result<FrameDetections> {
        (**self).detect(frame)
    }
}

pub struct CentroidDetectorConfig {
    /// Added to the zeroth moment so an all-dark frame does not divide by zero.
    pub epsilon: f64,
    /// Player x positions as multiples of the centroid x.
    pub p1_x_factor: f64,
    pub p2_x_factor: f64,
}

impl Default for CentroidDetectorConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            p1_x_factor: 0.5,
            p2_x_factor: 1.5,
        }
    }
}

/// Placeholder detector: the ball is the intensity centroid of the gray
/// frame, players are fixed horizontal offsets of it. It does not track
/// anything real.
#[derive(Default)]
pub struct CentroidDetector {
    config: CentroidDetectorConfig,
}

impl CentroidDetector {
    pub fn new(config: CentroidDetectorConfig) -> Self {
        Self { config }
    }

    pub fn centroid(&self, frame: &Frame) -> Result<na::Point2<f64>> {
        let gray = frame.gray()?;
        let m = imgproc::moments(&gray, false)?;

        let denom = m.m00 + self.config.epsilon;

        Ok(na::Point2::new(m.m10 / denom, m.m01 / denom))
    }
}

impl Detector for CentroidDetector {
    fn detect(&self, frame: &Frame) -> Result<FrameDetections> {
        let c = self.centroid(frame)?;

        Ok(FrameDetections {
            ball: Some(c),
            players: (
                na::Point2::new(c.x * self.config.p1_x_factor, c.y),
                na::Point2::new(c.x * self.config.p2_x_factor, c.y),
            ),
        })
    }
}

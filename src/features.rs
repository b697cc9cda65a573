use crate::error::{Error, Result};
use crate::track::DenseTrack;
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

pub const FEATURE_DIM: usize = 10;

/// Feature layout at the hit frame:
/// `[p1.x, p1.y, p1.vx, p1.vy, p2.x, p2.y, p2.vx, p2.vy, ball.x, ball.y]`.
///
/// The order is part of the model contract: fitted weights are positional.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f32; FEATURE_DIM]);

impl FeatureVector {
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

// Backward difference; zero at the start of the track.
fn velocity(track: &DenseTrack, idx: usize) -> Result<na::Vector2<f64>> {
    let pos = track.get(idx)?;
    if idx == 0 {
        return Ok(na::Vector2::zeros());
    }

    Ok(pos - track.get(idx - 1)?)
}

/// Builds the feature vector at `idx`, a 0-based index into all three tracks.
pub fn build(p1: &DenseTrack, p2: &DenseTrack, ball: &DenseTrack, idx: usize) -> Result<FeatureVector> {
    for track in [p1, p2, ball] {
        if idx >= track.len() {
            return Err(Error::IndexOutOfBounds {
                idx,
                len: track.len(),
            });
        }
    }

    let p1_pos = p1.get(idx)?;
    let p1_vel = velocity(p1, idx)?;
    let p2_pos = p2.get(idx)?;
    let p2_vel = velocity(p2, idx)?;
    let ball_pos = ball.get(idx)?;

    let values = [
        p1_pos.x, p1_pos.y, p1_vel.x, p1_vel.y, p2_pos.x, p2_pos.y, p2_vel.x, p2_vel.y, ball_pos.x,
        ball_pos.y,
    ];

    Ok(FeatureVector(values.map(|v| v as f32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(points: &[(f64, f64)]) -> DenseTrack {
        DenseTrack::new(
            0,
            points.iter().map(|&(x, y)| na::Point2::new(x, y)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn zero_velocity_at_start() {
        let p1 = track(&[(100.0, 7.0), (350.0, -20.0)]);
        let p2 = track(&[(-4.0, 9.0), (0.0, 0.0)]);
        let ball = track(&[(1.0, 2.0), (3.0, 4.0)]);

        let f = build(&p1, &p2, &ball, 0).unwrap();
        assert_eq!(f.0, [100.0, 7.0, 0.0, 0.0, -4.0, 9.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn layout_and_backward_difference() {
        let p1 = track(&[(0.0, 0.0), (1.0, 2.0), (4.0, 6.0)]);
        let p2 = track(&[(10.0, 10.0), (10.0, 12.0), (9.0, 15.0)]);
        let ball = track(&[(5.0, 5.0), (6.0, 6.0), (7.5, 8.5)]);

        let f = build(&p1, &p2, &ball, 2).unwrap();
        assert_eq!(f.0, [4.0, 6.0, 3.0, 4.0, 9.0, 15.0, -1.0, 3.0, 7.5, 8.5]);
        assert_eq!(f.as_slice().len(), FEATURE_DIM);
    }

    #[test]
    fn index_must_fit_every_track() {
        let long = track(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let short = track(&[(0.0, 0.0), (1.0, 1.0)]);

        let res = build(&long, &long, &short, 2);
        assert!(matches!(res, Err(Error::IndexOutOfBounds { idx: 2, len: 2 })));
    }
}

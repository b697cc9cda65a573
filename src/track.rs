use crate::error::{Error, Result};
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

/// A single position of a tracked entity in image px.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    #[serde(rename = "f")]
    pub frame: i64,
    pub x: f64,
    pub y: f64,
}

impl Observation {
    #[inline]
    pub fn new(frame: i64, x: f64, y: f64) -> Self {
        Self { frame, x, y }
    }

    #[inline(always)]
    pub fn point(&self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }
}

/// Possibly sparse sequence of observations with strictly increasing frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    observations: Vec<Observation>,
}

impl Track {
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        if observations.is_empty() {
            return Err(Error::EmptyTrack);
        }

        for pair in observations.windows(2) {
            if pair[1].frame <= pair[0].frame {
                return Err(Error::UnorderedTrack {
                    prev: pair[0].frame,
                    next: pair[1].frame,
                });
            }
        }

        Ok(Self { observations })
    }

    #[inline]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    #[inline]
    pub fn first_frame(&self) -> i64 {
        self.observations[0].frame
    }

    #[inline]
    pub fn last_frame(&self) -> i64 {
        self.observations[self.observations.len() - 1].frame
    }

    pub fn frames(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.frame as f64).collect()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.y).collect()
    }
}

/// Gap-free track: one position for every frame in `first_frame..first_frame + len`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTrack {
    first_frame: i64,
    points: Vec<na::Point2<f64>>,
}

impl DenseTrack {
    pub fn new(first_frame: i64, points: Vec<na::Point2<f64>>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyTrack);
        }

        Ok(Self {
            first_frame,
            points,
        })
    }

    #[inline]
    pub fn first_frame(&self) -> i64 {
        self.first_frame
    }

    #[inline]
    pub fn last_frame(&self) -> i64 {
        self.first_frame + self.points.len() as i64 - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[na::Point2<f64>] {
        &self.points
    }

    pub fn get(&self, idx: usize) -> Result<na::Point2<f64>> {
        self.points
            .get(idx)
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                idx,
                len: self.points.len(),
            })
    }

    /// Position at an absolute frame number.
    pub fn at_frame(&self, frame: i64) -> Option<na::Point2<f64>> {
        let offset = frame.checked_sub(self.first_frame)?;
        if offset < 0 {
            return None;
        }

        self.points.get(offset as usize).copied()
    }

    /// Sub-track covering `first..=last`, clipped to the frames this track has.
    pub fn window(&self, first: i64, last: i64) -> Result<Self> {
        let first = first.max(self.first_frame);
        let last = last.min(self.last_frame());
        if first > last {
            return Err(Error::EmptyTrack);
        }

        let from = (first - self.first_frame) as usize;
        let to = (last - self.first_frame) as usize;

        Self::new(first, self.points[from..=to].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_unordered() {
        assert!(matches!(Track::new(vec![]), Err(Error::EmptyTrack)));

        let res = Track::new(vec![
            Observation::new(3, 0.0, 0.0),
            Observation::new(3, 1.0, 1.0),
        ]);
        assert!(matches!(
            res,
            Err(Error::UnorderedTrack { prev: 3, next: 3 })
        ));
    }

    #[test]
    fn dense_window_and_lookup() {
        let points = (0..5).map(|i| na::Point2::new(i as f64, 0.0)).collect();
        let dense = DenseTrack::new(10, points).unwrap();

        assert_eq!(dense.last_frame(), 14);
        assert_eq!(dense.at_frame(12), Some(na::Point2::new(2.0, 0.0)));
        assert_eq!(dense.at_frame(9), None);

        let win = dense.window(8, 12).unwrap();
        assert_eq!(win.first_frame(), 10);
        assert_eq!(win.len(), 3);

        assert!(matches!(
            dense.get(5),
            Err(Error::IndexOutOfBounds { idx: 5, len: 5 })
        ));
    }
}

//! Image-to-court homography and the landing-zone grid.
//!
//! Court-plane coordinates are meters on the opponent's half, origin at its
//! near baseline/sideline corner: x runs across the court in
//! `[0, COURT_WIDTH]`, y runs along it in `[0, HALF_LENGTH]`.

use crate::config::{CannyParams, HoughParams, PipelineConfig};
use crate::error::{Error, Result};
use crate::frame::to_gray;
use crate::math::least_squares;
use nalgebra as na;
use opencv::{
    core::{Mat, Vec4i, Vector},
    imgproc,
};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// ITF singles court width in meters.
pub const COURT_WIDTH: f64 = 8.23;
/// ITF court length in meters.
pub const COURT_LENGTH: f64 = 23.77;
pub const HALF_LENGTH: f64 = COURT_LENGTH / 2.0;

pub const ZONE_COLUMNS: u8 = 3;
pub const ZONE_ROWS: u8 = 2;
pub const ZONE_COUNT: usize = (ZONE_COLUMNS * ZONE_ROWS) as usize;

/// Court corners in the order matching [`corner_box`].
pub const COURT_CORNERS: [(f64, f64); 4] = [
    (0.0, 0.0),
    (COURT_WIDTH, 0.0),
    (0.0, HALF_LENGTH),
    (COURT_WIDTH, HALF_LENGTH),
];

/// One cell of the 3 x 2 grid over the opponent's half, `row * 3 + col`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "i64", into = "i64")]
pub struct Zone(u8);

impl Zone {
    pub fn new(id: i64) -> Result<Self> {
        if (0..ZONE_COUNT as i64).contains(&id) {
            Ok(Zone(id as u8))
        } else {
            Err(Error::InvalidZone(id))
        }
    }

    #[inline]
    pub fn from_cell(row: u8, col: u8) -> Self {
        Zone(row.min(ZONE_ROWS - 1) * ZONE_COLUMNS + col.min(ZONE_COLUMNS - 1))
    }

    #[inline(always)]
    pub fn id(&self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub fn row(&self) -> u8 {
        self.0 / ZONE_COLUMNS
    }

    #[inline(always)]
    pub fn col(&self) -> u8 {
        self.0 % ZONE_COLUMNS
    }

    pub fn all() -> impl Iterator<Item = Zone> {
        (0..ZONE_COUNT as u8).map(Zone)
    }
}

impl TryFrom<i64> for Zone {
    type Error = Error;

    fn try_from(id: i64) -> Result<Self> {
        Zone::new(id)
    }
}

impl From<Zone> for i64 {
    fn from(zone: Zone) -> i64 {
        zone.0 as i64
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Cells are half-open on their lower edge, so a point on an interior boundary
// belongs to the lower-index cell: x = W/3 and x = 2W/3 fall in columns 0 and 1,
// y = HALF_LENGTH/2 falls in row 0. A plain floor would move all three up a cell.
// NaN lands in cell 0.
#[inline]
fn cell_index(v: f64, cell: f64, cells: u8) -> u8 {
    let idx = ((v / cell).ceil() - 1.0).clamp(0.0, (cells - 1) as f64);
    idx as u8
}

/// Landing zone of a court-plane point. Defined for every input: points off
/// the court are clamped onto the nearest edge cell.
pub fn zone_of(p: na::Point2<f64>) -> Zone {
    let col = cell_index(p.x, COURT_WIDTH / ZONE_COLUMNS as f64, ZONE_COLUMNS);
    let row = cell_index(p.y, HALF_LENGTH / ZONE_ROWS as f64, ZONE_ROWS);

    Zone::from_cell(row, col)
}

/// Projective map from image px to court meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(na::Matrix3<f64>);

impl Homography {
    #[inline]
    pub fn from_matrix(m: na::Matrix3<f64>) -> Self {
        Homography(m)
    }

    #[inline]
    pub fn matrix(&self) -> &na::Matrix3<f64> {
        &self.0
    }

    /// Direct linear transform with `h33 = 1`, solved in the least-squares
    /// sense for four or more correspondences.
    pub fn from_correspondences(src: &[na::Point2<f64>], dst: &[na::Point2<f64>]) -> Result<Self> {
        if src.len() != dst.len() || src.len() < 4 {
            return Err(Error::ShapeMismatch(format!(
                "homography needs >= 4 matching point pairs, got {} and {}",
                src.len(),
                dst.len()
            )));
        }

        let n = src.len();
        let mut a = na::DMatrix::<f64>::zeros(2 * n, 8);
        let mut b = na::DVector::<f64>::zeros(2 * n);

        for (i, (s, d)) in src.iter().zip(dst).enumerate() {
            let (x, y) = (s.x, s.y);
            let (u, v) = (d.x, d.y);

            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = least_squares(a, &b).ok_or(Error::SingularSystem)?;

        Ok(Homography(na::Matrix3::new(
            h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
        )))
    }

    /// Perspective transform of a single point.
    #[inline]
    pub fn project(&self, p: na::Point2<f64>) -> na::Point2<f64> {
        let v = self.0 * na::Vector3::new(p.x, p.y, 1.0);
        na::Point2::new(v.x / v.z, v.y / v.z)
    }

    /// Mean distance between projected `src` points and their `dst` counterparts.
    pub fn reprojection_error(&self, src: &[na::Point2<f64>], dst: &[na::Point2<f64>]) -> f64 {
        if src.is_empty() {
            return 0.0;
        }

        let sum: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| na::distance(&self.project(*s), d))
            .sum();

        sum / src.len() as f64
    }
}

#[inline]
pub fn project(h: &Homography, p: na::Point2<f64>) -> na::Point2<f64> {
    h.project(p)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub a: na::Point2<f64>,
    pub b: na::Point2<f64>,
}

/// Axis-aligned box around every segment endpoint, as
/// (min x, min y), (max x, min y), (min x, max y), (max x, max y).
pub fn corner_box(segments: &[LineSegment]) -> Option<[na::Point2<f64>; 4]> {
    let mut iter = segments.iter().flat_map(|s| [s.a, s.b]);
    let first = iter.next()?;

    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in iter {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }

    Some([
        na::Point2::new(x0, y0),
        na::Point2::new(x1, y0),
        na::Point2::new(x0, y1),
        na::Point2::new(x1, y1),
    ])
}

pub fn court_corners() -> [na::Point2<f64>; 4] {
    COURT_CORNERS.map(|(x, y)| na::Point2::new(x, y))
}

/// Court-plane geometry for a static camera.
#[derive(Debug, Clone, Default)]
pub struct CourtGeometry {
    edges: CannyParams,
    lines: HoughParams,
}

impl CourtGeometry {
    pub fn new(edges: CannyParams, lines: HoughParams) -> Self {
        Self { edges, lines }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.edges, config.lines)
    }

    /// Canny edges followed by a probabilistic Hough transform.
    pub fn detect_line_segments(&self, image: &Mat) -> Result<Vec<LineSegment>> {
        let gray = to_gray(image)?;

        let mut edges = Mat::default();
        imgproc::canny(
            &gray,
            &mut edges,
            self.edges.low_threshold,
            self.edges.high_threshold,
            self.edges.aperture,
            false,
        )?;

        let mut lines = Vector::<Vec4i>::new();
        imgproc::hough_lines_p(
            &edges,
            &mut lines,
            self.lines.rho,
            self.lines.theta(),
            self.lines.threshold,
            self.lines.min_line_length,
            self.lines.max_line_gap,
        )?;

        Ok(lines
            .iter()
            .map(|l| LineSegment {
                a: na::Point2::new(l[0] as f64, l[1] as f64),
                b: na::Point2::new(l[2] as f64, l[3] as f64),
            })
            .collect())
    }

    /// Solves the homography taking the bounding box of all detected line
    /// endpoints to the four corners of the opponent's half.
    ///
    /// Returns the homography and the mean reprojection error of the four
    /// corners in meters. This is a coarse approximation of corner detection,
    /// so noisy frames produce meters-scale error.
    pub fn estimate_homography(&self, image: &Mat) -> Result<(Homography, f64)> {
        let segments = self.detect_line_segments(image)?;
        homography_from_segments(&segments)
    }
}

/// Homography from the endpoint bounding box of `segments` to the court
/// corners, with its mean corner reprojection error.
pub fn homography_from_segments(segments: &[LineSegment]) -> Result<(Homography, f64)> {
    let corners = corner_box(segments).ok_or(Error::NoLinesDetected)?;

    let width = corners[1].x - corners[0].x;
    let height = corners[2].y - corners[0].y;
    if !(width > 0.0 && height > 0.0) {
        return Err(Error::DegenerateCorners { width, height });
    }

    let court = court_corners();
    let h = Homography::from_correspondences(&corners, &court)?;
    let err = h.reprojection_error(&corners, &court);

    tracing::debug!(
        segments = segments.len(),
        residual = err,
        "court homography solved"
    );

    Ok((h, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Point, Scalar};

    #[test]
    fn zone_is_total_and_clamped() {
        let points = [
            (-1e9, -1e9),
            (1e9, 1e9),
            (-3.0, 5.0),
            (4.0, 100.0),
            (f64::MAX, f64::MIN),
            (0.0, 0.0),
        ];

        for (x, y) in points {
            let z = zone_of(na::Point2::new(x, y));
            assert!(z.id() < 6, "{:?} -> {}", (x, y), z);
        }

        assert_eq!(zone_of(na::Point2::new(-5.0, -5.0)).id(), 0);
        assert_eq!(zone_of(na::Point2::new(50.0, 50.0)).id(), 5);
        assert_eq!(zone_of(na::Point2::new(50.0, -50.0)).id(), 2);
    }

    #[test]
    fn zone_cell_interiors() {
        let cw = COURT_WIDTH / 3.0;
        let rh = HALF_LENGTH / 2.0;

        for row in 0..2u8 {
            for col in 0..3u8 {
                let p = na::Point2::new((col as f64 + 0.5) * cw, (row as f64 + 0.5) * rh);
                let z = zone_of(p);

                assert_eq!(z.id(), row * 3 + col);
                assert_eq!((z.row(), z.col()), (row, col));
            }
        }
    }

    #[test]
    fn zone_boundaries_resolve_to_lower_cell() {
        let cw = COURT_WIDTH / 3.0;
        let rh = HALF_LENGTH / 2.0;

        assert_eq!(
            zone_of(na::Point2::new(cw, 0.0)),
            zone_of(na::Point2::new(0.0, 0.0))
        );
        assert_eq!(zone_of(na::Point2::new(2.0 * cw, 1.0)).id(), 1);
        assert_eq!(zone_of(na::Point2::new(1.0, rh)).id(), 0);
        assert_eq!(zone_of(na::Point2::new(COURT_WIDTH, HALF_LENGTH)).id(), 5);
    }

    #[test]
    fn zone_rejects_out_of_range_ids() {
        assert!(Zone::new(5).is_ok());
        assert!(matches!(Zone::new(6), Err(Error::InvalidZone(6))));
        assert!(Zone::new(-1).is_err());
        assert_eq!(serde_json::to_string(&Zone::new(4).unwrap()).unwrap(), "4");
        assert!(serde_json::from_str::<Zone>("9").is_err());
    }

    #[test]
    fn homography_maps_square_exactly() {
        let src = [
            na::Point2::new(10.0, 20.0),
            na::Point2::new(110.0, 20.0),
            na::Point2::new(10.0, 220.0),
            na::Point2::new(110.0, 220.0),
        ];
        let dst = court_corners();
        let h = Homography::from_correspondences(&src, &dst).unwrap();

        assert!(h.reprojection_error(&src, &dst) < 1e-9);

        let centre = h.project(na::Point2::new(60.0, 120.0));
        assert!((centre.x - COURT_WIDTH / 2.0).abs() < 1e-9);
        assert!((centre.y - HALF_LENGTH / 2.0).abs() < 1e-9);
    }

    #[test]
    fn homography_recovers_perspective() {
        let truth = Homography::from_matrix(na::Matrix3::new(
            0.9, 0.1, 5.0, -0.05, 1.1, -3.0, 0.0005, 0.0002, 1.0,
        ));
        let src: Vec<_> = [(0.0, 0.0), (200.0, 10.0), (15.0, 180.0), (220.0, 210.0), (90.0, 70.0)]
            .iter()
            .map(|&(x, y)| na::Point2::new(x, y))
            .collect();
        let dst: Vec<_> = src.iter().map(|p| truth.project(*p)).collect();

        let h = Homography::from_correspondences(&src, &dst).unwrap();
        assert!((h.matrix() - truth.matrix()).amax() < 1e-6);
    }

    #[test]
    fn collinear_corners_are_rejected() {
        let p = na::Point2::new(1.0, 1.0);
        let res = Homography::from_correspondences(&[p; 4], &court_corners());

        assert!(matches!(res, Err(Error::SingularSystem)));
    }

    #[test]
    fn blank_frame_has_no_lines() {
        let image =
            Mat::new_rows_cols_with_default(120, 160, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let res = CourtGeometry::default().estimate_homography(&image);

        assert!(matches!(res, Err(Error::NoLinesDetected)));
    }

    #[test]
    fn rectangle_outline_homography() {
        let mut image =
            Mat::new_rows_cols_with_default(200, 400, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        imgproc::rectangle_points(
            &mut image,
            Point::new(50, 50),
            Point::new(350, 150),
            Scalar::all(255.0),
            2,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let (h, err) = CourtGeometry::default().estimate_homography(&image).unwrap();
        assert!(err < 3.0, "residual {}", err);

        let near = h.project(na::Point2::new(200.0, 130.0));
        assert_eq!(zone_of(near).id(), 4);
    }

    #[test]
    fn corner_box_order() {
        let segments = [
            LineSegment {
                a: na::Point2::new(5.0, 9.0),
                b: na::Point2::new(40.0, 2.0),
            },
            LineSegment {
                a: na::Point2::new(-1.0, 30.0),
                b: na::Point2::new(12.0, 11.0),
            },
        ];
        let c = corner_box(&segments).unwrap();

        assert_eq!(c[0], na::Point2::new(-1.0, 2.0));
        assert_eq!(c[1], na::Point2::new(40.0, 2.0));
        assert_eq!(c[2], na::Point2::new(-1.0, 30.0));
        assert_eq!(c[3], na::Point2::new(40.0, 30.0));
        assert!(corner_box(&[]).is_none());
    }

    #[test]
    fn single_line_is_degenerate() {
        let horizontal = LineSegment {
            a: na::Point2::new(50.0, 100.0),
            b: na::Point2::new(350.0, 100.0),
        };

        let res = homography_from_segments(&[horizontal]);
        assert!(matches!(
            res,
            Err(Error::DegenerateCorners { width, height }) if width == 300.0 && height == 0.0
        ));

        assert!(matches!(homography_from_segments(&[]), Err(Error::NoLinesDetected)));
    }
}

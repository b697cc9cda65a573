use crate::error::Result;
use opencv::{core::Mat, imgproc, prelude::*};

/// A decoded video frame. Frames are numbered from zero in decode order.
pub struct Frame {
    pub index: usize,
    pub image: Mat,
}

impl Frame {
    #[inline]
    pub fn new(index: usize, image: Mat) -> Self {
        Self { index, image }
    }

    /// (width, height) in px
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.image.cols().max(0) as u32, self.image.rows().max(0) as u32)
    }

    pub fn gray(&self) -> Result<Mat> {
        to_gray(&self.image)
    }
}

/// Single-channel copy of a BGR (or already gray) image.
pub fn to_gray(image: &Mat) -> Result<Mat> {
    if image.channels() == 1 {
        return Ok(image.try_clone()?);
    }

    let mut gray = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;

    Ok(gray)
}

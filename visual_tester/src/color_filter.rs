// THEORY:
// The colour filter turns a BGR camera frame into the binary light-bar mask the
// detection engine consumes. It is a short OpenCV chain:
// - a 3x3 Gaussian pre-blur (sigma 0.8);
// - BGR to 8-bit HSV (H in [0, 180), S and V in [0, 255]);
// - `inRange` on the enemy window, where a channel passes when `min < value <= max`;
// - a 3x3 morphological close on the mask.

use anyhow::anyhow;
use image::GrayImage;
use opencv::{
    core::{self, Mat, Point, Scalar, Size, ToInputArray},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};

const BLUR_SIGMA: f64 = 0.8;

/// Bounds of one HSV channel: `min < value <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBounds {
    pub min: u8,
    pub max: u8,
}

impl ChannelBounds {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// `inRange` is inclusive on both ends, so the exclusive minimum moves up by one.
    fn inclusive(&self) -> (f64, f64) {
        (self.min as f64 + 1.0, self.max as f64)
    }
}

/// HSV window selecting one enemy colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub hue: ChannelBounds,
    pub saturation: ChannelBounds,
    pub value: ChannelBounds,
}

impl HsvRange {
    pub const fn red() -> Self {
        Self {
            hue: ChannelBounds::new(150, 180),
            saturation: ChannelBounds::new(40, 255),
            value: ChannelBounds::new(150, 255),
        }
    }

    pub const fn blue() -> Self {
        Self {
            hue: ChannelBounds::new(90, 130),
            saturation: ChannelBounds::new(40, 255),
            value: ChannelBounds::new(150, 255),
        }
    }

    fn scalars(&self) -> (Scalar, Scalar) {
        let (h_lo, h_hi) = self.hue.inclusive();
        let (s_lo, s_hi) = self.saturation.inclusive();
        let (v_lo, v_hi) = self.value.inclusive();
        (
            Scalar::new(h_lo, s_lo, v_lo, 0.0),
            Scalar::new(h_hi, s_hi, v_hi, 0.0),
        )
    }
}

/// Thresholds an HSV image. Selected pixels are 255, the rest 0.
pub fn hsv_mask(hsv: &Mat, range: &HsvRange) -> opencv::Result<Mat> {
    let (lower, upper) = range.scalars();
    let mut mask = Mat::default();
    core::in_range(hsv, &lower, &upper, &mut mask)?;
    Ok(mask)
}

/// Dilation followed by erosion, 3x3 square element. The border never takes part.
pub fn close_3x3(mask: &Mat) -> opencv::Result<Mat> {
    let anchor = Point::new(-1, -1);
    let kernel = imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(3, 3), anchor)?;
    let mut closed = Mat::default();
    imgproc::morphology_ex(
        mask,
        &mut closed,
        imgproc::MORPH_CLOSE,
        &kernel,
        anchor,
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;
    Ok(closed)
}

/// Selects the pixels of a BGR `frame` inside `range` and cleans the result.
pub fn binary_mask(frame: &impl ToInputArray, range: &HsvRange) -> opencv::Result<Mat> {
    let mut blurred = Mat::default();
    imgproc::gaussian_blur(
        frame,
        &mut blurred,
        Size::new(3, 3),
        BLUR_SIGMA,
        0.0,
        core::BORDER_DEFAULT,
    )?;
    let mut hsv = Mat::default();
    imgproc::cvt_color(&blurred, &mut hsv, imgproc::COLOR_BGR2HSV, 0)?;
    close_3x3(&hsv_mask(&hsv, range)?)
}

/// Copies a single-channel mask into the buffer type the engine takes.
pub fn to_gray_image(mask: &Mat) -> anyhow::Result<GrayImage> {
    let (width, height) = (mask.cols() as u32, mask.rows() as u32);
    let bytes = mask.try_clone()?.data_bytes()?.to_vec();
    GrayImage::from_raw(width, height, bytes)
        .ok_or_else(|| anyhow!("mask buffer does not hold {}x{} bytes", width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{CV_8UC1, CV_8UC3, Rect};

    fn blank(rows: i32, cols: i32, kind: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, kind, Scalar::all(0.0)).unwrap()
    }

    fn fill(image: &mut Mat, rect: Rect, colour: Scalar) {
        imgproc::rectangle(image, rect, colour, imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
    }

    #[test]
    fn bounds_exclude_min_and_include_max() {
        let mut hsv = Mat::new_rows_cols_with_default(1, 4, CV_8UC3, Scalar::all(255.0)).unwrap();
        let bytes = hsv.data_bytes_mut().unwrap();
        for (i, hue) in [10u8, 11, 20, 21].into_iter().enumerate() {
            bytes[i * 3] = hue;
        }
        let range = HsvRange {
            hue: ChannelBounds::new(10, 20),
            saturation: ChannelBounds::new(0, 255),
            value: ChannelBounds::new(0, 255),
        };

        let mask = hsv_mask(&hsv, &range).unwrap();
        let selected: Vec<u8> = (0..4).map(|c| *mask.at_2d::<u8>(0, c).unwrap()).collect();
        assert_eq!(selected, vec![0, 255, 255, 0]);
    }

    #[test]
    fn close_fills_single_pixel_holes() {
        let mut mask = Mat::new_rows_cols_with_default(7, 7, CV_8UC1, Scalar::all(255.0)).unwrap();
        *mask.at_2d_mut::<u8>(3, 3).unwrap() = 0;
        let closed = close_3x3(&mask).unwrap();
        assert_eq!(core::count_non_zero(&closed).unwrap(), 49);
    }

    #[test]
    fn close_keeps_an_isolated_block() {
        let mut mask = blank(9, 9, CV_8UC1);
        fill(&mut mask, Rect::new(3, 3, 3, 3), Scalar::all(255.0));
        let closed = close_3x3(&mask).unwrap();
        assert_eq!(core::count_non_zero(&closed).unwrap(), 9);
        assert_eq!(*closed.at_2d::<u8>(4, 4).unwrap(), 255);
        assert_eq!(*closed.at_2d::<u8>(2, 2).unwrap(), 0);
    }

    #[test]
    fn blue_bar_on_dark_background_is_selected() {
        let mut frame = blank(40, 40, CV_8UC3);
        // BGR order: a saturated blue.
        fill(&mut frame, Rect::new(10, 5, 6, 30), Scalar::new(255.0, 80.0, 40.0, 0.0));

        let mask = binary_mask(&frame, &HsvRange::blue()).unwrap();
        assert_eq!(*mask.at_2d::<u8>(20, 12).unwrap(), 255);
        assert_eq!(*mask.at_2d::<u8>(20, 30).unwrap(), 0);

        let red = binary_mask(&frame, &HsvRange::red()).unwrap();
        assert_eq!(core::count_non_zero(&red).unwrap(), 0);
    }

    #[test]
    fn mask_becomes_a_gray_image() {
        let mut mask = blank(6, 8, CV_8UC1);
        fill(&mut mask, Rect::new(5, 1, 1, 1), Scalar::all(255.0));
        let image = to_gray_image(&mask).unwrap();
        assert_eq!(image.dimensions(), (8, 6));
        assert_eq!(image.get_pixel(5, 1).0[0], 255);
        assert_eq!(image.get_pixel(1, 5).0[0], 0);
    }
}

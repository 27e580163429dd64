// THEORY:
// The `contour` module turns a binary mask into the outer borders of its
// foreground regions. It is the bridge between the pixel world of the colour
// filter and the shape world of the light-bar extractor.
//
// Key architectural principles:
// 1.  **Outermost Borders Only**: Borders are found with OpenCV `findContours` in
//     `RETR_EXTERNAL` mode. Every non-zero pixel is foreground, regions are
//     8-connected, and a region sitting inside another region's hole is not
//     reported at all.
// 2.  **No Chain Compression**: `CHAIN_APPROX_NONE` keeps every border pixel, so
//     the minimum-area fit sees the true outline.
// 3.  **Owned Geometry**: Borders leave this module as plain `Vec<Point2i>`, which
//     the worker pool can move between threads freely. OpenCV types never escape.
// 4.  **Total**: An empty mask, or an OpenCV error (logged), yields no contours.

use crate::core_modules::geometry::{Point2f, Point2i};
use image::GrayImage;
use log::warn;
use opencv::core::{self, CV_8UC1, Mat, Point, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;

/// The outer border of one connected foreground region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point2i>,
}

impl Contour {
    /// Area enclosed by the border polygon (`contourArea`). Lines and single
    /// pixels enclose nothing.
    pub fn area(&self) -> f64 {
        let points: Vector<Point> = self.points.iter().map(|p| Point::new(p.x, p.y)).collect();
        imgproc::contour_area(&points, false).unwrap_or(0.0)
    }

    pub fn to_points2f(&self) -> Vec<Point2f> {
        self.points
            .iter()
            .map(|p| Point2f::new(p.x as f32, p.y as f32))
            .collect()
    }
}

/// Copies a mask into a single-channel OpenCV matrix.
fn mask_to_mat(mask: &GrayImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        mask.height() as i32,
        mask.width() as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(mask.as_raw());
    Ok(mat)
}

/// Finds the outer border of every outermost 8-connected foreground region.
///
/// The order of the returned contours is unspecified.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }
    match trace_external(mask) {
        Ok(contours) => contours,
        Err(error) => {
            warn!("contour extraction failed: {}", error);
            Vec::new()
        }
    }
}

fn trace_external(mask: &GrayImage) -> opencv::Result<Vec<Contour>> {
    let image = mask_to_mat(mask)?;
    let mut borders = Vector::<Vector<Point>>::new();
    imgproc::find_contours(
        &image,
        &mut borders,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_NONE,
        core::Point::new(0, 0),
    )?;

    Ok(borders
        .iter()
        .map(|border| Contour {
            points: border.iter().map(|p| Point2i::new(p.x, p.y)).collect(),
        })
        .collect())
}

// THEORY:
// The overlay draws the engine's view of a frame on top of the camera image: the
// region that was processed, the interest area proposed for the next frame, every
// light bar and the aim point. OpenCV clips every shape to the image.

use armor_vision::pipeline::{FrameReport, Point2i, RectI};
use opencv::{
    core::{Mat, Point, Rect, Scalar},
    imgproc,
};

// BGR.
const CROP_COLOUR: [f64; 3] = [90.0, 90.0, 90.0];
const INTEREST_COLOUR: [f64; 3] = [0.0, 200.0, 255.0];
const LIGHT_BAR_COLOUR: [f64; 3] = [0.0, 255.0, 0.0];
const AIM_COLOUR: [f64; 3] = [255.0, 0.0, 255.0];
const AIM_RADIUS: i32 = 8;

fn scalar([b, g, r]: [f64; 3]) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// One-pixel outline of `rect`.
pub fn draw_rect(image: &mut Mat, rect: RectI, colour: [f64; 3]) -> opencv::Result<()> {
    if rect.width <= 0 || rect.height <= 0 {
        return Ok(());
    }
    let rect = Rect::new(rect.x, rect.y, rect.width, rect.height);
    imgproc::rectangle(image, rect, scalar(colour), 1, imgproc::LINE_8, 0)
}

pub fn draw_cross(image: &mut Mat, centre: Point2i, colour: [f64; 3]) -> opencv::Result<()> {
    let (x, y) = (centre.x, centre.y);
    let colour = scalar(colour);
    imgproc::line(
        image,
        Point::new(x - AIM_RADIUS, y),
        Point::new(x + AIM_RADIUS, y),
        colour,
        1,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::line(
        image,
        Point::new(x, y - AIM_RADIUS),
        Point::new(x, y + AIM_RADIUS),
        colour,
        1,
        imgproc::LINE_8,
        0,
    )
}

/// Draws one frame's report. `processed` is the region the report's mask was
/// cut from.
pub fn draw_report(image: &mut Mat, report: &FrameReport, processed: RectI) -> opencv::Result<()> {
    draw_rect(image, processed, CROP_COLOUR)?;

    let offset = processed.origin();
    for bar in &report.light_bars {
        let mut outline = bar.rect.bounding_rect();
        outline.x += offset.x;
        outline.y += offset.y;
        draw_rect(image, outline, LIGHT_BAR_COLOUR)?;
    }

    if report.selection.found {
        draw_rect(image, report.selection.interest_area, INTEREST_COLOUR)?;
        draw_cross(image, report.selection.center, AIM_COLOUR)?;
    }
    Ok(())
}

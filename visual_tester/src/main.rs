// THEORY:
// The visual tester replays a video through the engine and plays every
// collaborator the engine leaves to its caller: frame source, cropper, colour
// filter, frame-rate counter and a debug overlay in place of the serial
// transmitter.

mod color_filter;
mod fps_counter;
mod overlay;
mod settings;

use anyhow::{anyhow, bail};
use armor_vision::pipeline::{ArmorPipeline, CropDecision};
use log::{LevelFilter, info, warn};
use opencv::{
    core::{self, Mat, Rect},
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use settings::TesterSettings;
use std::env;

fn roi(crop: &CropDecision) -> Rect {
    let region = crop.region;
    Rect::new(region.x, region.y, region.width, region.height)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: visual_tester <input_video_path> <output_video_path> [settings.json]");
        return Ok(());
    }
    let input_path = &args[1];
    let output_path = &args[2];
    armor_vision::init_with_level(LevelFilter::Info).map_err(|e| anyhow!("{e}"))?;

    let settings = match args.get(3) {
        Some(path) => TesterSettings::load(path)?,
        None => TesterSettings::default(),
    };
    let enemy_range = settings.enemy_range();
    info!("enemy colour: {:?}", settings.enemy);

    // --- 2. Video I/O Initialization ---
    let mut cap = VideoCapture::from_file(input_path, videoio::CAP_ANY)?;
    if !cap.is_opened()? {
        bail!("cannot open video {}", input_path);
    }

    let frame_width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
    let frame_height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
    let fps = cap.get(videoio::CAP_PROP_FPS)?;

    let screen = settings.pipeline.screen;
    if (frame_width, frame_height) != (screen.width, screen.height) {
        bail!(
            "video is {}x{}, the configured screen is {}x{}",
            frame_width,
            frame_height,
            screen.width,
            screen.height
        );
    }

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let mut writer = VideoWriter::new(
        output_path,
        fourcc,
        fps,
        core::Size::new(frame_width, frame_height),
        true,
    )?;

    // --- 3. Pipeline Initialization ---
    let mut pipeline = ArmorPipeline::new(settings.pipeline);
    let mut fps_counter = fps_counter::FpsCounter::new();
    let mut found_frames = 0usize;
    let mut total_frames = 0usize;

    // --- 4. Main Processing Loop ---
    let mut frame = Mat::default();
    loop {
        match cap.read(&mut frame) {
            Ok(true) if !frame.empty() => {}
            Ok(_) => break,
            Err(e) => {
                warn!("error reading frame: {}", e);
                break;
            }
        }
        total_frames += 1;

        // --- 5. Crop, Colour Filter, Detection ---
        let crop = pipeline.crop();
        let region = Mat::roi(&frame, roi(&crop))?;
        let mask = color_filter::binary_mask(&region, &enemy_range)?;
        let report = pipeline
            .process_mask(&color_filter::to_gray_image(&mask)?)
            .await;
        if report.selection.found {
            found_frames += 1;
        }
        fps_counter.tick(report.selection.found);

        // --- 6. Visualization ---
        let mut output_frame = frame.try_clone()?;
        overlay::draw_report(&mut output_frame, &report, crop.region)?;

        // --- 7. Write Output Frame ---
        writer.write(&output_frame)?;

        let telemetry = report.selection.telemetry();
        info!(
            "frame {}: found {}, aim ({}, {}), {} cm, {:?}",
            report.frame_index,
            telemetry.found,
            telemetry.x,
            telemetry.y,
            telemetry.distance,
            report.phase
        );
    }

    println!(
        "Processing complete: target found in {} of {} frames. Output saved to {}",
        found_frames, total_frames, output_path
    );
    Ok(())
}

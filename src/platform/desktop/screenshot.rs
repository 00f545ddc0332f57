use std::{fs::File, path::Path};

use sdl2::{pixels::PixelFormatEnum, rect::Rect, render::Canvas, video::Window};

/**
 * Write the current canvas content to `<basepath>-<n>.png` where n is the
 * first number whose file does not exist yet.
 */
pub fn capture_screenshot(basepath: &str, canvas: &Canvas<Window>) -> Result<(), String> {
    let (width, height) = canvas.output_size()?;
    let mut pixels = canvas.read_pixels(Rect::new(0, 0, width, height), PixelFormatEnum::ABGR8888)?;

    // the canvas has no alpha plane, force opaque pixels
    for pixel in pixels.chunks_exact_mut(4) {
        pixel[3] = 255;
    }

    let mut i = 0;
    let filename = loop {
        let s = format!("{}-{}.png", basepath, i);
        if !Path::new(&s).exists() {
            break s;
        }
        i += 1;
    };

    let file = File::create(&filename).map_err(|e| e.to_string())?;
    let mut encoder = png::Encoder::new(file, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
    writer.write_image_data(&pixels).map_err(|e| e.to_string())?;

    println!("captured screenshot `{}`", filename);
    Ok(())
}

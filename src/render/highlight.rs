use image::{Rgba, RgbaImage};

use crate::backend::RgbaFrame;
use crate::error::{AppError, AppResult};
use crate::geometry::{PageRect, SizeF};

pub const HIGHLIGHT_MARGIN_PX: f32 = 2.0;
pub const ACTIVE_MATCH_COLOR: [u8; 3] = [255, 140, 0];
pub const MATCH_COLOR: [u8; 3] = [255, 235, 60];
/// Tolerance on rectangle origins when deciding which match is the active one.
pub const ACTIVE_MATCH_EPSILON: f32 = 0.001;

/// Multiplies match rectangles onto a rendered page.
///
/// `matches` are in page-space points; `natural_size` is the page size the
/// bitmap was rendered from. The frame's pixel buffer is copied, never
/// mutated in place.
pub fn composite_highlights(
    frame: RgbaFrame,
    natural_size: SizeF,
    matches: &[PageRect],
    active: Option<&PageRect>,
) -> AppResult<RgbaFrame> {
    if matches.is_empty() || !natural_size.is_valid() {
        return Ok(frame);
    }

    let mut image = RgbaImage::from_raw(frame.width, frame.height, frame.pixels_to_vec())
        .ok_or_else(|| {
            AppError::invalid_argument("rgba frame pixels length does not match dimensions")
        })?;

    let scale_x = frame.width as f32 / natural_size.width;
    let scale_y = frame.height as f32 / natural_size.height;

    for rect in matches {
        let is_active =
            active.is_some_and(|active| rect.same_origin(active, ACTIVE_MATCH_EPSILON));
        let color = if is_active {
            ACTIVE_MATCH_COLOR
        } else {
            MATCH_COLOR
        };
        let target = rect
            .scaled(scale_x, scale_y)
            .expanded(HIGHLIGHT_MARGIN_PX);
        multiply_rect(&mut image, &target, color);
    }

    Ok(RgbaFrame {
        width: frame.width,
        height: frame.height,
        pixels: image.into_raw().into(),
    })
}

fn multiply_rect(image: &mut RgbaImage, rect: &PageRect, color: [u8; 3]) {
    let (width, height) = image.dimensions();
    let x0 = rect.x.floor().clamp(0.0, width as f32) as u32;
    let y0 = rect.y.floor().clamp(0.0, height as f32) as u32;
    let x1 = rect.right().ceil().clamp(0.0, width as f32) as u32;
    let y1 = rect.bottom().ceil().clamp(0.0, height as f32) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
            image.put_pixel(
                x,
                y,
                Rgba([
                    multiply(r, color[0]),
                    multiply(g, color[1]),
                    multiply(b, color[2]),
                    a,
                ]),
            );
        }
    }
}

fn multiply(base: u8, blend: u8) -> u8 {
    ((u16::from(base) * u16::from(blend) + 127) / 255) as u8
}

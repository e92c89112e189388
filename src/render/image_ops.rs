use fast_image_resize as fr;

use crate::backend::RgbaFrame;
use crate::error::{AppError, AppResult};
use crate::geometry::PixelSize;

pub(crate) const DOWNSCALE_FILTER: fr::FilterType = fr::FilterType::CatmullRom;

/// Shrinks `frame` to fit inside `bounds`, keeping the aspect ratio.
///
/// Frames that already fit are returned untouched; this never upscales.
pub(crate) fn downscale_to_fit(frame: RgbaFrame, bounds: PixelSize) -> AppResult<RgbaFrame> {
    let Some((dst_width, dst_height)) =
        fit_downscale_dimensions(frame.width, frame.height, bounds.width, bounds.height)
    else {
        return Ok(frame);
    };

    resize_frame(frame, dst_width, dst_height)
}

pub(crate) fn fit_downscale_dimensions(
    src_width: u32,
    src_height: u32,
    max_width: u32,
    max_height: u32,
) -> Option<(u32, u32)> {
    if src_width == 0 || src_height == 0 || max_width == 0 || max_height == 0 {
        return None;
    }
    if src_width <= max_width && src_height <= max_height {
        return None;
    }

    let width_limited = u64::from(max_width) * u64::from(src_height)
        <= u64::from(max_height) * u64::from(src_width);

    if width_limited {
        let dst_height = (u64::from(src_height) * u64::from(max_width) / u64::from(src_width))
            .clamp(1, u64::from(max_height)) as u32;
        Some((max_width, dst_height))
    } else {
        let dst_width = (u64::from(src_width) * u64::from(max_height) / u64::from(src_height))
            .clamp(1, u64::from(max_width)) as u32;
        Some((dst_width, max_height))
    }
}

fn resize_frame(frame: RgbaFrame, dst_width: u32, dst_height: u32) -> AppResult<RgbaFrame> {
    if frame.width == dst_width && frame.height == dst_height {
        return Ok(frame);
    }

    let src = fr::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.pixels_to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|_| {
        AppError::invalid_argument("rgba frame pixels length does not match dimensions")
    })?;

    let mut dst = fr::images::Image::new(dst_width, dst_height, fr::PixelType::U8x4);
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(DOWNSCALE_FILTER));
    fr::Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|_| AppError::unsupported("failed to downscale rendered page"))?;

    Ok(RgbaFrame {
        width: dst_width,
        height: dst_height,
        pixels: dst.into_vec().into(),
    })
}

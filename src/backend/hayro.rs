use std::path::{Path, PathBuf};
use std::sync::Arc;

use hayro::hayro_interpret::font::Glyph;
use hayro::hayro_interpret::util::{PageExt, RectExt};
use hayro::hayro_interpret::{
    BlendMode, ClipPath, Context, Device, GlyphDrawMode, Image, InterpreterSettings, Paint,
    PathDrawMode, SoftMask, interpret_page,
};
use hayro::hayro_syntax::Pdf;
use hayro::hayro_syntax::page::Page;
use hayro::vello_cpu::color::palette::css::WHITE;
use hayro::{RenderSettings, render};
use kurbo::{Affine, BezPath, Point};

use crate::error::{AppError, AppResult, OpenErrorKind};
use crate::geometry::{PageRect, SizeF};

use super::traits::{DocumentLoader, DocumentModel, RgbaFrame};

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct HayroDocumentLoader;

impl DocumentLoader for HayroDocumentLoader {
    fn open(&self, path: &Path) -> AppResult<Box<dyn DocumentModel>> {
        PdfDoc::open(path).map(|doc| Box::new(doc) as Box<dyn DocumentModel>)
    }
}

pub struct PdfDoc {
    path: PathBuf,
    pdf: Pdf,
}

impl DocumentModel for PdfDoc {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.pdf.pages().len()
    }

    fn page_size(&self, page: usize) -> AppResult<SizeF> {
        let page_ref = self.page(page)?;
        let (width, height) = page_ref.render_dimensions();
        Ok(SizeF::new(width, height))
    }

    fn rasterize(&self, page: usize, dpi_x: f32, dpi_y: f32) -> AppResult<RgbaFrame> {
        if !dpi_x.is_finite() || !dpi_y.is_finite() || dpi_x <= 0.0 || dpi_y <= 0.0 {
            return Err(AppError::invalid_argument(
                "dpi must be a positive finite value",
            ));
        }
        let page_ref = self.page(page)?;

        let render_settings = RenderSettings {
            x_scale: dpi_x / POINTS_PER_INCH,
            y_scale: dpi_y / POINTS_PER_INCH,
            bg_color: WHITE,
            ..Default::default()
        };
        let interpreter_settings = InterpreterSettings::default();
        let pixmap = render(page_ref, &interpreter_settings, &render_settings);
        if pixmap.width() == 0 || pixmap.height() == 0 {
            return Err(AppError::rasterize(page, "renderer produced an empty pixmap"));
        }

        Ok(RgbaFrame {
            width: pixmap.width() as u32,
            height: pixmap.height() as u32,
            pixels: pixmap.data_as_u8_slice().to_vec().into(),
        })
    }

    fn search(
        &self,
        page: usize,
        query: &str,
        case_insensitive: bool,
    ) -> AppResult<Vec<PageRect>> {
        let page_ref = self.page(page)?;
        let glyphs = collect_glyphs(page_ref);
        Ok(find_matches(&glyphs, query, case_insensitive))
    }
}

impl PdfDoc {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let bytes = load_bytes(path)?;
        if !bytes.as_slice().starts_with(b"%PDF-") {
            return Err(AppError::open(path, OpenErrorKind::Corrupt));
        }
        if is_encrypted(&bytes) {
            return Err(AppError::open(path, OpenErrorKind::Locked));
        }
        let pdf = Pdf::new(bytes).map_err(|_| AppError::open(path, OpenErrorKind::Corrupt))?;

        Ok(Self {
            path: path.to_path_buf(),
            pdf,
        })
    }

    fn page(&self, page: usize) -> AppResult<&Page<'_>> {
        self.pdf
            .pages()
            .get(page)
            .ok_or(AppError::invalid_argument("page index is out of range"))
    }
}

fn load_bytes(path: &Path) -> AppResult<Arc<Vec<u8>>> {
    if path.as_os_str().is_empty() || !path.is_file() {
        return Err(AppError::open(path, OpenErrorKind::NotFound));
    }

    match std::fs::read(path) {
        Ok(bytes) => Ok(Arc::new(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::open(path, OpenErrorKind::NotFound))
        }
        Err(err) => Err(AppError::io_with_context(
            err,
            format!("failed to read document: {}", path.display()),
        )),
    }
}

// Password-protected files carry an /Encrypt entry in their trailer.
fn is_encrypted(bytes: &[u8]) -> bool {
    const MARKER: &[u8] = b"/Encrypt";
    bytes.windows(MARKER.len()).any(|window| window == MARKER)
}

const LINE_BREAK_THRESHOLD: f64 = 6.0;
const FALLBACK_GLYPH_EM: f64 = 12.0;
const MIN_GLYPH_EM: f64 = 1.0;
const MAX_GLYPH_EM: f64 = 400.0;
const GLYPH_ASCENT: f64 = 0.8;

#[derive(Debug, Clone, Copy)]
struct GlyphOrigin {
    ch: char,
    x: f64,
    baseline: f64,
    em: f64,
}

#[derive(Debug, Clone, Copy)]
struct PlacedGlyph {
    ch: char,
    rect: PageRect,
}

fn collect_glyphs(page: &Page<'_>) -> Vec<PlacedGlyph> {
    let mut context = Context::new(
        page.initial_transform(true),
        page.intersected_crop_box().to_kurbo(),
        page.xref(),
        InterpreterSettings::default(),
    );
    let mut device = GlyphCollectDevice::default();
    interpret_page(page, &mut context, &mut device);
    device.finish()
}

#[derive(Default)]
struct GlyphCollectDevice {
    origins: Vec<GlyphOrigin>,
    last_glyph: Option<(char, i32, i32)>,
}

impl GlyphCollectDevice {
    // Glyph boxes are approximated from the distance to the next glyph on the
    // same baseline; the last glyph of a run gets half an em.
    fn finish(self) -> Vec<PlacedGlyph> {
        let origins = self.origins;
        origins
            .iter()
            .enumerate()
            .map(|(index, origin)| {
                let advance = origins
                    .get(index + 1)
                    .filter(|next| (next.baseline - origin.baseline).abs() <= LINE_BREAK_THRESHOLD)
                    .map(|next| next.x - origin.x)
                    .filter(|dx| *dx > 0.0 && *dx < origin.em * 2.0)
                    .unwrap_or(origin.em * 0.5);
                PlacedGlyph {
                    ch: origin.ch,
                    rect: PageRect::new(
                        origin.x as f32,
                        (origin.baseline - origin.em * GLYPH_ASCENT) as f32,
                        advance as f32,
                        origin.em as f32,
                    ),
                }
            })
            .collect()
    }

    fn is_duplicate_glyph(&self, ch: char, x: f64, y: f64) -> bool {
        self.last_glyph == Some((ch, quantize_coord(x), quantize_coord(y)))
    }
}

impl<'a> Device<'a> for GlyphCollectDevice {
    fn set_soft_mask(&mut self, _mask: Option<SoftMask<'a>>) {}

    fn set_blend_mode(&mut self, _blend_mode: BlendMode) {}

    fn draw_path(
        &mut self,
        _path: &BezPath,
        _transform: Affine,
        _paint: &Paint<'a>,
        _draw_mode: &PathDrawMode,
    ) {
    }

    fn push_clip_path(&mut self, _clip_path: &ClipPath) {}

    fn push_transparency_group(
        &mut self,
        _opacity: f32,
        _mask: Option<SoftMask<'a>>,
        _blend_mode: BlendMode,
    ) {
    }

    fn draw_glyph(
        &mut self,
        glyph: &Glyph<'a>,
        transform: Affine,
        glyph_transform: Affine,
        _paint: &Paint<'a>,
        _draw_mode: &GlyphDrawMode,
    ) {
        let Some(ch) = glyph.as_unicode() else {
            return;
        };

        let combined = transform * glyph_transform;
        let position = combined * Point::ORIGIN;
        if self.is_duplicate_glyph(ch, position.x, position.y) {
            return;
        }
        self.last_glyph = Some((ch, quantize_coord(position.x), quantize_coord(position.y)));

        let [_, _, c, d, _, _] = combined.as_coeffs();
        let em = c.hypot(d);
        let em = if em.is_finite() && (MIN_GLYPH_EM..=MAX_GLYPH_EM).contains(&em) {
            em
        } else {
            FALLBACK_GLYPH_EM
        };

        self.origins.push(GlyphOrigin {
            ch,
            x: position.x,
            baseline: position.y,
            em,
        });
    }

    fn draw_image(&mut self, _image: Image<'a, '_>, _transform: Affine) {}

    fn pop_clip_path(&mut self) {}

    fn pop_transparency_group(&mut self) {}
}

fn quantize_coord(value: f64) -> i32 {
    (value * 100.0).round() as i32
}

// Whitespace is ignored on both sides: extraction does not reliably emit
// space glyphs for positioned text runs.
fn find_matches(glyphs: &[PlacedGlyph], query: &str, case_insensitive: bool) -> Vec<PageRect> {
    let normalize = |ch: char| {
        if case_insensitive {
            ch.to_lowercase().next().unwrap_or(ch)
        } else {
            ch
        }
    };

    let needle: Vec<char> = query
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(normalize)
        .collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let haystack: Vec<(char, PageRect)> = glyphs
        .iter()
        .filter(|glyph| !glyph.ch.is_whitespace())
        .map(|glyph| (normalize(glyph.ch), glyph.rect))
        .collect();

    let mut matches = Vec::new();
    let mut start = 0;
    while start + needle.len() <= haystack.len() {
        let window = &haystack[start..start + needle.len()];
        if window.iter().map(|(ch, _)| *ch).eq(needle.iter().copied()) {
            let rect = window
                .iter()
                .skip(1)
                .fold(window[0].1, |acc, (_, rect)| acc.union(rect));
            matches.push(rect);
            start += needle.len();
        } else {
            start += 1;
        }
    }
    matches
}

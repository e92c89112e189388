//! Page-space and pixel-space primitives shared by layout, rendering and search.

/// A size in page-space points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A size in device-independent layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Physical pixel extent for a given device pixel ratio, rounded up.
    pub fn scaled(&self, ratio: f32) -> PixelSize {
        let ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        };
        PixelSize {
            width: (self.width as f32 * ratio).ceil() as u32,
            height: (self.height as f32 * ratio).ceil() as u32,
        }
    }
}

/// An axis-aligned rectangle with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn union(&self, other: &PageRect) -> PageRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PageRect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn scaled(&self, sx: f32, sy: f32) -> PageRect {
        PageRect {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }

    pub fn expanded(&self, margin: f32) -> PageRect {
        PageRect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    /// Origin comparison with a tolerance; the same logical match may be
    /// recomputed with rounding differences.
    pub fn same_origin(&self, other: &PageRect, epsilon: f32) -> bool {
        (self.x - other.x).abs() < epsilon && (self.y - other.y).abs() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::{PageRect, PixelSize, SizeF};

    #[test]
    fn union_covers_both_rects() {
        let a = PageRect::new(10.0, 10.0, 5.0, 5.0);
        let b = PageRect::new(12.0, 4.0, 10.0, 2.0);
        assert_eq!(a.union(&b), PageRect::new(10.0, 4.0, 12.0, 11.0));
    }

    #[test]
    fn same_origin_tolerates_rounding_noise() {
        let a = PageRect::new(100.0, 50.0, 20.0, 10.0);
        let b = PageRect::new(100.0004, 49.9996, 21.0, 10.0);
        assert!(a.same_origin(&b, 0.001));
        assert!(!a.same_origin(&PageRect::new(100.01, 50.0, 20.0, 10.0), 0.001));
    }

    #[test]
    fn pixel_size_scales_by_device_ratio() {
        assert_eq!(PixelSize::new(101, 50).scaled(1.5), PixelSize::new(152, 75));
        assert_eq!(PixelSize::new(10, 10).scaled(f32::NAN), PixelSize::new(10, 10));
        assert!(PixelSize::new(0, 10).is_empty());
        assert!(!SizeF::new(0.0, 10.0).is_valid());
    }
}

/// User-driven view parameters, read by windowing and layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scroll_offset: i32,
    pub viewport_width: i32,
    pub viewport_height: i32,
    pub fit_width: bool,
    /// Ignored while `fit_width` is set.
    pub zoom: f32,
    pub device_pixel_ratio: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scroll_offset: 0,
            viewport_width: 0,
            viewport_height: 0,
            fit_width: true,
            zoom: 1.0,
            device_pixel_ratio: 1.0,
        }
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub viewport: ViewportConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Rasterization workers; 0 picks the host's hardware concurrency.
    pub worker_threads: usize,
    pub max_width_px: f32,
    pub min_dpi: f32,
    pub max_dpi: f32,
    pub device_pixel_ratio: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_width_px: 3500.0,
            min_dpi: 72.0,
            max_dpi: 400.0,
            device_pixel_ratio: 1.0,
        }
    }
}

const FALLBACK_WORKER_THREADS: usize = 4;

impl RenderConfig {
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|threads| threads.get())
            .unwrap_or(FALLBACK_WORKER_THREADS)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    pub render_buffer_factor: f32,
    pub keep_buffer_factor: f32,
    pub edge_snap_px: i32,
    pub scroll_debounce_ms: u64,
    pub resize_debounce_ms: u64,
    pub fit_margin_px: i32,
    pub min_fit_width_px: i32,
    pub page_spacing_px: i32,
    pub page_margin_px: i32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            render_buffer_factor: 1.5,
            keep_buffer_factor: 4.0,
            edge_snap_px: 10,
            scroll_debounce_ms: 100,
            resize_debounce_ms: 150,
            fit_margin_px: 40,
            min_fit_width_px: 100,
            page_spacing_px: 20,
            page_margin_px: 20,
            min_zoom: 0.25,
            max_zoom: 4.0,
            zoom_step: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub case_insensitive: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}

impl Config {
    pub fn load() -> AppResult<Self> {
        let Some(path) = default_config_path() else {
            return Ok(Self::default());
        };
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        if !path.is_file() {
            return Err(AppError::invalid_argument(format!(
                "config path is not a regular file: {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read config: {}", path.display()))
        })?;
        let parsed = toml::from_str::<Self>(&raw).map_err(|source| {
            AppError::invalid_argument(format!(
                "failed to parse config {}: {source}",
                path.display()
            ))
        })?;
        Ok(parsed.sanitized())
    }

    pub fn sanitized(mut self) -> Self {
        let render_defaults = RenderConfig::default();
        let viewport_defaults = ViewportConfig::default();

        let render = &mut self.render;
        if !positive(render.max_width_px) {
            render.max_width_px = render_defaults.max_width_px;
        }
        if !positive(render.min_dpi) {
            render.min_dpi = render_defaults.min_dpi;
        }
        if !positive(render.max_dpi) || render.max_dpi < render.min_dpi {
            render.max_dpi = render_defaults.max_dpi.max(render.min_dpi);
        }
        if !positive(render.device_pixel_ratio) {
            render.device_pixel_ratio = render_defaults.device_pixel_ratio;
        }

        let viewport = &mut self.viewport;
        if !positive(viewport.render_buffer_factor) && viewport.render_buffer_factor != 0.0 {
            viewport.render_buffer_factor = viewport_defaults.render_buffer_factor;
        }
        if !viewport.keep_buffer_factor.is_finite()
            || viewport.keep_buffer_factor < viewport.render_buffer_factor
        {
            viewport.keep_buffer_factor = viewport_defaults
                .keep_buffer_factor
                .max(viewport.render_buffer_factor);
        }
        viewport.edge_snap_px = viewport.edge_snap_px.max(0);
        viewport.fit_margin_px = viewport.fit_margin_px.max(0);
        viewport.min_fit_width_px = viewport.min_fit_width_px.max(1);
        viewport.page_spacing_px = viewport.page_spacing_px.max(0);
        viewport.page_margin_px = viewport.page_margin_px.max(0);
        if !positive(viewport.min_zoom) {
            viewport.min_zoom = viewport_defaults.min_zoom;
        }
        if !positive(viewport.max_zoom) || viewport.max_zoom < viewport.min_zoom {
            viewport.max_zoom = viewport_defaults.max_zoom.max(viewport.min_zoom);
        }
        if !positive(viewport.zoom_step) {
            viewport.zoom_step = viewport_defaults.zoom_step;
        }
        self
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("PAGESCROLL_CONFIG_PATH")
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Per-user configuration directory for this application.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("pagescroll"));
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Some(PathBuf::from(home).join(".config").join("pagescroll"));
    }
    if let Some(appdata) = std::env::var_os("APPDATA")
        && !appdata.is_empty()
    {
        return Some(PathBuf::from(appdata).join("pagescroll"));
    }
    None
}

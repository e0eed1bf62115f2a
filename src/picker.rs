//! Interactive windows: pour-point selection on a flow-accumulation map and
//! the preview of the extracted channels.
use std::sync::mpsc;

use geojson::{FeatureCollection, Value};
use minifb::{Key, MouseButton, MouseMode, Window, WindowOptions};
use ndarray::Array2;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::raster::Extent;

pub const WINDOW_TITLE: &str = "Click to select pour point";
pub const CHANNELS_TITLE: &str = "D8 channels";

const MAX_PLOT_WIDTH: usize = 900;
const MAX_PLOT_HEIGHT: usize = 700;
const MARGIN_LEFT: usize = 40;
const MARGIN_TOP: usize = 30;
const MARGIN_RIGHT: usize = 90;
const MARGIN_BOTTOM: usize = 30;
const COLORBAR_GAP: usize = 20;
const COLORBAR_WIDTH: usize = 20;

/// Accumulation values mapped to the ends of the colour ramp.
const VMIN: f64 = 1.0;
const VMAX: f64 = 1e6;

const BACKGROUND: u32 = 0x00FF_FFFF;
const NO_DATA: u32 = 0x00E0_E0E0;
const FRAME: u32 = 0x0000_0000;

/// Line colours for successive channel branches, evenly spaced hues.
const BRANCH_COLOURS: [u32; 6] = [
    0x00F7_7189,
    0x00BB_9832,
    0x0050_B131,
    0x0036_ADA4,
    0x003B_A3EC,
    0x00E0_66F4,
];

/// Viridis sampled at five evenly spaced stops.
const VIRIDIS: [(f64, [u8; 3]); 5] = [
    (0.00, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.50, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.00, [253, 231, 37]),
];

fn viridis(t: f64) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let (mut lo, mut hi) = (VIRIDIS[0], VIRIDIS[VIRIDIS.len() - 1]);
    for pair in VIRIDIS.windows(2) {
        if t >= pair[0].0 && t <= pair[1].0 {
            (lo, hi) = (pair[0], pair[1]);
            break;
        }
    }
    let f = if hi.0 > lo.0 { (t - lo.0) / (hi.0 - lo.0) } else { 0.0 };
    let channel = |i: usize| (lo.1[i] as f64 + f * (hi.1[i] as f64 - lo.1[i] as f64)).round() as u32;
    (channel(0) << 16) | (channel(1) << 8) | channel(2)
}

/// Position of `value` on a logarithmic scale from [`VMIN`] to [`VMAX`],
/// `None` for values a log scale cannot show.
fn log_norm(value: f64) -> Option<f64> {
    if !(value > 0.0) {
        return None;
    }
    let t = (value.max(VMIN).ln() - VMIN.ln()) / (VMAX.ln() - VMIN.ln());
    Some(t.clamp(0.0, 1.0))
}

/// The rendered accumulation map and the layout needed to map clicks back
/// onto raster coordinates.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    /// Plotted area inside the window: left, top, width, height in pixels.
    pub plot: (usize, usize, usize, usize),
    pub extent: Extent,
    pub buffer: Vec<u32>,
}

impl Canvas {
    /// Lays out the map to fit a fixed box, keeping the raster's aspect.
    pub fn new(acc: &Array2<f64>, extent: Extent) -> Self {
        let (rows, cols) = acc.dim();
        let mut canvas = Self::blank(rows, cols, extent);
        canvas.draw_map(acc);
        canvas.draw_colorbar();
        canvas
    }

    /// Branches of `network` drawn as lines over a grid of `rows` x `cols`
    /// cells covering `extent`, one colour per branch in turn.
    pub fn channels(network: &FeatureCollection, rows: usize, cols: usize, extent: Extent) -> Self {
        let mut canvas = Self::blank(rows, cols, extent);
        let (left, top, w, h) = canvas.plot;
        canvas.frame(left, top, w, h);
        for (i, feature) in network.features.iter().enumerate() {
            let Some(Value::LineString(line)) = feature.geometry.as_ref().map(|g| &g.value) else {
                continue;
            };
            let colour = BRANCH_COLOURS[i % BRANCH_COLOURS.len()];
            for pair in line.windows(2) {
                let a = canvas.to_pixel(pair[0][0], pair[0][1]);
                let b = canvas.to_pixel(pair[1][0], pair[1][1]);
                canvas.draw_line(a, b, colour);
            }
        }
        canvas
    }

    fn blank(rows: usize, cols: usize, extent: Extent) -> Self {
        let (rows_f, cols_f) = (rows.max(1) as f64, cols.max(1) as f64);
        let scale = (MAX_PLOT_WIDTH as f64 / cols_f).min(MAX_PLOT_HEIGHT as f64 / rows_f);
        let plot_w = ((cols_f * scale).round() as usize).max(1);
        let plot_h = ((rows_f * scale).round() as usize).max(1);
        let width = MARGIN_LEFT + plot_w + MARGIN_RIGHT;
        let height = MARGIN_TOP + plot_h + MARGIN_BOTTOM;

        Self {
            width,
            height,
            plot: (MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h),
            extent,
            buffer: vec![BACKGROUND; width * height],
        }
    }

    fn draw_map(&mut self, acc: &Array2<f64>) {
        let (rows, cols) = acc.dim();
        if rows == 0 || cols == 0 {
            return;
        }
        let (left, top, w, h) = self.plot;
        for py in 0..h {
            let row = (py * rows / h).min(rows - 1);
            for px in 0..w {
                let col = (px * cols / w).min(cols - 1);
                let color = log_norm(acc[[row, col]]).map_or(NO_DATA, viridis);
                self.buffer[(top + py) * self.width + left + px] = color;
            }
        }
        self.frame(left, top, w, h);
    }

    fn draw_colorbar(&mut self) {
        let (left, top, w, h) = self.plot;
        let x0 = left + w + COLORBAR_GAP;
        for py in 0..h {
            let color = viridis(1.0 - py as f64 / (h.max(2) - 1) as f64);
            for px in x0..x0 + COLORBAR_WIDTH {
                self.buffer[(top + py) * self.width + px] = color;
            }
        }
        self.frame(x0, top, COLORBAR_WIDTH, h);
    }

    fn frame(&mut self, left: usize, top: usize, w: usize, h: usize) {
        let (right, bottom) = (left + w, top + h);
        for x in left.saturating_sub(1)..=right.min(self.width - 1) {
            self.buffer[top.saturating_sub(1) * self.width + x] = FRAME;
            self.buffer[bottom.min(self.height - 1) * self.width + x] = FRAME;
        }
        for y in top.saturating_sub(1)..=bottom.min(self.height - 1) {
            self.buffer[y * self.width + left.saturating_sub(1)] = FRAME;
            self.buffer[y * self.width + right.min(self.width - 1)] = FRAME;
        }
    }

    /// Bresenham line, pixels outside the plotted area are skipped.
    fn draw_line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), colour: u32) {
        let (left, top, w, h) = self.plot;
        let (dx, dy) = ((x1 - x0).abs(), -(y1 - y0).abs());
        let (sx, sy) = (if x0 < x1 { 1 } else { -1 }, if y0 < y1 { 1 } else { -1 });
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            let inside = x >= left as i64 && x < (left + w) as i64 && y >= top as i64 && y < (top + h) as i64;
            if inside {
                self.buffer[y as usize * self.width + x as usize] = colour;
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Window pixel under raster coordinates `(x, y)`; the inverse of
    /// [`Canvas::to_map`]. Points off the window are clamped to one pixel
    /// beyond its border.
    pub fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let (left, top, w, h) = self.plot;
        let e = &self.extent;
        let fx = (x - e.xmin) / (e.xmax - e.xmin);
        let fy = (e.ymax - y) / (e.ymax - e.ymin);
        let px = (left as f64 + fx * w as f64).floor().clamp(-1.0, self.width as f64);
        let py = (top as f64 + fy * h as f64).floor().clamp(-1.0, self.height as f64);
        (px as i64, py as i64)
    }

    /// Raster coordinates under window pixel `(px, py)`, `None` outside the
    /// plotted extent.
    pub fn to_map(&self, px: f64, py: f64) -> Option<(f64, f64)> {
        let (left, top, w, h) = self.plot;
        let fx = (px - left as f64) / w as f64;
        let fy = (py - top as f64) / h as f64;
        if !(0.0..1.0).contains(&fx) || !(0.0..1.0).contains(&fy) {
            return None;
        }
        let e = &self.extent;
        Some((e.xmin + fx * (e.xmax - e.xmin), e.ymax - fy * (e.ymax - e.ymin)))
    }
}

/// Shows `canvas` and hands every left click inside the map to `on_click`
/// until it returns `true` or the window is closed.
fn show<F>(canvas: &Canvas, title: &str, mut on_click: F) -> Result<()>
where
    F: FnMut(f64, f64) -> bool,
{
    let mut window = Window::new(title, canvas.width, canvas.height, WindowOptions::default())
        .map_err(|e| Error::Viewer(e.to_string()))?;
    window.set_target_fps(30);

    let mut was_down = false;
    while window.is_open() && !window.is_key_down(Key::Escape) {
        let down = window.get_mouse_down(MouseButton::Left);
        if down && !was_down {
            if let Some((px, py)) = window.get_mouse_pos(MouseMode::Discard) {
                match canvas.to_map(px as f64, py as f64) {
                    Some((x, y)) => {
                        if on_click(x, y) {
                            break;
                        }
                    }
                    None => debug!("click at pixel ({px}, {py}) is outside the map"),
                }
            }
        }
        was_down = down;
        window
            .update_with_buffer(&canvas.buffer, canvas.width, canvas.height)
            .map_err(|e| Error::Viewer(e.to_string()))?;
    }
    Ok(())
}

/// Shows the accumulation map and blocks until one click lands on it.
///
/// The clicked coordinates are truncated toward zero. Closing the window or
/// pressing Escape first is [`Error::NoPourPoint`].
pub fn pick_pour_point(acc: &Array2<f64>, extent: Extent) -> Result<(i64, i64)> {
    let canvas = Canvas::new(acc, extent);
    let (tx, rx) = mpsc::sync_channel(1);
    show(&canvas, WINDOW_TITLE, |x, y| tx.try_send((x as i64, y as i64)).is_ok())?;
    let (x, y) = rx.try_recv().map_err(|_| Error::NoPourPoint)?;
    info!("pour point selected at ({x}, {y})");
    Ok((x, y))
}

/// Shows the channel network until the window is closed or Escape is pressed.
pub fn show_channels(network: &FeatureCollection, rows: usize, cols: usize, extent: Extent) -> Result<()> {
    let canvas = Canvas::channels(network, rows, cols, extent);
    info!("showing {} channel branch(es)", network.features.len());
    show(&canvas, CHANNELS_TITLE, |_, _| false)
}

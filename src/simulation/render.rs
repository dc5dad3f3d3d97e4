use std::fmt;
use std::str::FromStr;

use crate::config::BACKGROUND;
use crate::error::{EngineError, Result};
use crate::simulation::cell::{decode_selector, CellLayout};

/// Output surface size in physical pixels (already scaled for pixel density)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewSize {
    pub width: u32,
    pub height: u32,
}

impl ViewSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Logical size scaled by a device pixel ratio
    pub fn scaled(width: f64, height: f64, pixel_ratio: f64) -> Self {
        Self {
            width: (width * pixel_ratio).round() as u32,
            height: (height * pixel_ratio).round() as u32,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::grid(format!(
                "view {}x{} has no pixels",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Grid cell sampled by output pixel (px, py), nearest neighbor
    pub fn cell_at(&self, px: u32, py: u32, width: u32, height: u32) -> (u32, u32) {
        let gx = ((px as f32 + 0.5) * width as f32 / self.width as f32) as u32;
        let gy = ((py as f32 + 0.5) * height as f32 / self.height as f32) as u32;
        (gx.min(width - 1), gy.min(height - 1))
    }
}

/// Projection from cell state to display color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Visible channels as RGB, alpha from the alive channel, over the background
    Color,
    /// Alive channel as grayscale
    Alive,
    /// One hue per model, weighted by alpha
    Model,
    /// Any single state channel as grayscale (signed, centered on 0.5)
    Channel(usize),
}

impl RenderMode {
    /// Modes cycled through by hosts
    pub const CYCLE: [RenderMode; 3] = [RenderMode::Color, RenderMode::Model, RenderMode::Alive];

    /// Reject modes the field cannot display
    pub fn validate(&self, layout: &CellLayout) -> Result<()> {
        match self {
            RenderMode::Channel(c) if *c >= layout.channels => Err(
                EngineError::UnsupportedRenderMode(format!(
                    "{} (field has {} channels)",
                    self, layout.channels
                )),
            ),
            _ => Ok(()),
        }
    }

    /// Shader-side discriminant
    pub fn as_u32(&self) -> u32 {
        match self {
            RenderMode::Color => 0,
            RenderMode::Alive => 1,
            RenderMode::Model => 2,
            RenderMode::Channel(_) => 3,
        }
    }

    pub fn channel(&self) -> u32 {
        match self {
            RenderMode::Channel(c) => *c as u32,
            _ => 0,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Color => write!(f, "color"),
            RenderMode::Alive => write!(f, "alive"),
            RenderMode::Model => write!(f, "model"),
            RenderMode::Channel(c) => write!(f, "channel:{}", c),
        }
    }
}

impl FromStr for RenderMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "color" => Ok(RenderMode::Color),
            "alive" => Ok(RenderMode::Alive),
            "model" => Ok(RenderMode::Model),
            _ => s
                .strip_prefix("channel:")
                .and_then(|c| c.parse().ok())
                .map(RenderMode::Channel)
                .ok_or_else(|| EngineError::UnsupportedRenderMode(s.to_string())),
        }
    }
}

/// RGBA8 image produced by the CPU render pass
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Display color of one cell (linear, in [0, 1])
pub fn shade(layout: &CellLayout, cell: &[f32], mode: RenderMode) -> [f32; 3] {
    let alpha = cell[layout.alive_channel].clamp(0.0, 1.0);
    match mode {
        RenderMode::Color => {
            let mut rgb = [0.0; 3];
            for (k, out) in rgb.iter_mut().enumerate() {
                let c = k.min(layout.visible - 1);
                *out = (cell[c].clamp(0.0, 1.0) + BACKGROUND[k] * (1.0 - alpha)).clamp(0.0, 1.0);
            }
            rgb
        }
        RenderMode::Alive => [alpha; 3],
        RenderMode::Model => {
            let hue = model_color(decode_selector(cell[layout.selector_slot()]));
            let mut rgb = [0.0; 3];
            for k in 0..3 {
                rgb[k] = hue[k] * alpha + BACKGROUND[k] * (1.0 - alpha);
            }
            rgb
        }
        RenderMode::Channel(c) => [(cell[c] * 0.5 + 0.5).clamp(0.0, 1.0); 3],
    }
}

/// Stable hue per model id (golden-ratio spacing)
pub fn model_color(id: u32) -> [f32; 3] {
    let h = (id as f32 * 0.618_034).fract();
    hsv_to_rgb(h, 0.6, 0.9)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let offsets = [1.0, 2.0 / 3.0, 1.0 / 3.0];
    let mut rgb = [0.0; 3];
    for (out, offset) in rgb.iter_mut().zip(offsets) {
        let p = (((h + offset).fract()) * 6.0 - 3.0).abs();
        let k = (p - 1.0).clamp(0.0, 1.0);
        *out = v * (1.0 + (k - 1.0) * s);
    }
    rgb
}

/// Project a host buffer to a frame of `view` size
pub fn render_frame(
    layout: &CellLayout,
    width: u32,
    height: u32,
    cells: &[f32],
    view: ViewSize,
    mode: RenderMode,
) -> Frame {
    let stride = layout.stride();
    let mut pixels = vec![0u8; view.width as usize * view.height as usize * 4];
    for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
        let x = (i % view.width as usize) as u32;
        let y = (i / view.width as usize) as u32;
        let (gx, gy) = view.cell_at(x, y, width, height);
        let base = (gy * width + gx) as usize * stride;
        let rgb = shade(layout, &cells[base..base + stride], mode);
        for k in 0..3 {
            px[k] = to_byte(rgb[k]);
        }
        px[3] = 255;
    }
    Frame {
        width: view.width,
        height: view.height,
        pixels,
    }
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::cell::Topology;

    fn layout() -> CellLayout {
        CellLayout::new(4, 3, 3, Topology::Square, None)
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("color".parse::<RenderMode>().unwrap(), RenderMode::Color);
        assert_eq!("channel:5".parse::<RenderMode>().unwrap(), RenderMode::Channel(5));
        assert!(matches!(
            "sepia".parse::<RenderMode>(),
            Err(EngineError::UnsupportedRenderMode(_))
        ));
        assert!("channel:x".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_channel_mode_out_of_range() {
        let layout = layout();
        assert!(RenderMode::Channel(3).validate(&layout).is_ok());
        assert!(RenderMode::Channel(4).validate(&layout).is_err());
    }

    #[test]
    fn test_dead_cell_shows_background() {
        let layout = layout();
        let rgb = shade(&layout, &[0.0; 5], RenderMode::Color);
        assert_eq!(rgb, BACKGROUND);
    }

    #[test]
    fn test_opaque_cell_shows_its_color() {
        let layout = layout();
        let rgb = shade(&layout, &[0.25, 0.5, 1.0, 1.0, 0.0], RenderMode::Color);
        assert_eq!(rgb, [0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_frame_nearest_sampling() {
        let layout = layout();
        // 2x1 grid: left cell red and alive, right cell dead
        let cells = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let frame = render_frame(&layout, 2, 1, &cells, ViewSize::new(4, 2), RenderMode::Color);
        assert_eq!(frame.pixels.len(), 32);
        assert_eq!(frame.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(frame.pixel(1, 1), [255, 0, 0, 255]);
        assert_eq!(frame.pixel(2, 0), frame.pixel(3, 1));
        assert_ne!(frame.pixel(2, 0), frame.pixel(1, 0));
    }

    #[test]
    fn test_model_colors_differ() {
        assert_ne!(model_color(0), model_color(1));
        assert_ne!(model_color(1), model_color(2));
    }

    #[test]
    fn test_scaled_view_size() {
        assert_eq!(ViewSize::scaled(400.0, 300.0, 2.0), ViewSize::new(800, 600));
    }

    #[test]
    fn test_zero_view_rejected() {
        assert!(ViewSize::new(0, 10).validate().is_err());
    }
}

use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

use crate::display::DisplayMode;

// --- Thumbnail Widget ---

/// Draws an image that has already been sized with [`fit_thumbnail`].
pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_CHARS: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_direct(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
      DisplayMode::Off => {}
    }
  }
}

/// Resize `image` to cover `area` for the given mode.
///
/// Half-block cells pack two pixel rows per cell, so `Direct` gets twice the
/// vertical resolution of `Ascii`.
pub fn fit_thumbnail(image: &DynamicImage, area: Rect, mode: DisplayMode) -> DynamicImage {
  let target_w = (area.width as u32).max(1);
  let rows = (area.height as u32).max(1);
  let target_h = match mode {
    DisplayMode::Direct => rows * 2,
    DisplayMode::Ascii | DisplayMode::Off => rows,
  };
  image.resize_to_fill(target_w, target_h, FilterType::Triangle)
}

fn cell_position(area: Rect, offset_x: u32, offset_y: u32, x: u32, y: u32) -> (u16, u16) {
  let clamp = |v: u32| v.min(u16::MAX as u32) as u16;
  let cx = area.x.saturating_add(clamp(offset_x)).saturating_add(clamp(x));
  let cy = area.y.saturating_add(clamp(offset_y)).saturating_add(clamp(y));
  (cx, cy)
}

fn render_direct(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let img_w = rgb.width().min(area.width as u32);
  let img_h = rgb.height();
  let cell_h = img_h.div_ceil(2);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(cell_h) / 2;

  for y in 0..cell_h.min(area.height as u32) {
    for x in 0..img_w {
      let upper = rgb.get_pixel(x, y * 2);
      let lower_y = y * 2 + 1;
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if lower_y < img_h {
        let lower = rgb.get_pixel(x, lower_y);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      let (cx, cy) = cell_position(area, offset_x, offset_y, x, y);
      buf.set_string(cx, cy, "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let img_w = luma.width().min(area.width as u32);
  let img_h = luma.height().min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_h) / 2;

  for y in 0..img_h {
    for x in 0..img_w {
      let pixel = luma.get_pixel(x, y)[0];
      let idx = ((pixel as f32 / 255.0) * (ASCII_CHARS.len() - 1) as f32).round() as usize;
      let idx = idx.min(ASCII_CHARS.len() - 1);
      let (cx, cy) = cell_position(area, offset_x, offset_y, x, y);
      buf.set_string(cx, cy, ASCII_CHARS[idx], Style::default());
    }
  }
}

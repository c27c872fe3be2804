//! JPEG previews for character-card images.

use std::io::Cursor;

use image::{
  DynamicImage, GenericImageView as _, Rgb, RgbImage, codecs::jpeg::JpegEncoder,
  imageops::FilterType,
};
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThumbnailOptions {
  /// Longest edge of the output in pixels. Smaller images keep their size.
  pub max_edge: u32,
  /// JPEG quality, 1–100.
  pub quality:  u8,
}

impl Default for ThumbnailOptions {
  fn default() -> Self { Self { max_edge: 800, quality: 80 } }
}

/// Decode `bytes`, shrink to fit `max_edge`, flatten any alpha onto white and
/// encode as JPEG.
pub fn make_thumbnail(bytes: &[u8], opts: ThumbnailOptions) -> Result<Vec<u8>> {
  let img = image::load_from_memory(bytes)?;
  let (w, h) = img.dimensions();
  let img = if w.max(h) > opts.max_edge {
    img.resize(opts.max_edge, opts.max_edge, FilterType::Triangle)
  } else {
    img
  };

  let rgb = flatten(&img);
  let mut out = Cursor::new(Vec::new());
  JpegEncoder::new_with_quality(&mut out, opts.quality.clamp(1, 100))
    .encode_image(&rgb)?;
  Ok(out.into_inner())
}

fn flatten(img: &DynamicImage) -> RgbImage {
  if !img.color().has_alpha() {
    return img.to_rgb8();
  }
  let rgba = img.to_rgba8();
  let mut rgb = RgbImage::new(rgba.width(), rgba.height());
  for (x, y, px) in rgba.enumerate_pixels() {
    let alpha = u16::from(px[3]);
    let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
    rgb.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
  }
  rgb
}

//! `image`-crate codec.
//!
//! # Design
//! - Geometry is computed in integer arithmetic; the only rounding happens in the
//!   aspect-preserving resize and the cover scale.
//! - JPEG output drops the alpha channel because the encoder rejects RGBA input.
//! - Resize output must fit the `image` crate's default allocation budget.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Limits};
use imgrelay_transform::Operation;

use crate::codec::ImageCodec;
use crate::error::{CodecError, CodecResult};

/// Codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> CodecResult<Self::Image> {
        image::load_from_memory(bytes).map_err(|source| CodecError::Decode { source })
    }

    fn apply(&self, image: Self::Image, operation: &Operation) -> CodecResult<Self::Image> {
        match *operation {
            Operation::Resize { width, height } => resize(&image, operation, width, height),
            Operation::Rotate { degrees } => rotate(image, operation, degrees),
            Operation::Extract {
                left,
                top,
                width,
                height,
            } => extract(&image, operation, left, top, width, height),
            Operation::Flop { enabled } => Ok(if enabled { image.fliph() } else { image }),
            Operation::Flip { enabled } => Ok(if enabled { image.flipv() } else { image }),
        }
    }

    fn cover(&self, image: Self::Image, width: u32, height: u32) -> CodecResult<Self::Image> {
        let label = format!("cover-{width}x{height}");
        if width == 0 || height == 0 {
            return Err(CodecError::apply(label, "zero_dimension"));
        }
        let (source_width, source_height) = image.dimensions();
        let (scaled_width, scaled_height) =
            cover_size(source_width, source_height, width, height)
                .ok_or_else(|| CodecError::apply(&label, "dimension_overflow"))?;
        let scaled = if (scaled_width, scaled_height) == (source_width, source_height) {
            image
        } else {
            image.resize_exact(scaled_width, scaled_height, FilterType::Lanczos3)
        };

        let crop_width = width.min(scaled_width);
        let crop_height = height.min(scaled_height);
        if (crop_width, crop_height) == (scaled_width, scaled_height) {
            return Ok(scaled);
        }
        let left = (scaled_width - crop_width) / 2;
        let top = (scaled_height - crop_height) / 2;
        Ok(scaled.crop_imm(left, top, crop_width, crop_height))
    }

    fn encode(&self, image: &Self::Image, extension: &str) -> CodecResult<Vec<u8>> {
        let format = ImageFormat::from_extension(extension).ok_or_else(|| {
            CodecError::UnsupportedFormat {
                extension: extension.to_string(),
            }
        })?;
        let prepared = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
            ImageFormat::Png
            | ImageFormat::Gif
            | ImageFormat::WebP
            | ImageFormat::Bmp => DynamicImage::ImageRgba8(image.to_rgba8()),
            _ => {
                return Err(CodecError::UnsupportedFormat {
                    extension: extension.to_string(),
                });
            }
        };
        let mut buffer = Vec::new();
        prepared
            .write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|source| CodecError::Encode {
                extension: extension.to_string(),
                source,
            })?;
        Ok(buffer)
    }
}

fn resize(
    image: &DynamicImage,
    operation: &Operation,
    width: u32,
    height: Option<u32>,
) -> CodecResult<DynamicImage> {
    let height = match height {
        Some(height) => height,
        None => scale(image.height(), width, image.width())
            .ok_or_else(|| CodecError::apply(operation, "dimension_overflow"))?,
    };
    if width == 0 || height == 0 {
        return Err(CodecError::apply(operation, "zero_dimension"));
    }
    if !fits_allocation_budget(image, width, height) {
        return Err(CodecError::apply(operation, "output_too_large"));
    }
    Ok(image.resize_exact(width, height, FilterType::Lanczos3))
}

fn fits_allocation_budget(image: &DynamicImage, width: u32, height: u32) -> bool {
    let bytes = u64::from(width)
        * u64::from(height)
        * u64::from(image.color().bytes_per_pixel());
    Limits::default().max_alloc.is_none_or(|budget| bytes <= budget)
}

fn rotate(image: DynamicImage, operation: &Operation, degrees: i32) -> CodecResult<DynamicImage> {
    match degrees.rem_euclid(360) {
        0 => Ok(image),
        90 => Ok(image.rotate90()),
        180 => Ok(image.rotate180()),
        270 => Ok(image.rotate270()),
        _ => Err(CodecError::apply(operation, "unsupported_angle")),
    }
}

fn extract(
    image: &DynamicImage,
    operation: &Operation,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
) -> CodecResult<DynamicImage> {
    if width == 0 || height == 0 {
        return Err(CodecError::apply(operation, "empty_region"));
    }
    let fits_horizontally = left
        .checked_add(width)
        .is_some_and(|right| right <= image.width());
    let fits_vertically = top
        .checked_add(height)
        .is_some_and(|bottom| bottom <= image.height());
    if !(fits_horizontally && fits_vertically) {
        return Err(CodecError::apply(operation, "region_out_of_bounds"));
    }
    Ok(image.crop_imm(left, top, width, height))
}

/// `value * numerator / denominator`, rounded to nearest and at least 1.
fn scale(value: u32, numerator: u32, denominator: u32) -> Option<u32> {
    if denominator == 0 {
        return None;
    }
    let product = u64::from(value) * u64::from(numerator);
    let rounded = (product + u64::from(denominator) / 2) / u64::from(denominator);
    u32::try_from(rounded.max(1)).ok()
}

/// `value * numerator / denominator`, rounded up.
fn scale_up(value: u32, numerator: u32, denominator: u32) -> Option<u32> {
    if denominator == 0 {
        return None;
    }
    let product = u64::from(value) * u64::from(numerator);
    u32::try_from(product.div_ceil(u64::from(denominator))).ok()
}

/// Smallest aspect-preserving size covering the box, never larger than the source.
fn cover_size(
    source_width: u32,
    source_height: u32,
    width: u32,
    height: u32,
) -> Option<(u32, u32)> {
    // Width ratio dominates when width/source_width >= height/source_height.
    let width_dominates =
        u64::from(width) * u64::from(source_height) >= u64::from(height) * u64::from(source_width);
    let scaled = if width_dominates {
        (width, scale_up(source_height, width, source_width)?)
    } else {
        (scale_up(source_width, height, source_height)?, height)
    };
    if scaled.0 >= source_width || scaled.1 >= source_height {
        Some((source_width, source_height))
    } else {
        Some(scaled)
    }
}

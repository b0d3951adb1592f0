//! Codec seam and the fold that drives it.
//!
//! # Design
//! - The chain is an immutable operation list; rendering folds the codec's apply
//!   function over it, so no partially applied state survives a failed step.
//! - Every step consumes the previous step's image by value.

use imgrelay_transform::Operation;

use crate::error::CodecResult;
use crate::variant::Variant;

/// Image backend used to render variants.
pub trait ImageCodec: Send + Sync + 'static {
    /// In-memory image representation.
    type Image;

    /// Decode raw source bytes.
    ///
    /// # Errors
    ///
    /// Fails when the bytes are not a supported image.
    fn decode(&self, bytes: &[u8]) -> CodecResult<Self::Image>;

    /// Apply one operation.
    ///
    /// # Errors
    ///
    /// Fails when the operation does not fit the image (for example a crop
    /// rectangle outside its bounds).
    fn apply(&self, image: Self::Image, operation: &Operation) -> CodecResult<Self::Image>;

    /// Shrink to cover `width`×`height` and center-crop to it.
    ///
    /// # Errors
    ///
    /// Fails when the target box cannot be produced.
    fn cover(&self, image: Self::Image, width: u32, height: u32) -> CodecResult<Self::Image>;

    /// Encode into the format named by `extension`.
    ///
    /// # Errors
    ///
    /// Fails when no encoder exists for `extension` or encoding fails.
    fn encode(&self, image: &Self::Image, extension: &str) -> CodecResult<Vec<u8>>;
}

/// Decode `bytes`, render `variant`, and encode as `extension`.
///
/// [`Variant::Original`] still round-trips through the codec; the executor never
/// calls this for it.
///
/// # Errors
///
/// Returns the first [`crate::CodecError`] raised by the codec.
pub fn render<C: ImageCodec>(
    codec: &C,
    bytes: &[u8],
    variant: &Variant,
    extension: &str,
) -> CodecResult<Vec<u8>> {
    let image = codec.decode(bytes)?;
    let image = match variant {
        Variant::Original => image,
        Variant::Chain(chain) => chain
            .operations()
            .iter()
            .try_fold(image, |image, operation| codec.apply(image, operation))?,
        Variant::Cover { width, height } => codec.cover(image, *width, *height)?,
    };
    codec.encode(&image, extension)
}

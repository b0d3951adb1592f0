//! What the executor renders for one request.

use std::fmt;

use imgrelay_transform::{Operation, TransformChain, parse};

use crate::error::{PipelineError, PipelineResult};

/// Rendering requested for a source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    /// Serve the fetched bytes untouched; never cached.
    Original,
    /// Apply a transform chain left to right.
    Chain(TransformChain),
    /// Shrink to cover `width`×`height`, then center-crop to it.
    Cover {
        /// Box width in pixels.
        width: u32,
        /// Box height in pixels.
        height: u32,
    },
}

impl Variant {
    /// Variant for the query route's optional chain parameter; absent or blank means
    /// [`Variant::Original`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidChain`] when the chain is malformed and
    /// [`PipelineError::InvalidDimension`] when a resize target exceeds
    /// `max_dimension`.
    pub fn from_chain(chain: Option<&str>, max_dimension: u32) -> PipelineResult<Self> {
        let chain = match chain.map(str::trim) {
            None | Some("") => return Ok(Self::Original),
            Some(chain) => parse(chain)?,
        };
        for operation in chain.operations() {
            if let Operation::Resize { width, height } = *operation {
                within_limit("width", width, max_dimension)?;
                if let Some(height) = height {
                    within_limit("height", height, max_dimension)?;
                }
            }
        }
        Ok(Self::Chain(chain))
    }

    /// Variant for the path route's raw width and height segments.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimension`] when either value is not a
    /// positive integer no greater than `max_dimension`.
    pub fn cover(width: &str, height: &str, max_dimension: u32) -> PipelineResult<Self> {
        Ok(Self::Cover {
            width: dimension("width", width, max_dimension)?,
            height: dimension("height", height, max_dimension)?,
        })
    }

    /// Cache signature; `None` for [`Variant::Original`], which bypasses the cache.
    #[must_use]
    pub fn signature(&self) -> Option<String> {
        match self {
            Self::Original => None,
            Self::Chain(chain) => Some(chain.signature()),
            Self::Cover { width, height } => Some(format!("cover-{width}x{height}")),
        }
    }
}

/// Why a requested dimension was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionProblem {
    /// Not an unsigned integer.
    NotAnInteger,
    /// Zero.
    NotPositive,
    /// Larger than the configured bound.
    AboveLimit {
        /// Configured bound.
        limit: u32,
    },
}

impl fmt::Display for DimensionProblem {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnInteger => formatter.write_str("an integer"),
            Self::NotPositive => formatter.write_str("greater than zero"),
            Self::AboveLimit { limit } => write!(formatter, "less than or equal to {limit}"),
        }
    }
}

fn within_limit(field: &'static str, value: u32, limit: u32) -> PipelineResult<()> {
    if value > limit {
        return Err(PipelineError::InvalidDimension {
            field,
            problem: DimensionProblem::AboveLimit { limit },
        });
    }
    Ok(())
}

fn dimension(field: &'static str, raw: &str, limit: u32) -> PipelineResult<u32> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| PipelineError::InvalidDimension {
            field,
            problem: DimensionProblem::NotAnInteger,
        })?;
    let problem = if value == 0 {
        DimensionProblem::NotPositive
    } else if value > limit {
        DimensionProblem::AboveLimit { limit }
    } else {
        return Ok(value);
    };
    Err(PipelineError::InvalidDimension { field, problem })
}

//! Typed operations and the immutable chain that sequences them.
//!
//! # Design
//! - `Operation` is a closed sum type; values are only constructed after arity and
//!   range validation, so applying a chain never meets an unknown code.
//! - `Display` renders the normalized form (`code-p1xp2`, comma separated) which is
//!   also the cache signature for a chain.

use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;

/// Two-letter operation codes recognised by the chain grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCode {
    /// `re`: resize to a width and optional height.
    Resize,
    /// `ro`: rotate by degrees.
    Rotate,
    /// `ex`: extract a rectangle.
    Extract,
    /// `fx`: mirror horizontally.
    Flop,
    /// `fy`: mirror vertically.
    Flip,
}

impl OperationCode {
    /// Every recognised code, in grammar order.
    pub const ALL: [Self; 5] = [
        Self::Resize,
        Self::Rotate,
        Self::Extract,
        Self::Flop,
        Self::Flip,
    ];

    /// Look up a code from its two-letter token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == token)
    }

    /// Render the code as it appears in a chain.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resize => "re",
            Self::Rotate => "ro",
            Self::Extract => "ex",
            Self::Flop => "fx",
            Self::Flip => "fy",
        }
    }

    /// Number of parameters the code accepts.
    #[must_use]
    pub const fn arity(self) -> RangeInclusive<usize> {
        match self {
            Self::Resize => 1..=2,
            Self::Rotate | Self::Flop | Self::Flip => 1..=1,
            Self::Extract => 4..=4,
        }
    }
}

/// A single validated image operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Resize to `width`, and to `height` when present (otherwise aspect is kept).
    Resize {
        /// Target width in pixels.
        width: u32,
        /// Optional target height in pixels.
        height: Option<u32>,
    },
    /// Rotate clockwise by `degrees`.
    Rotate {
        /// Rotation angle; negative values rotate counter-clockwise.
        degrees: i32,
    },
    /// Crop the rectangle at (`left`, `top`) sized `width` x `height`.
    Extract {
        /// Left offset in pixels.
        left: u32,
        /// Top offset in pixels.
        top: u32,
        /// Rectangle width in pixels.
        width: u32,
        /// Rectangle height in pixels.
        height: u32,
    },
    /// Horizontal mirror, applied when `enabled`.
    Flop {
        /// Flag parameter (`1` applies, `0` leaves the image untouched).
        enabled: bool,
    },
    /// Vertical mirror, applied when `enabled`.
    Flip {
        /// Flag parameter (`1` applies, `0` leaves the image untouched).
        enabled: bool,
    },
}

impl Operation {
    /// Code this operation was parsed from.
    #[must_use]
    pub const fn code(&self) -> OperationCode {
        match self {
            Self::Resize { .. } => OperationCode::Resize,
            Self::Rotate { .. } => OperationCode::Rotate,
            Self::Extract { .. } => OperationCode::Extract,
            Self::Flop { .. } => OperationCode::Flop,
            Self::Flip { .. } => OperationCode::Flip,
        }
    }

    /// Parameters in chain order.
    #[must_use]
    pub fn params(&self) -> Vec<i64> {
        match *self {
            Self::Resize { width, height } => {
                let mut params = vec![i64::from(width)];
                params.extend(height.map(i64::from));
                params
            }
            Self::Rotate { degrees } => vec![i64::from(degrees)],
            Self::Extract {
                left,
                top,
                width,
                height,
            } => vec![
                i64::from(left),
                i64::from(top),
                i64::from(width),
                i64::from(height),
            ],
            Self::Flop { enabled } | Self::Flip { enabled } => vec![i64::from(enabled)],
        }
    }
}

impl Display for Operation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.code().as_str())?;
        formatter.write_str("-")?;
        for (index, param) in self.params().into_iter().enumerate() {
            if index > 0 {
                formatter.write_str("x")?;
            }
            write!(formatter, "{param}")?;
        }
        Ok(())
    }
}

/// Ordered, non-empty sequence of operations applied left to right.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformChain {
    operations: Vec<Operation>,
}

impl TransformChain {
    /// Build a chain from already-validated operations.
    ///
    /// Returns `None` when `operations` is empty.
    #[must_use]
    pub fn new(operations: Vec<Operation>) -> Option<Self> {
        if operations.is_empty() {
            None
        } else {
            Some(Self { operations })
        }
    }

    /// Operations in application order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of operations in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Chains are never empty; provided for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Normalized signature used when deriving cache keys.
    #[must_use]
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl Display for TransformChain {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        for (index, operation) in self.operations.iter().enumerate() {
            if index > 0 {
                formatter.write_str(",")?;
            }
            Display::fmt(operation, formatter)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TransformChain {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}
